// State containers
// Each store states its persistence policy explicitly:
// config and history are durable, the private-access session is memory-only.

pub mod config_store;
pub mod history_store;
pub mod private_key;
pub mod storage;

pub use config_store::{ConfigStore, InputTextPolicy};
pub use history_store::{
    DEFAULT_MAX_HISTORY_ITEMS, HistoryDay, HistoryStore, SessionEntry, filter_history, group_by_day,
};
pub use private_key::PrivateAccessSession;
pub use storage::{CONFIG_KEY, HISTORY_KEY, JsonFileStorage, KeyValueStorage, MemoryStorage};
