// Хранилище результатов генерации
//
// Два списка: результаты текущей сессии (с аудио и эфемерным дескриптором)
// и постоянная история (только метаданные, ограниченного размера).
// Дескрипторы освобождаются только здесь, в точке удаления записи.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::storage::{HISTORY_KEY, KeyValueStorage};
use crate::error::Result;
use crate::models::{AudioResult, HistoryItem};

/// Размер истории по умолчанию
pub const DEFAULT_MAX_HISTORY_ITEMS: usize = 100;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedHistory {
    history: Vec<HistoryItem>,
    max_history_items: usize,
}

struct HistoryState {
    session: Vec<AudioResult>,
    history: Vec<HistoryItem>,
    max_items: usize,
}

/// Снимок записи сессии без владения дескриптором
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry {
    pub item: HistoryItem,
    pub uri: Option<String>,
    pub has_audio: bool,
}

/// Заголовок группы истории
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDay {
    Today,
    Yesterday,
    Date(NaiveDate),
}

/// Поиск без учёта регистра по тексту, модели или голосу; пустой запрос возвращает всё
pub fn filter_history(items: &[HistoryItem], query: &str) -> Vec<HistoryItem> {
    let needle = query.trim().to_lowercase();
    items
        .iter()
        .filter(|item| {
            needle.is_empty()
                || item.text.to_lowercase().contains(&needle)
                || item.model.as_str().contains(&needle)
                || item.voice.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Группировка по календарному дню в часовом поясе `now`, порядок записей сохраняется
pub fn group_by_day<Tz: TimeZone>(
    items: &[HistoryItem],
    now: &DateTime<Tz>,
) -> Vec<(HistoryDay, Vec<HistoryItem>)> {
    let tz = now.timezone();
    let today = now.date_naive();
    let yesterday = today.pred_opt();

    let mut groups: Vec<(HistoryDay, Vec<HistoryItem>)> = Vec::new();
    for item in items {
        let Some(date) = tz.timestamp_millis_opt(item.timestamp).earliest() else {
            log::warn!("History item {} has invalid timestamp {}", item.id, item.timestamp);
            continue;
        };
        let date = date.date_naive();
        let day = if date == today {
            HistoryDay::Today
        } else if Some(date) == yesterday {
            HistoryDay::Yesterday
        } else {
            HistoryDay::Date(date)
        };

        match groups.iter_mut().find(|(d, _)| *d == day) {
            Some((_, group)) => group.push(item.clone()),
            None => groups.push((day, vec![item.clone()])),
        }
    }
    groups
}

pub struct HistoryStore {
    storage: Arc<dyn KeyValueStorage>,
    state: RwLock<HistoryState>,
}

impl HistoryStore {
    /// Восстановить историю; `default_max` используется, если в хранилище нет своего лимита
    pub fn load(storage: Arc<dyn KeyValueStorage>, default_max: usize) -> Self {
        let (mut history, max_items) = match storage.get(HISTORY_KEY) {
            Ok(Some(value)) => match serde_json::from_value::<PersistedHistory>(value) {
                Ok(persisted) => (persisted.history, persisted.max_history_items),
                Err(e) => {
                    log::warn!("Failed to parse stored history, starting empty: {}", e);
                    (Vec::new(), default_max)
                }
            },
            Ok(None) => (Vec::new(), default_max),
            Err(e) => {
                log::warn!("Failed to read stored history, starting empty: {}", e);
                (Vec::new(), default_max)
            }
        };
        history.truncate(max_items);

        log::info!("History loaded: {} items (max {})", history.len(), max_items);
        Self {
            storage,
            state: RwLock::new(HistoryState {
                session: Vec::new(),
                history,
                max_items,
            }),
        }
    }

    /// Добавить результат в начало обоих списков
    pub fn add_result(&self, result: AudioResult) -> Result<()> {
        let mut state = self.state.write();
        let mut history = Vec::with_capacity(state.history.len() + 1);
        history.push(result.to_history_item());
        history.extend(state.history.iter().cloned());
        history.truncate(state.max_items);

        if let Err(err) = self.persist(&history, state.max_items) {
            // запись не попала ни в один список, её дескриптор больше некому освободить
            result.handle.release();
            return Err(err);
        }
        state.history = history;
        state.session.insert(0, result);
        Ok(())
    }

    /// Удалить запись из обоих списков и освободить её дескриптор
    pub fn remove_result(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write();
        let history: Vec<HistoryItem> =
            state.history.iter().filter(|h| h.id != id).cloned().collect();
        let history_changed = history.len() != state.history.len();
        if history_changed {
            self.persist(&history, state.max_items)?;
            state.history = history;
        }

        let removed = match state.session.iter().position(|r| r.id == id) {
            Some(index) => {
                let result = state.session.remove(index);
                result.handle.release();
                true
            }
            None => false,
        };
        Ok(removed || history_changed)
    }

    /// Освободить все дескрипторы сессии и очистить список
    pub fn clear_session_results(&self) -> usize {
        let mut state = self.state.write();
        let released = state
            .session
            .drain(..)
            .filter(|result| result.handle.release())
            .count();
        log::info!("Cleared session results, released {} handles", released);
        released
    }

    /// Очистить только постоянную историю
    pub fn clear_history(&self) -> Result<()> {
        let mut state = self.state.write();
        self.persist(&[], state.max_items)?;
        state.history.clear();
        Ok(())
    }

    pub fn set_max_history_items(&self, max: usize) -> Result<()> {
        let mut state = self.state.write();
        let mut history = state.history.clone();
        history.truncate(max);
        self.persist(&history, max)?;
        state.history = history;
        state.max_items = max;
        Ok(())
    }

    pub fn max_history_items(&self) -> usize {
        self.state.read().max_items
    }

    pub fn history(&self) -> Vec<HistoryItem> {
        self.state.read().history.clone()
    }

    pub fn search(&self, query: &str) -> Vec<HistoryItem> {
        filter_history(&self.state.read().history, query)
    }

    /// Результаты поиска, сгруппированные по дням в локальном времени
    pub fn grouped_history(&self, query: &str) -> Vec<(HistoryDay, Vec<HistoryItem>)> {
        group_by_day(&self.search(query), &Local::now())
    }

    pub fn session_len(&self) -> usize {
        self.state.read().session.len()
    }

    /// Записи сессии, новые первыми
    pub fn session_results(&self) -> Vec<SessionEntry> {
        self.state
            .read()
            .session
            .iter()
            .map(|result| SessionEntry {
                item: result.to_history_item(),
                uri: result.handle.uri().map(str::to_string),
                has_audio: result.audio.is_some(),
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<SessionEntry> {
        self.session_results().into_iter().find(|entry| entry.item.id == id)
    }

    /// Аудиоданные результата сессии для скачивания
    pub fn audio_bytes(&self, id: &str) -> Option<Bytes> {
        self.state
            .read()
            .session
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.audio.clone())
    }

    fn persist(&self, history: &[HistoryItem], max_items: usize) -> Result<()> {
        let value = serde_json::to_value(PersistedHistory {
            history: history.to_vec(),
            max_history_items: max_items,
        })?;
        self.storage.set(HISTORY_KEY, value)
    }
}
