// Постоянное хранилище ключ-значение
// Аналог хранилища настроек приложения: один JSON-файл с картой ключей

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Result, StudioError};

/// Ключ сериализованной конфигурации TTS
pub const CONFIG_KEY: &str = "tts-gateway-config";
/// Ключ постоянной истории генераций
pub const HISTORY_KEY: &str = "tts-gateway-history";

const STORE_FILENAME: &str = "settings.json";

/// Долговременное хранилище, переживающее перезапуск процесса
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Хранилище в JSON-файле
pub struct JsonFileStorage {
    path: PathBuf,
    entries: Mutex<HashMap<String, Value>>,
}

impl JsonFileStorage {
    /// Открыть (или создать) хранилище в каталоге `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let path = dir.join(STORE_FILENAME);

        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<HashMap<String, Value>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    // Испорченный файл не должен блокировать запуск
                    log::warn!("Failed to parse {}: {}, starting empty", path.display(), e);
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        log::debug!("Opened storage {} with {} keys", path.display(), entries.len());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &HashMap<String, Value>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        let dir = self
            .path
            .parent()
            .ok_or_else(|| StudioError::Storage(format!("No parent for {}", self.path.display())))?;

        // Пишем во временный файл и переименовываем, чтобы не оставить половину файла
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&self.path).map_err(|e| {
            StudioError::Storage(format!("Failed to persist {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }
}

impl KeyValueStorage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }
}

/// Хранилище в памяти (тесты и запуск без диска)
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Value>>,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Количество записей с момента создания
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_file_storage_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();

        let storage = JsonFileStorage::open(temp_dir.path()).unwrap();
        storage.set(CONFIG_KEY, json!({"state": {"config": {"voice": "narrator"}}})).unwrap();
        storage.set("other", json!(1)).unwrap();
        storage.remove("other").unwrap();
        drop(storage);

        let storage = JsonFileStorage::open(temp_dir.path()).unwrap();
        assert_eq!(
            storage.get(CONFIG_KEY).unwrap().unwrap()["state"]["config"]["voice"],
            "narrator"
        );
        assert_eq!(storage.get("other").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(STORE_FILENAME), "{not json").unwrap();

        let storage = JsonFileStorage::open(temp_dir.path()).unwrap();
        assert_eq!(storage.get(CONFIG_KEY).unwrap(), None);
    }
}
