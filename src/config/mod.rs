// Configuration module
// Настройки клиента: адрес шлюза, таймауты, каталог данных, лимиты

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::emotion::MAX_EMOTION_AUDIO_BYTES;
use crate::error::{Result, StudioError};
use crate::store::{DEFAULT_MAX_HISTORY_ITEMS, InputTextPolicy};

pub const ENV_GATEWAY_URL: &str = "TTS_GATEWAY_URL";
pub const ENV_GATEWAY_TIMEOUT: &str = "TTS_GATEWAY_TIMEOUT_SECS";
pub const ENV_DATA_DIR: &str = "TTS_STUDIO_DATA_DIR";
pub const ENV_MAX_HISTORY: &str = "TTS_STUDIO_MAX_HISTORY";

/// Лимит загрузки голосового образца
pub const MAX_VOICE_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// Синтез бывает долгим, поэтому таймаут большой
    pub request_timeout_secs: u64,
    pub data_dir: PathBuf,
    pub max_history_items: usize,
    pub input_text_policy: InputTextPolicy,
    pub max_emotion_upload_bytes: u64,
    pub max_voice_upload_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 300,
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tts-studio"),
            max_history_items: DEFAULT_MAX_HISTORY_ITEMS,
            input_text_policy: InputTextPolicy::default(),
            max_emotion_upload_bytes: MAX_EMOTION_AUDIO_BYTES,
            max_voice_upload_bytes: MAX_VOICE_UPLOAD_BYTES,
        }
    }
}

impl ClientConfig {
    /// Значения по умолчанию, поверх которых накладываются переменные окружения
    pub fn from_env() -> Result<Self> {
        Self::default().overlay(|key| env::var(key).ok())
    }

    fn overlay<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_GATEWAY_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(value) = lookup(ENV_GATEWAY_TIMEOUT) {
            self.request_timeout_secs = parse_number(ENV_GATEWAY_TIMEOUT, &value)?;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(ENV_MAX_HISTORY) {
            self.max_history_items = parse_number(ENV_MAX_HISTORY, &value)?;
        }

        log::debug!(
            "Client config: gateway={} timeout={}s data_dir={}",
            self.api_base_url,
            self.request_timeout_secs,
            self.data_dir.display()
        );
        Ok(self)
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| {
            StudioError::Configuration(format!(
                "{} must be a non-negative integer, got '{}'",
                key, value
            ))
        })
}
