//! Модуль обработки ошибок
//!
//! Все операции ядра возвращают `StudioError` вызывающей стороне (UI-слою).
//! Ни одна ошибка не проглатывается молча.

use thiserror::Error;

/// Ошибки ядра панели управления TTS
#[derive(Debug, Error)]
pub enum StudioError {
    /// Локальная проверка не пройдена, сетевой вызов не выполнялся
    #[error("{0}")]
    Validation(String),

    /// Шлюз ответил не-2xx статусом или `success: false`
    #[error("Backend error: {message}")]
    Backend {
        status: Option<u16>,
        message: String,
    },

    /// Ошибка HTTP транспорта
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка постоянного хранилища
    #[error("Storage error: {0}")]
    Storage(String),

    /// Ошибка обработки аудио
    #[error("Audio processing error: {0}")]
    Audio(String),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Другая ошибка
    #[error("Other error: {0}")]
    Other(String),
}

impl StudioError {
    pub fn validation(message: impl Into<String>) -> Self {
        StudioError::Validation(message.into())
    }

    pub fn backend(status: Option<u16>, message: impl Into<String>) -> Self {
        StudioError::Backend {
            status,
            message: message.into(),
        }
    }

    /// Ошибка возникла до сетевого вызова
    pub fn is_validation(&self) -> bool {
        matches!(self, StudioError::Validation(_))
    }

    /// Текст для показа пользователю: сообщение шлюза без префиксов
    pub fn user_message(&self) -> String {
        match self {
            StudioError::Validation(message) => message.clone(),
            StudioError::Backend { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<&str> for StudioError {
    fn from(s: &str) -> Self {
        StudioError::Other(s.to_string())
    }
}

impl From<String> for StudioError {
    fn from(s: String) -> Self {
        StudioError::Other(s)
    }
}

/// Тип Result для библиотеки
pub type Result<T> = std::result::Result<T, StudioError>;
