use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::api::{ModelType, ResponseFormat};
use crate::emotion::EmotionControl;
use crate::handle::AudioHandle;

pub const SPEED_MIN: f32 = 0.5;
pub const SPEED_MAX: f32 = 2.0;

/// Languages accepted by Qwen3-TTS
pub const LANGUAGE_OPTIONS: [&str; 7] = [
    "Chinese", "English", "Japanese", "Korean", "French", "German", "Spanish",
];

/// Emotion tags understood by IndexTTS in preset mode
pub const EMOTION_PRESETS: [&str; 8] = [
    "default", "happy", "sad", "angry", "fear", "surprise", "disgust", "calm",
];

/// Полная конфигурация синтеза, как её видит панель
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TtsConfig {
    pub model: ModelType,
    pub voice: String,
    pub response_format: ResponseFormat,
    pub speed: f32,

    // Qwen3-TTS
    pub language: String,
    pub ref_audio_id: Option<String>,

    // IndexTTS
    pub emotion: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repetition_penalty: f32,

    pub emotion_control: EmotionControl,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            model: ModelType::Auto,
            voice: "default".to_string(),
            response_format: ResponseFormat::Wav,
            speed: 1.0,
            language: "Chinese".to_string(),
            ref_audio_id: None,
            emotion: "default".to_string(),
            temperature: 1.0,
            top_p: 0.8,
            top_k: 20,
            repetition_penalty: 1.0,
            emotion_control: EmotionControl::default(),
        }
    }
}

/// Shallow patch of [`TtsConfig`]; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigPatch {
    pub model: Option<ModelType>,
    pub voice: Option<String>,
    pub response_format: Option<ResponseFormat>,
    pub speed: Option<f32>,
    pub language: Option<String>,
    pub ref_audio_id: Option<Option<String>>,
    pub emotion: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub repetition_penalty: Option<f32>,
    /// Replaces the whole nested control, like a shallow object spread
    pub emotion_control: Option<EmotionControl>,
}

impl ConfigPatch {
    pub fn apply(self, config: &mut TtsConfig) {
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(voice) = self.voice {
            config.voice = voice;
        }
        if let Some(format) = self.response_format {
            config.response_format = format;
        }
        if let Some(speed) = self.speed {
            config.speed = if speed.is_nan() {
                1.0
            } else {
                speed.clamp(SPEED_MIN, SPEED_MAX)
            };
        }
        if let Some(language) = self.language {
            config.language = language;
        }
        if let Some(ref_audio_id) = self.ref_audio_id {
            config.ref_audio_id = ref_audio_id;
        }
        if let Some(emotion) = self.emotion {
            config.emotion = emotion;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(top_p) = self.top_p {
            config.top_p = top_p;
        }
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        if let Some(penalty) = self.repetition_penalty {
            config.repetition_penalty = penalty;
        }
        if let Some(control) = self.emotion_control {
            config.emotion_control = control;
        }
    }
}

/// Результат одной успешной генерации (только для текущей сессии)
#[derive(Debug)]
pub struct AudioResult {
    pub id: String,
    pub text: String,
    /// Эфемерный дескриптор; освобождается только хранилищем истории
    pub handle: AudioHandle,
    pub audio: Option<Bytes>,
    pub model: ModelType,
    pub voice: String,
    /// Длительность в секундах
    pub duration: Option<f64>,
    /// Миллисекунды с начала эпохи
    pub timestamp: i64,
}

impl AudioResult {
    /// Durable, metadata-only copy
    pub fn to_history_item(&self) -> HistoryItem {
        HistoryItem {
            id: self.id.clone(),
            text: self.text.clone(),
            model: self.model,
            voice: self.voice.clone(),
            duration: self.duration,
            timestamp: self.timestamp,
        }
    }
}

/// Запись постоянной истории без аудиоданных
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub text: String,
    pub model: ModelType,
    pub voice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub timestamp: i64,
}
