// Хранилище конфигурации TTS
// Загружается один раз при старте и записывается после каждого изменения

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::storage::{CONFIG_KEY, KeyValueStorage};
use crate::emotion::{EmotionControlPatch, EmotionDimension, EmotionVectorPatch};
use crate::error::Result;
use crate::models::{ConfigPatch, EmotionMode, ModelType, TtsConfig};

/// Политика сохранения вводимого текста
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputTextPolicy {
    /// Текст живёт только в памяти сессии, сохраняется лишь `config`
    #[default]
    SessionOnly,
    /// Текст сохраняется вместе с конфигурацией
    Persist,
}

#[derive(Debug, Clone, Default)]
struct ConfigState {
    config: TtsConfig,
    input_text: String,
}

// Формат записи в хранилище
#[derive(Serialize, Deserialize)]
struct PersistedConfig {
    state: PersistedState,
    #[serde(default)]
    version: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    config: TtsConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_text: Option<String>,
}

/// Контейнер текущей конфигурации и вводимого текста
pub struct ConfigStore {
    storage: Arc<dyn KeyValueStorage>,
    policy: InputTextPolicy,
    state: RwLock<ConfigState>,
}

impl ConfigStore {
    /// Загрузить конфигурацию из хранилища; при отсутствии или ошибке берутся значения по умолчанию
    pub fn load(storage: Arc<dyn KeyValueStorage>, policy: InputTextPolicy) -> Self {
        let state = match storage.get(CONFIG_KEY) {
            Ok(Some(value)) => match serde_json::from_value::<PersistedConfig>(value) {
                Ok(persisted) => ConfigState {
                    config: persisted.state.config,
                    input_text: match policy {
                        InputTextPolicy::Persist => persisted.state.input_text.unwrap_or_default(),
                        InputTextPolicy::SessionOnly => String::new(),
                    },
                },
                Err(e) => {
                    log::warn!("Failed to parse stored TTS config, using defaults: {}", e);
                    ConfigState::default()
                }
            },
            Ok(None) => ConfigState::default(),
            Err(e) => {
                log::warn!("Failed to read stored TTS config, using defaults: {}", e);
                ConfigState::default()
            }
        };

        log::info!(
            "TTS config loaded: model={}, voice={}",
            state.config.model.as_str(),
            state.config.voice
        );
        Self {
            storage,
            policy,
            state: RwLock::new(state),
        }
    }

    pub fn policy(&self) -> InputTextPolicy {
        self.policy
    }

    /// Снимок текущей конфигурации
    pub fn config(&self) -> TtsConfig {
        self.state.read().config.clone()
    }

    pub fn input_text(&self) -> String {
        self.state.read().input_text.clone()
    }

    pub fn set_config(&self, patch: ConfigPatch) -> Result<()> {
        self.update(|state| patch.apply(&mut state.config))
    }

    pub fn set_model(&self, model: ModelType) -> Result<()> {
        self.update(|state| state.config.model = model)
    }

    pub fn set_input_text(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        match self.policy {
            InputTextPolicy::Persist => self.update(|state| state.input_text = text),
            InputTextPolicy::SessionOnly => {
                self.state.write().input_text = text;
                Ok(())
            }
        }
    }

    /// Слияние только переданных полей вложенного `emotion_control`
    pub fn set_emotion_control(&self, patch: EmotionControlPatch) -> Result<()> {
        self.update(|state| patch.apply(&mut state.config.emotion_control))
    }

    /// Слияние только переданных измерений вектора
    pub fn set_emotion_vector(&self, patch: EmotionVectorPatch) -> Result<()> {
        self.update(|state| patch.apply(&mut state.config.emotion_control.emo_vector))?;
        self.warn_vector_budget();
        Ok(())
    }

    pub fn set_emotion_mode(&self, mode: EmotionMode) -> Result<()> {
        self.update(|state| state.config.emotion_control.set_mode(mode))
    }

    pub fn set_emotion_dimension(&self, dim: EmotionDimension, value: f32) -> Result<()> {
        self.update(|state| state.config.emotion_control.set_dimension(dim, value))?;
        self.warn_vector_budget();
        Ok(())
    }

    pub fn reset_emotion_vector(&self) -> Result<()> {
        self.update(|state| state.config.emotion_control.reset_vector())
    }

    /// Сбросить конфигурацию и текст к значениям по умолчанию
    pub fn reset_config(&self) -> Result<()> {
        self.update(|state| *state = ConfigState::default())
    }

    fn warn_vector_budget(&self) {
        if let Some(warning) = self.state.read().config.emotion_control.vector_warning() {
            log::warn!("{}", warning);
        }
    }

    // Изменение применяется к копии, сохраняется и только затем публикуется
    fn update(&self, mutate: impl FnOnce(&mut ConfigState)) -> Result<()> {
        let mut guard = self.state.write();
        let mut next = guard.clone();
        mutate(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, state: &ConfigState) -> Result<()> {
        let persisted = PersistedConfig {
            state: PersistedState {
                config: state.config.clone(),
                input_text: match self.policy {
                    InputTextPolicy::Persist => Some(state.input_text.clone()),
                    InputTextPolicy::SessionOnly => None,
                },
            },
            version: 0,
        };
        let value = serde_json::to_value(persisted)?;
        self.storage.set(CONFIG_KEY, value)
    }
}
