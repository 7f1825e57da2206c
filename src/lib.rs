//! Ядро панели управления мульти-бэкендного TTS шлюза
//!
//! Сборка запроса синтеза, управление эмоциями, жизненный цикл генерации,
//! история результатов и доступ к приватным голосам. UI-слой работает
//! только через [`Studio`] и типы, которые она отдаёт.

pub mod api;
pub mod config;
pub mod emotion;
pub mod error;
pub mod generation;
pub mod handle;
pub mod models;
pub mod request;
pub mod store;
pub mod utils;
pub mod voices;

use std::sync::Arc;

pub use crate::api::{GatewayBackend, GatewayClient};
pub use crate::config::ClientConfig;
pub use crate::error::{Result, StudioError};
pub use crate::generation::{GeneratedAudio, GenerationEvent, GenerationState, Generator};
pub use crate::request::{SaveOptions, build_request, build_request_with};

use crate::emotion::EmotionAudioUploader;
use crate::handle::{HandleMinter, TempFileMinter};
use crate::store::{
    ConfigStore, HistoryStore, JsonFileStorage, KeyValueStorage, PrivateAccessSession,
};
use crate::voices::VoiceLibrary;

/// Все компоненты панели, связанные общими хранилищами
pub struct Studio {
    config: ClientConfig,
    config_store: Arc<ConfigStore>,
    history: Arc<HistoryStore>,
    session: Arc<PrivateAccessSession>,
    generator: Generator,
    emotion_audio: EmotionAudioUploader,
    voices: VoiceLibrary,
}

impl Studio {
    /// Файловое хранилище в `data_dir`, HTTP клиент и временные файлы для аудио
    pub fn open(config: ClientConfig) -> Result<Self> {
        let storage = Arc::new(JsonFileStorage::open(&config.data_dir)?);
        let backend = Arc::new(GatewayClient::new(&config)?);
        let minter = Arc::new(TempFileMinter::new()?);
        log::info!(
            "Studio opened: gateway={} storage={}",
            backend.base_url(),
            storage.path().display()
        );
        Ok(Self::with_parts(config, storage, backend, minter))
    }

    /// Собрать из готовых коллабораторов
    pub fn with_parts(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStorage>,
        backend: Arc<dyn GatewayBackend>,
        minter: Arc<dyn HandleMinter>,
    ) -> Self {
        let config_store = Arc::new(ConfigStore::load(storage.clone(), config.input_text_policy));
        let history = Arc::new(HistoryStore::load(storage, config.max_history_items));
        let session = Arc::new(PrivateAccessSession::new());

        let generator =
            Generator::new(config_store.clone(), history.clone(), backend.clone(), minter);
        let emotion_audio = EmotionAudioUploader::new(
            backend.clone(),
            config_store.clone(),
            config.max_emotion_upload_bytes,
        );
        let voices = VoiceLibrary::new(backend, session.clone(), config.max_voice_upload_bytes);

        Self {
            config,
            config_store,
            history,
            session,
            generator,
            emotion_audio,
            voices,
        }
    }

    pub fn client_config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn config_store(&self) -> &Arc<ConfigStore> {
        &self.config_store
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn private_session(&self) -> &Arc<PrivateAccessSession> {
        &self.session
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn emotion_audio(&self) -> &EmotionAudioUploader {
        &self.emotion_audio
    }

    pub fn voices(&self) -> &VoiceLibrary {
        &self.voices
    }

    /// Освободить аудио текущей сессии и забыть приватный ключ
    pub fn close(&self) {
        let released = self.history.clear_session_results();
        self.session.clear_session();
        log::info!("Studio closed, {} audio handles released", released);
    }
}
