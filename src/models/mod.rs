// Domain models module
// Wire types of the gateway and the panel's own state records

pub mod api;
pub mod studio;

pub use api::{
    ApiErrorBody, Backend, BackendState, BackendStatus, EmotionMode, EmotionUploadResponse,
    HealthResponse, ModelInfo, ModelType, ModelsResponse, ResponseFormat, TtsRequest,
    VerifyKeyRequest, VerifyKeyResponse, VoiceInfo, VoiceUploadResponse, VoiceVisibility,
    VoicesResponse,
};
pub use studio::{
    AudioResult, ConfigPatch, EMOTION_PRESETS, HistoryItem, LANGUAGE_OPTIONS, SPEED_MAX,
    SPEED_MIN, TtsConfig,
};
