use serde::{Deserialize, Serialize};

/// Target model selector as understood by the gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ModelType {
    #[serde(rename = "qwen3-tts")]
    Qwen3Tts,
    #[serde(rename = "indextts-2.0")]
    IndexTts2,
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qwen3Tts => "qwen3-tts",
            Self::IndexTts2 => "indextts-2.0",
            Self::Auto => "auto",
        }
    }

    /// Name of the backend that serves this model, `None` for `auto`
    pub fn backend(&self) -> Option<Backend> {
        match self {
            Self::Qwen3Tts => Some(Backend::Qwen3Tts),
            Self::IndexTts2 => Some(Backend::IndexTts),
            Self::Auto => None,
        }
    }
}

/// Synthesis engine behind the gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Backend {
    #[serde(rename = "qwen3-tts")]
    Qwen3Tts,
    #[serde(rename = "indextts")]
    IndexTts,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qwen3Tts => "qwen3-tts",
            Self::IndexTts => "indextts",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Wav,
    Mp3,
}

impl ResponseFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmotionMode {
    #[default]
    Preset,
    Audio,
    Vector,
    Text,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VoiceVisibility {
    #[default]
    Public,
    Private,
}

/// Body of `POST /v1/audio/speech`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TtsRequest {
    pub model: ModelType,
    pub input: String,
    pub voice: String,
    pub response_format: ResponseFormat,
    pub speed: f32,

    // Qwen3-TTS
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_audio_id: Option<String>,

    // IndexTTS
    pub emotion: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repetition_penalty: f32,

    // IndexTTS 2.0 emotion control
    pub emotion_mode: EmotionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emo_audio_path: Option<String>,
    pub emo_alpha: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emo_vector: Option<Vec<f32>>,
    pub use_emo_text: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emo_text: Option<String>,

    pub save_audio: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_name: Option<String>,
}

/// Catalog entry returned by `GET /v1/voices`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiceInfo {
    pub id: String,
    pub name: String,
    pub backend: String,
    #[serde(default)]
    pub emotions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_text: Option<String>,
    #[serde(default)]
    pub has_default: bool,
    #[serde(default)]
    pub visibility: VoiceVisibility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoicesResponse {
    pub voices: Vec<VoiceInfo>,
    #[serde(default)]
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionUploadResponse {
    pub success: bool,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceUploadResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub visibility: Option<VoiceVisibility>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyKeyRequest<'a> {
    pub private_key: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyKeyResponse {
    pub valid: bool,
    #[serde(default)]
    pub voice_count: usize,
    #[serde(default)]
    pub voice_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendState {
    Online,
    Offline,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendStatus {
    pub id: String,
    pub name: String,
    pub url: String,
    pub status: BackendState,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(default)]
    pub backends: Vec<BackendStatus>,
}

impl HealthResponse {
    pub fn backend(&self, id: &str) -> Option<&BackendStatus> {
        self.backends.iter().find(|b| b.id == id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub backend: String,
    pub status: String,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
}

/// Error body of a non-2xx gateway response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ApiErrorBody {
    pub fn into_message(self) -> Option<String> {
        if let Some(message) = self.message.filter(|m| !m.trim().is_empty()) {
            return Some(message);
        }
        match self.detail? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}
