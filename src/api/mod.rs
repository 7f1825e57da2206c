//! Gateway collaborator
//!
//! [`GatewayBackend`] is the only way the core talks to the TTS gateway;
//! [`client::GatewayClient`] implements it over HTTP.

pub mod client;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::models::{
    Backend, EmotionUploadResponse, HealthResponse, ModelsResponse, TtsRequest, VerifyKeyResponse,
    VoiceUploadResponse, VoiceVisibility, VoicesResponse,
};

pub use client::GatewayClient;

/// File picked by the user, already read into memory
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub file_name: String,
    pub data: Bytes,
}

impl AudioFile {
    pub fn new(file_name: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Multipart fields of `POST /v1/voices/upload`
#[derive(Debug, Clone)]
pub struct VoiceUpload {
    pub file: AudioFile,
    pub voice_id: String,
    pub backend: Backend,
    pub visibility: VoiceVisibility,
    pub emotion: Option<String>,
    pub ref_text: Option<String>,
    pub private_key: Option<String>,
}

#[async_trait]
pub trait GatewayBackend: Send + Sync {
    /// `POST /v1/audio/speech`, returns the audio body
    async fn synthesize(&self, request: &TtsRequest) -> Result<Bytes>;

    /// `POST /v1/audio/emotion-upload`
    async fn upload_emotion_audio(&self, file: AudioFile) -> Result<EmotionUploadResponse>;

    /// `GET /v1/voices[?backend=]`, with `X-Private-Key` when a key is given
    async fn list_voices(
        &self,
        backend: Option<&str>,
        private_key: Option<&str>,
    ) -> Result<VoicesResponse>;

    /// `POST /v1/voices/verify-key`
    async fn verify_key(&self, private_key: &str) -> Result<VerifyKeyResponse>;

    /// `POST /v1/voices/upload`
    async fn upload_voice(&self, upload: VoiceUpload) -> Result<VoiceUploadResponse>;

    /// `DELETE /v1/voices/{id}?backend=`
    async fn delete_voice(&self, voice_id: &str, backend: &str) -> Result<()>;

    /// `GET /health`
    async fn health(&self) -> Result<HealthResponse>;

    /// `GET /v1/models`
    async fn models(&self) -> Result<ModelsResponse>;
}
