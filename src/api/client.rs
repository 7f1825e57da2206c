//! HTTP client of the TTS gateway

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode, multipart};
use serde::de::DeserializeOwned;

use super::{AudioFile, GatewayBackend, VoiceUpload};
use crate::config::ClientConfig;
use crate::error::{Result, StudioError};
use crate::models::{
    ApiErrorBody, EmotionUploadResponse, HealthResponse, ModelsResponse, TtsRequest,
    VerifyKeyRequest, VerifyKeyResponse, VoiceUploadResponse, VoiceVisibility, VoicesResponse,
};

const PRIVATE_KEY_HEADER: &str = "X-Private-Key";

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, &config.api_base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Pass 2xx responses through, turn the rest into `StudioError::Backend`
    async fn check(response: Response, fallback: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(ApiErrorBody::into_message)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| fallback.to_string());

        log::error!("Gateway request failed (status {}): {}", status, message);
        Err(StudioError::backend(Some(status.as_u16()), message))
    }

    async fn json<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T> {
        let response = Self::check(response, fallback).await?;
        Ok(response.json::<T>().await?)
    }

    fn file_part(file: AudioFile) -> Result<multipart::Part> {
        Ok(multipart::Part::stream(file.data)
            .file_name(file.file_name)
            .mime_str("audio/wav")?)
    }
}

#[async_trait]
impl GatewayBackend for GatewayClient {
    async fn synthesize(&self, request: &TtsRequest) -> Result<Bytes> {
        log::debug!(
            "POST /v1/audio/speech model={} voice={} mode={:?} chars={}",
            request.model.as_str(),
            request.voice,
            request.emotion_mode,
            request.input.chars().count()
        );
        let response = self
            .client
            .post(self.url("/v1/audio/speech"))
            .json(request)
            .send()
            .await?;
        let response = Self::check(response, "Request failed").await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(StudioError::backend(None, "Gateway returned empty audio"));
        }
        Ok(bytes)
    }

    async fn upload_emotion_audio(&self, file: AudioFile) -> Result<EmotionUploadResponse> {
        let form = multipart::Form::new().part("file", Self::file_part(file)?);
        let response = self
            .client
            .post(self.url("/v1/audio/emotion-upload"))
            .multipart(form)
            .send()
            .await?;
        Self::json(response, "Upload failed").await
    }

    async fn list_voices(
        &self,
        backend: Option<&str>,
        private_key: Option<&str>,
    ) -> Result<VoicesResponse> {
        let mut builder = self.client.get(self.url("/v1/voices"));
        if let Some(backend) = backend {
            builder = builder.query(&[("backend", backend)]);
        }
        if let Some(key) = private_key {
            builder = builder.header(PRIVATE_KEY_HEADER, key);
        }
        let response = builder.send().await?;
        Self::json(response, "Request failed").await
    }

    async fn verify_key(&self, private_key: &str) -> Result<VerifyKeyResponse> {
        let response = self
            .client
            .post(self.url("/v1/voices/verify-key"))
            .json(&VerifyKeyRequest { private_key })
            .send()
            .await?;
        Self::json(response, "Verification failed").await
    }

    async fn upload_voice(&self, upload: VoiceUpload) -> Result<VoiceUploadResponse> {
        let mut form = multipart::Form::new()
            .part("file", Self::file_part(upload.file)?)
            .text("voice_id", upload.voice_id)
            .text("backend", upload.backend.as_str())
            .text(
                "visibility",
                match upload.visibility {
                    VoiceVisibility::Public => "public",
                    VoiceVisibility::Private => "private",
                },
            );
        if let Some(emotion) = upload.emotion {
            form = form.text("emotion", emotion);
        }
        if let Some(ref_text) = upload.ref_text {
            form = form.text("ref_text", ref_text);
        }
        if let Some(key) = upload.private_key {
            form = form.text("private_key", key);
        }

        let response = self
            .client
            .post(self.url("/v1/voices/upload"))
            .multipart(form)
            .send()
            .await?;
        Self::json(response, "Upload failed").await
    }

    async fn delete_voice(&self, voice_id: &str, backend: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/v1/voices/{}", voice_id)))
            .query(&[("backend", backend)])
            .send()
            .await?;
        let response = Self::check(response, "Request failed").await?;
        if response.status() != StatusCode::NO_CONTENT {
            log::debug!("Voice {} deleted (status {})", voice_id, response.status());
        }
        Ok(())
    }

    async fn health(&self) -> Result<HealthResponse> {
        let response = self.client.get(self.url("/health")).send().await?;
        Self::json(response, "Request failed").await
    }

    async fn models(&self) -> Result<ModelsResponse> {
        let response = self.client.get(self.url("/v1/models")).send().await?;
        Self::json(response, "Request failed").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Backend, BackendState, TtsConfig};
    use crate::request::build_request;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> GatewayClient {
        GatewayClient::with_client(Client::new(), &format!("{}/", server.url()))
    }

    #[tokio::test]
    async fn test_synthesize_returns_audio_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/audio/speech")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "auto",
                "input": "Привет",
                "emotion_mode": "preset",
                "save_audio": false
            })))
            .with_status(200)
            .with_header("content-type", "audio/wav")
            .with_body(vec![1, 2, 3, 4])
            .create_async()
            .await;

        let request = build_request(&TtsConfig::default(), "Привет");
        let audio = client(&server).synthesize(&request).await.unwrap();
        assert_eq!(audio.as_ref(), &[1, 2, 3, 4]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_backend_error_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/audio/speech")
            .with_status(503)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"IndexTTS backend is offline"}"#)
            .create_async()
            .await;

        let request = build_request(&TtsConfig::default(), "hi");
        let err = client(&server).synthesize(&request).await.unwrap_err();
        match err {
            StudioError::Backend { status, message } => {
                assert_eq!(status, Some(503));
                assert_eq!(message, "IndexTTS backend is offline");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_without_json_falls_back_to_reason() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/voices/verify-key")
            .with_status(500)
            .with_body("oops")
            .create_async()
            .await;

        let err = client(&server).verify_key("abcd").await.unwrap_err();
        assert_eq!(err.user_message(), "Internal Server Error");
    }

    #[tokio::test]
    async fn test_list_voices_sends_private_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/voices")
            .match_query(Matcher::UrlEncoded("backend".into(), "indextts".into()))
            .match_header(PRIVATE_KEY_HEADER, "k-1234")
            .with_status(200)
            .with_body(
                r#"{"voices":[{"id":"v1","name":"Voice","backend":"indextts","visibility":"private"}],"total":1}"#,
            )
            .create_async()
            .await;

        let response = client(&server)
            .list_voices(Some(Backend::IndexTts.as_str()), Some("k-1234"))
            .await
            .unwrap();
        assert_eq!(response.total, 1);
        assert_eq!(response.voices[0].visibility, VoiceVisibility::Private);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_key_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/voices/verify-key")
            .match_body(Matcher::Json(serde_json::json!({"private_key": "abcd"})))
            .with_status(200)
            .with_body(r#"{"valid":true,"voice_count":2,"voice_ids":["a","b"]}"#)
            .create_async()
            .await;

        let response = client(&server).verify_key("abcd").await.unwrap();
        assert!(response.valid);
        assert_eq!(response.voice_ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_emotion_upload_multipart() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/audio/emotion-upload")
            .match_header("content-type", Matcher::Regex("multipart/form-data".to_string()))
            .match_body(Matcher::Regex("filename=\"angry.wav\"".to_string()))
            .with_status(200)
            .with_body(r#"{"success":true,"file_path":"/srv/emo/angry.wav"}"#)
            .create_async()
            .await;

        let file = AudioFile::new("angry.wav", Bytes::from_static(b"RIFF0000WAVE"));
        let response = client(&server).upload_emotion_audio(file).await.unwrap();
        assert!(response.success);
        assert_eq!(response.file_path.as_deref(), Some("/srv/emo/angry.wav"));
    }

    #[tokio::test]
    async fn test_health() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(200)
            .with_body(
                r#"{"status":"ok","version":"1.0.0","backends":[
                    {"id":"qwen3-tts","name":"Qwen3-TTS","url":"http://q","status":"online","model_loaded":true},
                    {"id":"indextts","name":"IndexTTS","url":"http://i","status":"offline"}]}"#,
            )
            .create_async()
            .await;

        let health = client(&server).health().await.unwrap();
        assert_eq!(health.backend("qwen3-tts").unwrap().status, BackendState::Online);
        assert_eq!(health.backend("indextts").unwrap().status, BackendState::Offline);
    }
}
