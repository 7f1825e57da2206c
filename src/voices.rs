//! Voice catalog access
//!
//! [`resolve_voices`] decides which catalog entries the user may see and
//! pick; [`VoiceLibrary`] wraps the gateway's voice endpoints.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use crate::api::{AudioFile, GatewayBackend, VoiceUpload};
use crate::error::{Result, StudioError};
use crate::models::{
    Backend, BackendState, HealthResponse, ModelInfo, ModelType, VerifyKeyResponse, VoiceInfo,
    VoiceUploadResponse, VoiceVisibility,
};
use crate::store::PrivateAccessSession;

pub const MIN_KEY_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VoiceTab {
    #[default]
    All,
    Public,
    Private,
    /// Only voices of the named backend
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VoiceQuery {
    pub model: ModelType,
    pub tab: VoiceTab,
    pub search: String,
}

/// Filter the catalog down to what the session may see, keeping catalog order
pub fn resolve_voices(
    catalog: &[VoiceInfo],
    query: &VoiceQuery,
    session: &PrivateAccessSession,
) -> Vec<VoiceInfo> {
    let model_backend = query.model.backend();
    let needle = query.search.trim().to_lowercase();

    catalog
        .iter()
        .filter(|voice| {
            voice.visibility == VoiceVisibility::Public || session.is_voice_unlocked(&voice.id)
        })
        .filter(|voice| model_backend.is_none_or(|b| voice.backend == b.as_str()))
        .filter(|voice| match &query.tab {
            VoiceTab::All => true,
            VoiceTab::Public => voice.visibility == VoiceVisibility::Public,
            VoiceTab::Private => voice.visibility == VoiceVisibility::Private,
            VoiceTab::Backend(name) => &voice.backend == name,
        })
        .filter(|voice| needle.is_empty() || matches_search(voice, &needle))
        .cloned()
        .collect()
}

fn matches_search(voice: &VoiceInfo, needle: &str) -> bool {
    voice.name.to_lowercase().contains(needle)
        || voice.id.to_lowercase().contains(needle)
        || voice.emotions.iter().any(|e| e.to_lowercase().contains(needle))
}

/// Group voices by backend in order of first appearance
pub fn group_by_backend(voices: &[VoiceInfo]) -> Vec<(String, Vec<VoiceInfo>)> {
    let mut groups: Vec<(String, Vec<VoiceInfo>)> = Vec::new();
    for voice in voices {
        match groups.iter_mut().find(|(backend, _)| *backend == voice.backend) {
            Some((_, group)) => group.push(voice.clone()),
            None => groups.push((voice.backend.clone(), vec![voice.clone()])),
        }
    }
    groups
}

/// Check a key with the gateway and, if valid, unlock its voices
///
/// Invalid keys leave the session untouched.
pub async fn verify_and_unlock(
    backend: &dyn GatewayBackend,
    session: &PrivateAccessSession,
    key: &str,
) -> Result<VerifyKeyResponse> {
    if key.chars().count() < MIN_KEY_LEN {
        return Err(StudioError::validation(format!(
            "Key must be at least {} characters",
            MIN_KEY_LEN
        )));
    }

    log::debug!("Verifying private key ({} chars)", key.chars().count());
    let response = backend.verify_key(key).await?;
    if !response.valid {
        log::warn!("Private key rejected by gateway");
        return Err(StudioError::validation("Key is invalid or has no private voices"));
    }

    session.unlock(key.to_string(), response.voice_ids.clone());
    log::info!(
        "Private key accepted: {} voices, {} unlocked in session",
        response.voice_count,
        session.unlocked_count()
    );
    Ok(response)
}

/// User input of the voice upload form
#[derive(Debug, Clone)]
pub struct VoiceUploadForm {
    pub file_name: String,
    pub data: Bytes,
    /// Defaults to the file name without `.wav`
    pub voice_id: Option<String>,
    pub backend: Backend,
    pub visibility: VoiceVisibility,
    /// IndexTTS only
    pub emotion: Option<String>,
    /// Qwen3-TTS only
    pub ref_text: Option<String>,
}

impl VoiceUploadForm {
    pub fn new(file_name: impl Into<String>, data: Bytes, backend: Backend) -> Self {
        Self {
            file_name: file_name.into(),
            data,
            voice_id: None,
            backend,
            visibility: VoiceVisibility::Public,
            emotion: None,
            ref_text: None,
        }
    }
}

pub struct VoiceLibrary {
    backend: Arc<dyn GatewayBackend>,
    session: Arc<PrivateAccessSession>,
    max_upload_bytes: u64,
}

impl VoiceLibrary {
    pub fn new(
        backend: Arc<dyn GatewayBackend>,
        session: Arc<PrivateAccessSession>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            backend,
            session,
            max_upload_bytes,
        }
    }

    pub fn session(&self) -> &Arc<PrivateAccessSession> {
        &self.session
    }

    /// Raw catalog; the active key, if any, goes along as `X-Private-Key`
    pub async fn fetch_catalog(&self, backend: Option<Backend>) -> Result<Vec<VoiceInfo>> {
        let key = self.session.active_key();
        let response = self
            .backend
            .list_voices(backend.map(|b| b.as_str()), key.as_deref())
            .await?;
        log::debug!("Voice catalog: {} entries", response.voices.len());
        Ok(response.voices)
    }

    /// Fetch and resolve in one step
    pub async fn voices(&self, query: &VoiceQuery) -> Result<Vec<VoiceInfo>> {
        let catalog = self.fetch_catalog(query.model.backend()).await?;
        Ok(resolve_voices(&catalog, query, &self.session))
    }

    pub async fn verify_and_unlock(&self, key: &str) -> Result<VerifyKeyResponse> {
        verify_and_unlock(self.backend.as_ref(), &self.session, key).await
    }

    pub fn clear_session(&self) {
        self.session.clear_session();
        log::info!("Private voice session cleared");
    }

    pub async fn upload_voice(&self, form: VoiceUploadForm) -> Result<VoiceUploadResponse> {
        let upload = self.prepare_upload(form)?;
        log::info!(
            "Uploading voice {} to {} ({:?})",
            upload.voice_id,
            upload.backend.as_str(),
            upload.visibility
        );

        let response = self.backend.upload_voice(upload).await?;
        if !response.success {
            let message = if response.message.trim().is_empty() {
                "Upload failed".to_string()
            } else {
                response.message
            };
            return Err(StudioError::backend(None, message));
        }
        Ok(response)
    }

    fn prepare_upload(&self, form: VoiceUploadForm) -> Result<VoiceUpload> {
        if !form.file_name.to_lowercase().ends_with(".wav") {
            return Err(StudioError::validation("Only .wav format supported"));
        }
        if form.data.len() as u64 > self.max_upload_bytes {
            return Err(StudioError::validation(format!(
                "File too large (max {}MB)",
                self.max_upload_bytes / (1024 * 1024)
            )));
        }

        let voice_id = form
            .voice_id
            .unwrap_or_else(|| file_stem(&form.file_name))
            .trim()
            .to_string();
        if voice_id.is_empty() {
            return Err(StudioError::validation("Please select a file and enter a voice ID"));
        }

        let private_key = match form.visibility {
            VoiceVisibility::Public => None,
            VoiceVisibility::Private => Some(self.session.active_key().ok_or_else(|| {
                StudioError::validation("Unlock a private key before uploading a private voice")
            })?),
        };

        let (emotion, ref_text) = match form.backend {
            Backend::IndexTts => {
                (Some(form.emotion.unwrap_or_else(|| "default".to_string())), None)
            }
            Backend::Qwen3Tts => (None, form.ref_text.filter(|t| !t.trim().is_empty())),
        };

        Ok(VoiceUpload {
            file: AudioFile::new(form.file_name, form.data),
            voice_id,
            backend: form.backend,
            visibility: form.visibility,
            emotion,
            ref_text,
            private_key,
        })
    }

    pub async fn delete_voice(&self, voice_id: &str, backend: Backend) -> Result<()> {
        self.backend.delete_voice(voice_id, backend.as_str()).await?;
        log::info!("Voice {} removed from {}", voice_id, backend.as_str());
        Ok(())
    }

    pub async fn backend_status(&self) -> Result<HealthResponse> {
        self.backend.health().await
    }

    /// `false` when the gateway itself is unreachable
    pub async fn is_backend_online(&self, backend: Backend) -> bool {
        match self.backend.health().await {
            Ok(health) => health
                .backend(backend.as_str())
                .is_some_and(|status| status.status == BackendState::Online),
            Err(e) => {
                log::warn!("Health check failed: {}", e);
                false
            }
        }
    }

    pub async fn models(&self) -> Result<Vec<ModelInfo>> {
        Ok(self.backend.models().await?.models)
    }
}

fn file_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeBackend;

    fn voice(id: &str, backend: &str, visibility: VoiceVisibility, emotions: &[&str]) -> VoiceInfo {
        VoiceInfo {
            id: id.to_string(),
            name: format!("Voice {}", id.to_uppercase()),
            backend: backend.to_string(),
            emotions: emotions.iter().map(|e| e.to_string()).collect(),
            ref_text: None,
            has_default: true,
            visibility,
        }
    }

    fn catalog() -> Vec<VoiceInfo> {
        vec![
            voice("a", "qwen3-tts", VoiceVisibility::Public, &[]),
            voice("b", "indextts", VoiceVisibility::Public, &["happy", "sad"]),
            voice("c", "indextts", VoiceVisibility::Private, &["angry"]),
        ]
    }

    fn ids(voices: &[VoiceInfo]) -> Vec<&str> {
        voices.iter().map(|v| v.id.as_str()).collect()
    }

    #[test]
    fn test_private_voice_hidden_until_unlocked() {
        let session = PrivateAccessSession::new();
        let query = VoiceQuery::default();
        assert_eq!(ids(&resolve_voices(&catalog(), &query, &session)), vec!["a", "b"]);

        session.add_unlocked_voices(["c"]);
        assert_eq!(ids(&resolve_voices(&catalog(), &query, &session)), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unlocking_one_private_voice_keeps_others_hidden() {
        let catalog = vec![
            voice("p1", "qwen3-tts", VoiceVisibility::Public, &[]),
            voice("x1", "indextts", VoiceVisibility::Private, &[]),
            voice("x2", "indextts", VoiceVisibility::Private, &[]),
        ];
        let session = PrivateAccessSession::new();
        let query = VoiceQuery::default();
        assert_eq!(ids(&resolve_voices(&catalog, &query, &session)), vec!["p1"]);

        session.add_unlocked_voices(["x1"]);
        let resolved = resolve_voices(&catalog, &query, &session);
        let visible = ids(&resolved);
        assert_eq!(visible, vec!["p1", "x1"]);
        assert!(!visible.contains(&"x2"));
    }

    #[test]
    fn test_model_filter() {
        let session = PrivateAccessSession::new();
        session.add_unlocked_voices(["c"]);
        let query = VoiceQuery {
            model: ModelType::IndexTts2,
            ..Default::default()
        };
        assert_eq!(ids(&resolve_voices(&catalog(), &query, &session)), vec!["b", "c"]);

        let query = VoiceQuery {
            model: ModelType::Qwen3Tts,
            ..Default::default()
        };
        assert_eq!(ids(&resolve_voices(&catalog(), &query, &session)), vec!["a"]);
    }

    #[test]
    fn test_private_tab_without_unlock_is_empty() {
        let session = PrivateAccessSession::new();
        let query = VoiceQuery {
            tab: VoiceTab::Private,
            ..Default::default()
        };
        assert!(resolve_voices(&catalog(), &query, &session).is_empty());
    }

    #[test]
    fn test_backend_tab_and_search() {
        let session = PrivateAccessSession::new();
        let query = VoiceQuery {
            tab: VoiceTab::Backend("indextts".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&resolve_voices(&catalog(), &query, &session)), vec!["b"]);

        let query = VoiceQuery {
            search: "  HAPPY ".to_string(),
            ..Default::default()
        };
        assert_eq!(ids(&resolve_voices(&catalog(), &query, &session)), vec!["b"]);

        let query = VoiceQuery {
            search: "voice a".to_string(),
            ..Default::default()
        };
        assert_eq!(ids(&resolve_voices(&catalog(), &query, &session)), vec!["a"]);
    }

    #[test]
    fn test_group_by_backend_keeps_order() {
        let groups = group_by_backend(&catalog());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "qwen3-tts");
        assert_eq!(ids(&groups[1].1), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_short_key_skips_network() {
        let backend = FakeBackend::new();
        let session = PrivateAccessSession::new();
        let err = verify_and_unlock(&backend, &session, "abc").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.calls("verify_key"), 0);
    }

    #[tokio::test]
    async fn test_invalid_key_leaves_session_unchanged() {
        let backend = FakeBackend::new();
        let session = PrivateAccessSession::new();
        session.add_unlocked_voices(["x"]);

        let err = verify_and_unlock(&backend, &session, "wrong-key").await.unwrap_err();
        assert_eq!(err.user_message(), "Key is invalid or has no private voices");
        assert_eq!(session.active_key(), None);
        assert_eq!(session.unlocked_ids(), vec!["x"]);
    }

    #[tokio::test]
    async fn test_valid_key_unlocks() {
        let backend = FakeBackend::new();
        backend.set_verify(Ok(VerifyKeyResponse {
            valid: true,
            voice_count: 1,
            voice_ids: vec!["c".to_string()],
        }));
        let session = PrivateAccessSession::new();

        verify_and_unlock(&backend, &session, "k-1234").await.unwrap();
        assert_eq!(session.active_key().as_deref(), Some("k-1234"));
        assert!(session.is_voice_unlocked("c"));
    }

    fn library() -> (VoiceLibrary, Arc<FakeBackend>, Arc<PrivateAccessSession>) {
        let backend = Arc::new(FakeBackend::new());
        let session = Arc::new(PrivateAccessSession::new());
        let library = VoiceLibrary::new(backend.clone(), session.clone(), 1024);
        (library, backend, session)
    }

    #[tokio::test]
    async fn test_voices_sends_active_key() {
        let (library, backend, session) = library();
        backend.set_voices(catalog());
        session.unlock("k-1234".to_string(), vec!["c".to_string()]);

        let voices = library.voices(&VoiceQuery::default()).await.unwrap();
        assert_eq!(ids(&voices), vec!["a", "b", "c"]);
        assert_eq!(backend.last_private_key().as_deref(), Some("k-1234"));
    }

    #[test]
    fn test_fetch_catalog_by_backend() {
        let (library, backend, _) = library();
        backend.set_voices(catalog());

        let voices = tokio_test::block_on(library.fetch_catalog(Some(Backend::IndexTts))).unwrap();
        assert_eq!(ids(&voices), vec!["b", "c"]);
        // no key active, no header
        assert_eq!(backend.last_private_key(), None);
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let (library, backend, _) = library();

        let form = VoiceUploadForm::new("voice.mp3", Bytes::from_static(b"x"), Backend::IndexTts);
        assert!(library.upload_voice(form).await.unwrap_err().is_validation());

        let form =
            VoiceUploadForm::new("voice.wav", Bytes::from(vec![0u8; 2048]), Backend::IndexTts);
        assert!(library.upload_voice(form).await.unwrap_err().is_validation());

        let mut form =
            VoiceUploadForm::new("voice.wav", Bytes::from_static(b"x"), Backend::IndexTts);
        form.voice_id = Some("   ".to_string());
        assert!(library.upload_voice(form).await.unwrap_err().is_validation());

        let mut form =
            VoiceUploadForm::new("voice.wav", Bytes::from_static(b"x"), Backend::IndexTts);
        form.visibility = VoiceVisibility::Private;
        assert!(library.upload_voice(form).await.unwrap_err().is_validation());

        assert_eq!(backend.calls("upload_voice"), 0);
    }

    #[tokio::test]
    async fn test_upload_fields_per_backend() {
        let (library, backend, session) = library();
        session.set_active_key(Some("k-1234".to_string()));

        let mut form =
            VoiceUploadForm::new("Narrator.WAV", Bytes::from_static(b"x"), Backend::Qwen3Tts);
        form.emotion = Some("happy".to_string());
        form.ref_text = Some("Reference line".to_string());
        form.visibility = VoiceVisibility::Private;
        library.upload_voice(form).await.unwrap();

        let upload = backend.last_upload().unwrap();
        assert_eq!(upload.voice_id, "Narrator");
        assert_eq!(upload.emotion, None);
        assert_eq!(upload.ref_text.as_deref(), Some("Reference line"));
        assert_eq!(upload.private_key.as_deref(), Some("k-1234"));

        let mut form =
            VoiceUploadForm::new("calm.wav", Bytes::from_static(b"x"), Backend::IndexTts);
        form.ref_text = Some("ignored".to_string());
        library.upload_voice(form).await.unwrap();

        let upload = backend.last_upload().unwrap();
        assert_eq!(upload.emotion.as_deref(), Some("default"));
        assert_eq!(upload.ref_text, None);
        assert_eq!(upload.private_key, None);
    }

    #[tokio::test]
    async fn test_unsuccessful_upload_is_error() {
        let (library, backend, _) = library();
        backend.set_voice_upload(Ok(VoiceUploadResponse {
            success: false,
            message: "Voice already exists".to_string(),
            voice_id: None,
            emotion: None,
            backend: None,
            visibility: None,
        }));
        let form = VoiceUploadForm::new("a.wav", Bytes::from_static(b"x"), Backend::IndexTts);
        let err = library.upload_voice(form).await.unwrap_err();
        assert_eq!(err.user_message(), "Voice already exists");
    }

    #[tokio::test]
    async fn test_offline_gateway_reports_backend_offline() {
        let (library, _, _) = library();
        assert!(!library.is_backend_online(Backend::Qwen3Tts).await);
    }
}
