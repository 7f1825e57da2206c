//! Emotion control for IndexTTS 2.0 requests
//!
//! Four mutually exclusive input modes share one storage struct so that
//! switching modes never loses what the user entered; [`EmotionControl::active`]
//! gives the sum-type view used for validation and request assembly.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::api::{AudioFile, GatewayBackend};
use crate::error::{Result, StudioError};
use crate::models::EmotionMode;
use crate::store::ConfigStore;

/// Upper bound of a single vector dimension
pub const DIMENSION_MAX: f32 = 1.4;
/// Soft budget for the sum of all dimensions
pub const VECTOR_SUM_BUDGET: f32 = 1.5;
/// Bounds of the emotion mixing weight in audio mode
pub const ALPHA_MAX: f32 = 1.6;
pub const DEFAULT_ALPHA: f32 = 1.0;
/// Upload limit for emotion reference audio
pub const MAX_EMOTION_AUDIO_BYTES: u64 = 10 * 1024 * 1024;
/// Dimensions above this level tint the panel
const DOMINANT_THRESHOLD: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionDimension {
    Happy,
    Angry,
    Sad,
    Fear,
    Disgust,
    Low,
    Surprise,
    Calm,
}

impl EmotionDimension {
    /// Wire order of `emo_vector`
    pub const ALL: [EmotionDimension; 8] = [
        Self::Happy,
        Self::Angry,
        Self::Sad,
        Self::Fear,
        Self::Disgust,
        Self::Low,
        Self::Surprise,
        Self::Calm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Angry => "angry",
            Self::Sad => "sad",
            Self::Fear => "fear",
            Self::Disgust => "disgust",
            Self::Low => "low",
            Self::Surprise => "surprise",
            Self::Calm => "calm",
        }
    }
}

/// Clamp to `[0, max]` and round half-up to one decimal place
fn quantize(value: f32, max: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    let clamped = value.clamp(0.0, max);
    // non-negative, so round() is round-half-up
    ((clamped * 10.0).round() / 10.0).min(max)
}

/// 8-dimensional emotion vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionVector {
    pub happy: f32,
    pub angry: f32,
    pub sad: f32,
    pub fear: f32,
    pub disgust: f32,
    pub low: f32,
    pub surprise: f32,
    pub calm: f32,
}

impl Default for EmotionVector {
    fn default() -> Self {
        Self {
            happy: 0.0,
            angry: 0.0,
            sad: 0.0,
            fear: 0.0,
            disgust: 0.0,
            low: 0.0,
            surprise: 0.0,
            calm: 0.5,
        }
    }
}

impl EmotionVector {
    pub fn get(&self, dim: EmotionDimension) -> f32 {
        match dim {
            EmotionDimension::Happy => self.happy,
            EmotionDimension::Angry => self.angry,
            EmotionDimension::Sad => self.sad,
            EmotionDimension::Fear => self.fear,
            EmotionDimension::Disgust => self.disgust,
            EmotionDimension::Low => self.low,
            EmotionDimension::Surprise => self.surprise,
            EmotionDimension::Calm => self.calm,
        }
    }

    fn slot(&mut self, dim: EmotionDimension) -> &mut f32 {
        match dim {
            EmotionDimension::Happy => &mut self.happy,
            EmotionDimension::Angry => &mut self.angry,
            EmotionDimension::Sad => &mut self.sad,
            EmotionDimension::Fear => &mut self.fear,
            EmotionDimension::Disgust => &mut self.disgust,
            EmotionDimension::Low => &mut self.low,
            EmotionDimension::Surprise => &mut self.surprise,
            EmotionDimension::Calm => &mut self.calm,
        }
    }

    /// Store `value` clamped to `[0, 1.4]` and rounded to one decimal
    pub fn set(&mut self, dim: EmotionDimension, value: f32) {
        *self.slot(dim) = quantize(value, DIMENSION_MAX);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn sum(&self) -> f32 {
        self.to_array().iter().sum()
    }

    /// Informational only; generation is never blocked by it
    pub fn is_over_budget(&self) -> bool {
        self.sum() > VECTOR_SUM_BUDGET
    }

    pub fn to_array(&self) -> [f32; 8] {
        EmotionDimension::ALL.map(|dim| self.get(dim))
    }

    /// Strongest dimension, if it stands out enough to matter
    pub fn dominant(&self) -> Option<(EmotionDimension, f32)> {
        EmotionDimension::ALL
            .iter()
            .map(|&dim| (dim, self.get(dim)))
            .fold(None, |best: Option<(EmotionDimension, f32)>, cur| match best {
                Some(b) if b.1 >= cur.1 => Some(b),
                _ => Some(cur),
            })
            .filter(|(_, value)| *value > DOMINANT_THRESHOLD)
    }
}

/// Partial update of an [`EmotionVector`]; unset dimensions are left alone
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EmotionVectorPatch {
    pub happy: Option<f32>,
    pub angry: Option<f32>,
    pub sad: Option<f32>,
    pub fear: Option<f32>,
    pub disgust: Option<f32>,
    pub low: Option<f32>,
    pub surprise: Option<f32>,
    pub calm: Option<f32>,
}

impl EmotionVectorPatch {
    pub fn single(dim: EmotionDimension, value: f32) -> Self {
        let mut patch = Self::default();
        match dim {
            EmotionDimension::Happy => patch.happy = Some(value),
            EmotionDimension::Angry => patch.angry = Some(value),
            EmotionDimension::Sad => patch.sad = Some(value),
            EmotionDimension::Fear => patch.fear = Some(value),
            EmotionDimension::Disgust => patch.disgust = Some(value),
            EmotionDimension::Low => patch.low = Some(value),
            EmotionDimension::Surprise => patch.surprise = Some(value),
            EmotionDimension::Calm => patch.calm = Some(value),
        }
        patch
    }

    fn value(&self, dim: EmotionDimension) -> Option<f32> {
        match dim {
            EmotionDimension::Happy => self.happy,
            EmotionDimension::Angry => self.angry,
            EmotionDimension::Sad => self.sad,
            EmotionDimension::Fear => self.fear,
            EmotionDimension::Disgust => self.disgust,
            EmotionDimension::Low => self.low,
            EmotionDimension::Surprise => self.surprise,
            EmotionDimension::Calm => self.calm,
        }
    }

    pub fn apply(&self, vector: &mut EmotionVector) {
        for dim in EmotionDimension::ALL {
            if let Some(value) = self.value(dim) {
                vector.set(dim, value);
            }
        }
    }
}

/// Storage for all four modes at once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmotionControl {
    pub mode: EmotionMode,
    pub emo_audio_path: Option<String>,
    pub emo_alpha: f32,
    pub emo_vector: EmotionVector,
    pub emo_text: String,
}

impl Default for EmotionControl {
    fn default() -> Self {
        Self {
            mode: EmotionMode::Preset,
            emo_audio_path: None,
            emo_alpha: DEFAULT_ALPHA,
            emo_vector: EmotionVector::default(),
            emo_text: String::new(),
        }
    }
}

/// The fields that matter for the currently selected mode
#[derive(Debug, Clone, PartialEq)]
pub enum EmotionSelection<'a> {
    Preset,
    Audio { path: Option<&'a str>, alpha: f32 },
    Vector(&'a EmotionVector),
    /// `None` means "derive emotion from the synthesis input"
    Text { text: Option<&'a str> },
}

impl EmotionControl {
    pub fn active(&self) -> EmotionSelection<'_> {
        match self.mode {
            EmotionMode::Preset => EmotionSelection::Preset,
            EmotionMode::Audio => EmotionSelection::Audio {
                path: self.emo_audio_path.as_deref(),
                alpha: self.emo_alpha,
            },
            EmotionMode::Vector => EmotionSelection::Vector(&self.emo_vector),
            EmotionMode::Text => EmotionSelection::Text {
                text: Some(self.emo_text.as_str()).filter(|t| !t.is_empty()),
            },
        }
    }

    /// Plain assignment; inactive fields are kept
    pub fn set_mode(&mut self, mode: EmotionMode) {
        self.mode = mode;
    }

    pub fn set_dimension(&mut self, dim: EmotionDimension, value: f32) {
        self.emo_vector.set(dim, value);
    }

    pub fn reset_vector(&mut self) {
        self.emo_vector.reset();
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.emo_alpha = if alpha.is_nan() {
            DEFAULT_ALPHA
        } else {
            alpha.clamp(0.0, ALPHA_MAX)
        };
    }

    /// Warning surfaced next to the vector knobs, never an error
    pub fn vector_warning(&self) -> Option<String> {
        if self.mode == EmotionMode::Vector && self.emo_vector.is_over_budget() {
            Some(format!(
                "Emotion vector sum {:.1} exceeds recommended {:.1}",
                self.emo_vector.sum(),
                VECTOR_SUM_BUDGET
            ))
        } else {
            None
        }
    }
}

/// Partial update of an [`EmotionControl`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmotionControlPatch {
    pub mode: Option<EmotionMode>,
    /// `Some(None)` clears the uploaded reference
    pub emo_audio_path: Option<Option<String>>,
    pub emo_alpha: Option<f32>,
    pub emo_vector: Option<EmotionVectorPatch>,
    pub emo_text: Option<String>,
}

impl EmotionControlPatch {
    pub fn apply(self, control: &mut EmotionControl) {
        if let Some(mode) = self.mode {
            control.set_mode(mode);
        }
        if let Some(path) = self.emo_audio_path {
            control.emo_audio_path = path;
        }
        if let Some(alpha) = self.emo_alpha {
            control.set_alpha(alpha);
        }
        if let Some(vector) = self.emo_vector {
            vector.apply(&mut control.emo_vector);
        }
        if let Some(text) = self.emo_text {
            control.emo_text = text;
        }
    }
}

/// Check an emotion reference file before anything is sent
pub fn validate_emotion_audio(file_name: &str, size: u64, max_bytes: u64) -> Result<()> {
    if !file_name.to_lowercase().ends_with(".wav") {
        return Err(StudioError::validation("Only .wav format supported"));
    }
    if size > max_bytes {
        return Err(StudioError::validation(format!(
            "File too large (max {}MB)",
            max_bytes / (1024 * 1024)
        )));
    }
    Ok(())
}

/// UI state that sits next to the emotion control but is never persisted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmotionAudioState {
    pub uploaded_file_name: Option<String>,
    pub upload_error: Option<String>,
    pub is_uploading: bool,
}

/// Drives the audio-reference upload and mode switching
pub struct EmotionAudioUploader {
    backend: Arc<dyn GatewayBackend>,
    config: Arc<ConfigStore>,
    state: Mutex<EmotionAudioState>,
    max_bytes: u64,
}

impl EmotionAudioUploader {
    pub fn new(
        backend: Arc<dyn GatewayBackend>,
        config: Arc<ConfigStore>,
        max_bytes: u64,
    ) -> Self {
        Self {
            backend,
            config,
            state: Mutex::new(EmotionAudioState::default()),
            max_bytes,
        }
    }

    pub fn state(&self) -> EmotionAudioState {
        self.state.lock().clone()
    }

    /// Switch mode and drop a stale upload error
    pub fn set_mode(&self, mode: EmotionMode) -> Result<()> {
        self.config.set_emotion_mode(mode)?;
        self.state.lock().upload_error = None;
        Ok(())
    }

    /// Validate, upload and remember the server-side path
    ///
    /// On any failure the error is recorded in [`EmotionAudioState`] and
    /// returned; `emo_audio_path` keeps its previous value.
    pub async fn upload(&self, file_name: &str, data: Bytes) -> Result<String> {
        if let Err(err) = validate_emotion_audio(file_name, data.len() as u64, self.max_bytes) {
            log::warn!("Rejected emotion reference {}: {}", file_name, err);
            self.state.lock().upload_error = Some(err.user_message());
            return Err(err);
        }

        {
            let mut state = self.state.lock();
            state.is_uploading = true;
            state.upload_error = None;
        }

        let file = AudioFile::new(file_name, data);
        let outcome = self.backend.upload_emotion_audio(file).await;

        let result = match outcome {
            Ok(response) => match (response.success, response.file_path) {
                (true, Some(path)) => self
                    .config
                    .set_emotion_control(EmotionControlPatch {
                        emo_audio_path: Some(Some(path.clone())),
                        ..Default::default()
                    })
                    .map(|_| path),
                _ => Err(StudioError::backend(
                    None,
                    response.message.unwrap_or_else(|| "Upload failed".to_string()),
                )),
            },
            Err(err) => Err(err),
        };

        let mut state = self.state.lock();
        state.is_uploading = false;
        match &result {
            Ok(path) => {
                log::info!("Emotion reference {} stored as {}", file_name, path);
                state.uploaded_file_name = Some(file_name.to_string());
            }
            Err(err) => {
                log::error!("Emotion reference upload failed: {}", err);
                let message = match err {
                    StudioError::Backend { .. } | StudioError::Validation(_) => err.user_message(),
                    _ => "Upload failed".to_string(),
                };
                state.upload_error = Some(message);
            }
        }
        result
    }

    /// Forget the uploaded reference
    pub fn clear(&self) -> Result<()> {
        self.config.set_emotion_control(EmotionControlPatch {
            emo_audio_path: Some(None),
            ..Default::default()
        })?;
        self.state.lock().uploaded_file_name = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeBackend;
    use crate::models::EmotionUploadResponse;
    use crate::store::{InputTextPolicy, MemoryStorage};

    fn uploader(backend: Arc<FakeBackend>) -> (EmotionAudioUploader, Arc<ConfigStore>) {
        let storage = Arc::new(MemoryStorage::new());
        let config = Arc::new(ConfigStore::load(storage, InputTextPolicy::SessionOnly));
        let uploader = EmotionAudioUploader::new(backend, config.clone(), MAX_EMOTION_AUDIO_BYTES);
        (uploader, config)
    }

    #[test]
    fn test_dimension_clamped_and_rounded() {
        let mut vector = EmotionVector::default();
        vector.set(EmotionDimension::Happy, 2.7);
        assert_eq!(vector.happy, 1.4);
        vector.set(EmotionDimension::Angry, -0.3);
        assert_eq!(vector.angry, 0.0);
        vector.set(EmotionDimension::Sad, 0.25);
        assert_eq!(vector.sad, 0.3);
        vector.set(EmotionDimension::Fear, 0.44);
        assert_eq!(vector.fear, 0.4);
        vector.set(EmotionDimension::Low, f32::NAN);
        assert_eq!(vector.low, 0.0);

        for value in vector.to_array() {
            assert!((0.0..=DIMENSION_MAX).contains(&value));
            assert!(((value * 10.0).round() - value * 10.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_reset_restores_default() {
        let mut vector = EmotionVector::default();
        for dim in EmotionDimension::ALL {
            vector.set(dim, 1.1);
        }
        vector.reset();
        assert_eq!(vector, EmotionVector::default());
        assert_eq!(vector.calm, 0.5);
        assert_eq!(vector.sum(), 0.5);
    }

    #[test]
    fn test_over_budget_is_soft() {
        let mut control = EmotionControl::default();
        control.set_mode(EmotionMode::Vector);
        assert!(control.vector_warning().is_none());

        control.set_dimension(EmotionDimension::Happy, 1.0);
        control.set_dimension(EmotionDimension::Surprise, 0.5);
        assert!(control.emo_vector.is_over_budget());
        assert!(control.vector_warning().is_some());

        // other modes do not warn about a vector they will not send
        control.set_mode(EmotionMode::Preset);
        assert!(control.vector_warning().is_none());
    }

    #[test]
    fn test_mode_switch_keeps_vector() {
        let mut control = EmotionControl::default();
        control.set_mode(EmotionMode::Vector);
        control.set_dimension(EmotionDimension::Angry, 0.9);
        control.set_mode(EmotionMode::Text);
        control.emo_text = "furious".to_string();
        control.set_mode(EmotionMode::Vector);

        assert_eq!(control.emo_vector.angry, 0.9);
        assert_eq!(control.emo_text, "furious");
        assert!(matches!(control.active(), EmotionSelection::Vector(v) if v.angry == 0.9));
    }

    #[test]
    fn test_active_text_view() {
        let mut control = EmotionControl::default();
        control.set_mode(EmotionMode::Text);
        assert_eq!(control.active(), EmotionSelection::Text { text: None });
        control.emo_text = "calm and slow".to_string();
        assert_eq!(control.active(), EmotionSelection::Text { text: Some("calm and slow") });
    }

    #[test]
    fn test_alpha_clamped() {
        let mut control = EmotionControl::default();
        control.set_alpha(3.0);
        assert_eq!(control.emo_alpha, ALPHA_MAX);
        control.set_alpha(-1.0);
        assert_eq!(control.emo_alpha, 0.0);
    }

    #[test]
    fn test_dominant() {
        let vector = EmotionVector::default();
        assert_eq!(vector.dominant(), Some((EmotionDimension::Calm, 0.5)));

        let mut vector = EmotionVector::default();
        vector.set(EmotionDimension::Calm, 0.2);
        assert_eq!(vector.dominant(), None);
        vector.set(EmotionDimension::Fear, 0.8);
        assert_eq!(vector.dominant(), Some((EmotionDimension::Fear, 0.8)));
    }

    #[test]
    fn test_validate_emotion_audio() {
        assert!(validate_emotion_audio("ref.WAV", 1024, MAX_EMOTION_AUDIO_BYTES).is_ok());
        let err = validate_emotion_audio("ref.mp3", 1024, MAX_EMOTION_AUDIO_BYTES).unwrap_err();
        assert_eq!(err.user_message(), "Only .wav format supported");
        let err = validate_emotion_audio("ref.wav", 12 * 1024 * 1024, MAX_EMOTION_AUDIO_BYTES)
            .unwrap_err();
        assert_eq!(err.user_message(), "File too large (max 10MB)");
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected_without_network() {
        let backend = Arc::new(FakeBackend::new());
        let (uploader, config) = uploader(backend.clone());
        config
            .set_emotion_control(EmotionControlPatch {
                emo_audio_path: Some(Some("/srv/emo/previous.wav".to_string())),
                ..Default::default()
            })
            .unwrap();

        let data = Bytes::from(vec![0u8; 12 * 1024 * 1024]);
        let err = uploader.upload("big.wav", data).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(backend.calls("upload_emotion_audio"), 0);
        assert_eq!(
            config.config().emotion_control.emo_audio_path.as_deref(),
            Some("/srv/emo/previous.wav")
        );
        assert_eq!(
            uploader.state().upload_error.as_deref(),
            Some("File too large (max 10MB)")
        );
    }

    #[tokio::test]
    async fn test_successful_upload_stores_path() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_emotion_upload(Ok(EmotionUploadResponse {
            success: true,
            file_path: Some("/srv/emo/abc.wav".to_string()),
            message: None,
        }));
        let (uploader, config) = uploader(backend.clone());

        let path = uploader.upload("angry.wav", Bytes::from_static(b"RIFF")).await.unwrap();
        assert_eq!(path, "/srv/emo/abc.wav");
        assert_eq!(
            config.config().emotion_control.emo_audio_path.as_deref(),
            Some("/srv/emo/abc.wav")
        );
        let state = uploader.state();
        assert_eq!(state.uploaded_file_name.as_deref(), Some("angry.wav"));
        assert!(!state.is_uploading);

        uploader.clear().unwrap();
        assert_eq!(config.config().emotion_control.emo_audio_path, None);
        assert_eq!(uploader.state().uploaded_file_name, None);
    }

    #[tokio::test]
    async fn test_failed_upload_surfaces_message() {
        let backend = Arc::new(FakeBackend::new());
        backend.set_emotion_upload(Ok(EmotionUploadResponse {
            success: false,
            file_path: None,
            message: None,
        }));
        let (uploader, config) = uploader(backend.clone());

        let err = uploader.upload("a.wav", Bytes::from_static(b"RIFF")).await.unwrap_err();
        assert_eq!(err.user_message(), "Upload failed");
        assert_eq!(config.config().emotion_control.emo_audio_path, None);
        assert_eq!(uploader.state().upload_error.as_deref(), Some("Upload failed"));

        backend.set_emotion_upload(Err(StudioError::backend(Some(413), "payload too large")));
        uploader.upload("a.wav", Bytes::from_static(b"RIFF")).await.unwrap_err();
        assert_eq!(uploader.state().upload_error.as_deref(), Some("payload too large"));

        // switching mode clears the pending error
        uploader.set_mode(EmotionMode::Audio).unwrap();
        assert_eq!(uploader.state().upload_error, None);
        assert_eq!(config.config().emotion_control.mode, EmotionMode::Audio);
    }
}
