//! Translation of the panel configuration into the gateway request body
//!
//! Both backends' parameter sets are always sent; the gateway picks what
//! applies to the resolved model.

use crate::emotion::EmotionSelection;
use crate::models::{TtsConfig, TtsRequest};

/// Opt-in persistence of the generated audio in the server-side library
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    pub save_audio: bool,
    pub save_name: Option<String>,
}

impl SaveOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            save_audio: true,
            save_name: Some(name.into()),
        }
    }
}

/// Build a request that does not persist anything server-side
pub fn build_request(config: &TtsConfig, text: &str) -> TtsRequest {
    build_request_with(config, text, &SaveOptions::default())
}

pub fn build_request_with(config: &TtsConfig, text: &str, save: &SaveOptions) -> TtsRequest {
    let control = &config.emotion_control;

    let emo_vector = match control.active() {
        EmotionSelection::Vector(vector) => Some(vector.to_array().to_vec()),
        _ => None,
    };
    let use_emo_text = matches!(control.active(), EmotionSelection::Text { .. });

    TtsRequest {
        model: config.model,
        input: text.to_string(),
        voice: config.voice.clone(),
        response_format: config.response_format,
        speed: config.speed,

        language: config.language.clone(),
        ref_audio_id: config.ref_audio_id.clone().filter(|id| !id.is_empty()),

        emotion: config.emotion.clone(),
        temperature: config.temperature,
        top_p: config.top_p,
        top_k: config.top_k,
        repetition_penalty: config.repetition_penalty,

        emotion_mode: control.mode,
        emo_audio_path: control.emo_audio_path.clone().filter(|p| !p.is_empty()),
        emo_alpha: control.emo_alpha,
        emo_vector,
        use_emo_text,
        emo_text: Some(control.emo_text.clone()).filter(|t| !t.is_empty()),

        save_audio: save.save_audio,
        save_name: if save.save_audio {
            save.save_name.clone()
        } else {
            None
        },
    }
}
