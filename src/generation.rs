// Оркестратор генерации
//
// Idle -> Generating -> Idle. Успешный результат попадает в историю,
// неудачный не оставляет следов кроме сообщения об ошибке.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::api::GatewayBackend;
use crate::error::{Result, StudioError};
use crate::handle::{AudioHandle, HandleMinter};
use crate::models::{AudioResult, ModelType, ResponseFormat, TtsConfig, TtsRequest};
use crate::request::{SaveOptions, build_request_with};
use crate::store::{ConfigStore, HistoryStore};

/// Ограничение шлюза на длину входного текста
pub const MAX_INPUT_CHARS: usize = 5000;

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationState {
    #[default]
    Idle,
    Generating,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    Started,
    Completed { id: String },
    Failed { message: String },
}

/// Сводка успешной генерации, которую получает вызывающий
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAudio {
    pub id: String,
    pub text: String,
    pub uri: Option<String>,
    pub model: ModelType,
    pub voice: String,
    pub duration: Option<f64>,
    pub timestamp: i64,
}

impl From<&AudioResult> for GeneratedAudio {
    fn from(result: &AudioResult) -> Self {
        Self {
            id: result.id.clone(),
            text: result.text.clone(),
            uri: result.handle.uri().map(str::to_string),
            model: result.model,
            voice: result.voice.clone(),
            duration: result.duration,
            timestamp: result.timestamp,
        }
    }
}

/// Счётчик запросов в полёте; уменьшается и при отмене future
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Generator {
    config: Arc<ConfigStore>,
    history: Arc<HistoryStore>,
    backend: Arc<dyn GatewayBackend>,
    minter: Arc<dyn HandleMinter>,
    in_flight: AtomicUsize,
    current: Mutex<Option<GeneratedAudio>>,
    last_error: Mutex<Option<String>>,
    events: broadcast::Sender<GenerationEvent>,
}

impl Generator {
    pub fn new(
        config: Arc<ConfigStore>,
        history: Arc<HistoryStore>,
        backend: Arc<dyn GatewayBackend>,
        minter: Arc<dyn HandleMinter>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            history,
            backend,
            minter,
            in_flight: AtomicUsize::new(0),
            current: Mutex::new(None),
            last_error: Mutex::new(None),
            events,
        }
    }

    pub fn state(&self) -> GenerationState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            GenerationState::Generating
        } else {
            GenerationState::Idle
        }
    }

    pub fn is_generating(&self) -> bool {
        self.state() == GenerationState::Generating
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GenerationEvent> {
        self.events.subscribe()
    }

    /// Последний успешный результат
    pub fn current_result(&self) -> Option<GeneratedAudio> {
        self.current.lock().clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// Сбросить последний результат и ошибку
    pub fn reset(&self) {
        *self.current.lock() = None;
        *self.last_error.lock() = None;
    }

    /// Синтезировать `text` или, если он не передан, сохранённый вводимый текст
    pub async fn generate(&self, text: Option<&str>) -> Result<GeneratedAudio> {
        self.generate_with_options(text, SaveOptions::default()).await
    }

    /// То же, что [`Generator::generate`], с сохранением в библиотеку шлюза
    pub async fn generate_with_options(
        &self,
        text: Option<&str>,
        save: SaveOptions,
    ) -> Result<GeneratedAudio> {
        // пустой аргумент равен отсутствующему: берётся текст из редактора
        let text = match text.filter(|t| !t.is_empty()) {
            Some(text) => text.to_string(),
            None => self.config.input_text(),
        };
        validate_input(&text)?;

        let in_flight = InFlight::enter(&self.in_flight);
        *self.last_error.lock() = None;
        self.emit(GenerationEvent::Started);

        let config = self.config.config();
        let request = build_request_with(&config, &text, &save);
        log::info!(
            "Generating {} chars with model={} voice={}",
            text.chars().count(),
            config.model.as_str(),
            config.voice
        );

        let outcome = self.run(&config, &request, text).await;
        match &outcome {
            Ok(generated) => *self.current.lock() = Some(generated.clone()),
            Err(err) => *self.last_error.lock() = Some(err.user_message()),
        }
        // подписчики видят Idle к моменту получения итогового события
        drop(in_flight);

        match outcome {
            Ok(generated) => {
                log::info!("Generation {} completed", generated.id);
                self.emit(GenerationEvent::Completed {
                    id: generated.id.clone(),
                });
                Ok(generated)
            }
            Err(err) => {
                log::error!("Generation failed: {}", err);
                self.emit(GenerationEvent::Failed {
                    message: err.user_message(),
                });
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        config: &TtsConfig,
        request: &TtsRequest,
        text: String,
    ) -> Result<GeneratedAudio> {
        let audio = self.backend.synthesize(request).await?;
        let handle = AudioHandle::mint(self.minter.clone(), &audio, config.response_format)?;
        let duration = match config.response_format {
            ResponseFormat::Wav => wav_duration(&audio),
            ResponseFormat::Mp3 => None,
        };

        let result = AudioResult {
            id: Uuid::new_v4().to_string(),
            text,
            handle,
            audio: Some(audio),
            model: config.model,
            voice: config.voice.clone(),
            duration,
            timestamp: Utc::now().timestamp_millis(),
        };
        let generated = GeneratedAudio::from(&result);
        self.history.add_result(result)?;
        Ok(generated)
    }

    fn emit(&self, event: GenerationEvent) {
        // нет подписчиков - не ошибка
        let _ = self.events.send(event);
    }
}

fn validate_input(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(StudioError::validation("Please enter text to synthesize"));
    }
    let chars = text.chars().count();
    if chars > MAX_INPUT_CHARS {
        return Err(StudioError::validation(format!(
            "Text is too long ({} characters, max {})",
            chars, MAX_INPUT_CHARS
        )));
    }
    Ok(())
}

/// Длительность WAV в секундах; `None`, если заголовок не читается
fn wav_duration(audio: &Bytes) -> Option<f64> {
    let reader = match hound::WavReader::new(Cursor::new(audio.as_ref())) {
        Ok(reader) => reader,
        Err(e) => {
            log::debug!("Could not read WAV header: {}", e);
            return None;
        }
    };
    let sample_rate = reader.spec().sample_rate;
    if sample_rate == 0 {
        return None;
    }
    Some(reader.duration() as f64 / sample_rate as f64)
}
