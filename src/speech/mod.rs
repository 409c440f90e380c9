pub mod controller;
#[cfg(feature = "audio-playback")]
pub mod espeak;
pub mod inventory;
#[cfg(test)]
pub mod testing;
pub mod voice;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

pub use controller::{PlaybackTiming, SpeechController};
pub use inventory::SpeechSupport;

pub const DEFAULT_RATE: f32 = 0.8;
pub const DEFAULT_PITCH: f32 = 1.0;
pub const FULL_VOLUME: f32 = 1.0;

/// A synthesis voice as reported by the host engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceDescriptor {
    pub name: String,
    pub lang: String,
    pub local: bool,
}

impl VoiceDescriptor {
    pub fn new(name: impl Into<String>, lang: impl Into<String>, local: bool) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            local,
        }
    }

    /// Display label used by diagnostics, e.g. `Microsoft Ivan (hr-HR)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.lang)
    }
}

/// What a caller asks to be spoken.
#[derive(Debug, Clone)]
pub struct UtteranceRequest {
    pub text: String,
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
}

impl UtteranceRequest {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
            rate: DEFAULT_RATE,
            pitch: DEFAULT_PITCH,
        }
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }
}

/// A fully configured utterance handed to the engine.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub text: String,
    /// Effective language tag: the bound voice's own tag when a voice was found.
    pub lang: String,
    pub voice: Option<VoiceDescriptor>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub events: UtteranceEvents,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Started,
    Ended,
    Failed(String),
}

/// Sink through which an engine reports the lifecycle of one utterance.
#[derive(Clone)]
pub struct UtteranceEvents {
    sink: Arc<dyn Fn(EngineEvent) + Send + Sync>,
}

impl UtteranceEvents {
    pub fn new(sink: impl Fn(EngineEvent) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    pub fn started(&self) {
        (self.sink)(EngineEvent::Started);
    }

    pub fn ended(&self) {
        (self.sink)(EngineEvent::Ended);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        (self.sink)(EngineEvent::Failed(reason.into()));
    }
}

impl fmt::Debug for UtteranceEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UtteranceEvents")
    }
}

type Callback = Box<dyn Fn() + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Optional lifecycle callbacks supplied with a speak request.
#[derive(Default)]
pub struct SpeakCallbacks {
    on_start: Option<Callback>,
    on_end: Option<Callback>,
    on_error: Option<ErrorCallback>,
}

impl SpeakCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_start = Some(Box::new(f));
        self
    }

    pub fn on_end(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_end = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn started(&self) {
        if let Some(f) = &self.on_start {
            f();
        }
    }

    pub(crate) fn ended(&self) {
        if let Some(f) = &self.on_end {
            f();
        }
    }

    pub(crate) fn failed(&self, reason: &str) {
        if let Some(f) = &self.on_error {
            f(reason);
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("Speech engine unavailable: {0}")]
    Unavailable(String),

    #[error("Speech engine rejected utterance: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// The engine's own message, without the category prefix.
    pub fn reason(&self) -> String {
        match self {
            Self::Unavailable(reason) | Self::Rejected(reason) => reason.clone(),
            Self::Io(e) => e.to_string(),
        }
    }
}

/// The host's speech synthesis capability.
///
/// There is a single engine per process. `speak` must not block: playback
/// and event delivery happen asynchronously. After `cancel` the engine must
/// not report events for the cancelled utterance.
pub trait SpeechEngine: Send + Sync {
    /// Point-in-time voice inventory. May be empty until the engine has
    /// finished loading, which it announces on the voices-changed channel.
    fn voices(&self) -> Vec<VoiceDescriptor>;

    fn speak(&self, utterance: Utterance) -> Result<(), EngineError>;

    fn cancel(&self);

    fn pause(&self);

    fn resume(&self);

    /// True while an utterance is queued, playing or paused.
    fn is_speaking(&self) -> bool;

    fn subscribe_voices_changed(&self) -> broadcast::Receiver<()>;
}
