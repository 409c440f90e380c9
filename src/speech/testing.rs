//! Recording engine for exercising the controller without audio hardware.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::{EngineError, SpeechEngine, Utterance, VoiceDescriptor};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Speak { text: String, lang: String },
    Cancel,
    Pause,
    Resume,
}

pub struct FakeEngine {
    voices: Mutex<Vec<VoiceDescriptor>>,
    calls: Mutex<Vec<EngineCall>>,
    utterances: Mutex<Vec<Utterance>>,
    speaking: AtomicBool,
    ignored_cancels: AtomicU32,
    end_on_submit: AtomicBool,
    next_failure: Mutex<Option<String>>,
    voices_changed: broadcast::Sender<()>,
}

impl FakeEngine {
    pub fn with_voices(voices: Vec<VoiceDescriptor>) -> Arc<Self> {
        let (voices_changed, _) = broadcast::channel(4);
        Arc::new(Self {
            voices: Mutex::new(voices),
            calls: Mutex::new(Vec::new()),
            utterances: Mutex::new(Vec::new()),
            speaking: AtomicBool::new(false),
            ignored_cancels: AtomicU32::new(0),
            end_on_submit: AtomicBool::new(false),
            next_failure: Mutex::new(None),
            voices_changed,
        })
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_utterance(&self) -> Option<Utterance> {
        self.utterances.lock().unwrap().last().cloned()
    }

    pub fn set_speaking(&self, speaking: bool) {
        self.speaking.store(speaking, Ordering::SeqCst);
    }

    /// The next `count` cancels leave the speaking flag set.
    pub fn ignore_cancels(&self, count: u32) {
        self.ignored_cancels.store(count, Ordering::SeqCst);
    }

    /// Report `Ended` from inside `speak`, before it returns.
    pub fn end_on_submit(&self) {
        self.end_on_submit.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_submission(&self, reason: &str) {
        *self.next_failure.lock().unwrap() = Some(reason.to_string());
    }

    pub fn load_voices(&self, voices: Vec<VoiceDescriptor>) {
        *self.voices.lock().unwrap() = voices;
        let _ = self.voices_changed.send(());
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SpeechEngine for FakeEngine {
    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.voices.lock().unwrap().clone()
    }

    fn speak(&self, utterance: Utterance) -> Result<(), EngineError> {
        if let Some(reason) = self.next_failure.lock().unwrap().take() {
            return Err(EngineError::Rejected(reason));
        }
        self.record(EngineCall::Speak {
            text: utterance.text.clone(),
            lang: utterance.lang.clone(),
        });
        if self.end_on_submit.load(Ordering::SeqCst) {
            utterance.events.ended();
            self.utterances.lock().unwrap().push(utterance);
            return Ok(());
        }
        self.utterances.lock().unwrap().push(utterance);
        self.speaking.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn cancel(&self) {
        self.record(EngineCall::Cancel);
        let ignored = self.ignored_cancels.load(Ordering::SeqCst);
        if ignored > 0 {
            self.ignored_cancels.store(ignored - 1, Ordering::SeqCst);
        } else {
            self.speaking.store(false, Ordering::SeqCst);
        }
    }

    fn pause(&self) {
        self.record(EngineCall::Pause);
    }

    fn resume(&self) {
        self.record(EngineCall::Resume);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn subscribe_voices_changed(&self) -> broadcast::Receiver<()> {
        self.voices_changed.subscribe()
    }
}
