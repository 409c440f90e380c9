use serde::Serialize;
use tokio::time::timeout;

use super::voice::select_voice;
use super::{SpeechController, VoiceDescriptor};

/// Result of probing the host for a language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechSupport {
    pub is_supported: bool,
    pub best_voice: Option<String>,
    pub all_voices: Vec<String>,
}

impl SpeechSupport {
    fn unsupported() -> Self {
        Self {
            is_supported: false,
            best_voice: None,
            all_voices: Vec::new(),
        }
    }
}

impl SpeechController {
    /// Log every voice the engine currently knows and return the snapshot.
    pub fn list_voices(&self) -> Vec<VoiceDescriptor> {
        let Some(engine) = &self.engine else {
            tracing::warn!("No speech engine, no voices to list");
            return Vec::new();
        };

        let voices = engine.voices();
        tracing::info!("All available voices:");
        for (index, voice) in voices.iter().enumerate() {
            tracing::info!(
                "{}. {} ({}) - {}",
                index + 1,
                voice.name,
                voice.lang,
                if voice.local { "Local" } else { "Remote" }
            );
        }
        voices
    }

    /// Report whether `language` can be spoken, waiting briefly for an
    /// inventory that has not loaded yet.
    pub async fn check_support(&self, language: &str) -> SpeechSupport {
        let Some(engine) = &self.engine else {
            return SpeechSupport::unsupported();
        };

        // Subscribe before the first query so a load finishing in between is not missed.
        let mut changes = engine.subscribe_voices_changed();
        let mut voices = engine.voices();
        if voices.is_empty() {
            match timeout(self.timing.inventory_wait, changes.recv()).await {
                Ok(_) => tracing::debug!("Voice inventory changed"),
                Err(_) => tracing::debug!(
                    "Voice inventory still empty after {:?}",
                    self.timing.inventory_wait
                ),
            }
            voices = engine.voices();
        }

        SpeechSupport {
            is_supported: !voices.is_empty(),
            best_voice: select_voice(&voices, language).map(VoiceDescriptor::label),
            all_voices: voices.iter().map(VoiceDescriptor::label).collect(),
        }
    }
}
