use std::io::Cursor;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::broadcast;

use super::{EngineError, SpeechEngine, Utterance, UtteranceEvents, VoiceDescriptor};

const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// Host engine backed by the `espeak-ng` binary and the default audio output.
///
/// One utterance plays at a time; a new submission replaces the current one.
pub struct EspeakEngine {
    inner: Arc<Inner>,
}

struct Inner {
    binary: String,
    output: OutputStreamHandle,
    voices: RwLock<Vec<VoiceDescriptor>>,
    voices_changed: broadcast::Sender<()>,
    generation: AtomicU64,
    playback: Mutex<Playback>,
}

#[derive(Default)]
struct Playback {
    sink: Option<Arc<Sink>>,
    synthesizing: bool,
}

impl EspeakEngine {
    /// Probe for `binary` and an audio device. The voice list loads in the
    /// background and is announced on the voices-changed channel.
    pub fn detect(binary: &str) -> Result<Self, EngineError> {
        let probe = Command::new(binary).arg("--version").output().map_err(|e| {
            EngineError::Unavailable(format!("Failed to run {} (is it installed?): {}", binary, e))
        })?;
        if !probe.status.success() {
            return Err(EngineError::Unavailable(format!(
                "{} --version exited with {}",
                binary, probe.status
            )));
        }

        let (voices_changed, _) = broadcast::channel(4);
        let engine = Self {
            inner: Arc::new(Inner {
                binary: binary.to_string(),
                output: open_output()?,
                voices: RwLock::new(Vec::new()),
                voices_changed,
                generation: AtomicU64::new(0),
                playback: Mutex::new(Playback::default()),
            }),
        };
        engine.load_voices_in_background()?;
        Ok(engine)
    }

    fn load_voices_in_background(&self) -> Result<(), EngineError> {
        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name("espeak-voices".into())
            .spawn(move || match inner.query_voices() {
                Ok(voices) => {
                    tracing::info!("Loaded {} espeak-ng voices", voices.len());
                    *inner.voices.write().unwrap_or_else(PoisonError::into_inner) = voices;
                    let _ = inner.voices_changed.send(());
                }
                Err(e) => tracing::warn!("Failed to list espeak-ng voices: {}", e),
            })?;
        Ok(())
    }
}

// The output stream is not Send, so it lives on its own thread for the
// lifetime of the process; only the handle is shared.
fn open_output() -> Result<OutputStreamHandle, EngineError> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("audio-output".into())
        .spawn(move || match OutputStream::try_default() {
            Ok((_stream, handle)) => {
                if tx.send(Ok(handle)).is_ok() {
                    loop {
                        thread::park();
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e.to_string()));
            }
        })?;

    rx.recv()
        .map_err(|_| EngineError::Unavailable("Audio output thread exited".into()))?
        .map_err(|e| EngineError::Unavailable(format!("No audio output device: {}", e)))
}

impl Inner {
    fn playback(&self) -> MutexGuard<'_, Playback> {
        self.playback.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn query_voices(&self) -> Result<Vec<VoiceDescriptor>, EngineError> {
        let output = Command::new(&self.binary).arg("--voices").output()?;
        if !output.status.success() {
            return Err(EngineError::Rejected(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    fn finish(&self, generation: u64) {
        let mut playback = self.playback();
        if self.is_current(generation) {
            playback.sink = None;
            playback.synthesizing = false;
        }
    }

    fn fail(&self, generation: u64, events: &UtteranceEvents, reason: String) {
        if self.is_current(generation) {
            self.finish(generation);
            events.failed(reason);
        }
    }

    fn play(&self, generation: u64, args: Vec<String>, events: UtteranceEvents) {
        let wav = match synthesize(&self.binary, &args) {
            Ok(wav) => wav,
            Err(e) => return self.fail(generation, &events, e.reason()),
        };

        let sink = match Sink::try_new(&self.output) {
            Ok(sink) => Arc::new(sink),
            Err(e) => return self.fail(generation, &events, format!("Failed to create sink: {}", e)),
        };
        match Decoder::new(Cursor::new(wav)) {
            Ok(source) => sink.append(source.convert_samples::<f32>()),
            Err(e) => return self.fail(generation, &events, format!("Failed to decode: {}", e)),
        }

        {
            let mut playback = self.playback();
            if !self.is_current(generation) {
                sink.stop();
                return;
            }
            playback.sink = Some(Arc::clone(&sink));
            playback.synthesizing = false;
        }

        events.started();
        sink.sleep_until_end();

        if self.is_current(generation) {
            self.finish(generation);
            events.ended();
        }
    }
}

/// Run the synthesizer, returning WAV bytes. A non-zero exit carries
/// espeak-ng's stderr as the rejection reason.
fn synthesize(binary: &str, args: &[String]) -> Result<Vec<u8>, EngineError> {
    let output = Command::new(binary).args(args).output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::Rejected(stderr.trim().to_string()));
    }
    Ok(output.stdout)
}

impl SpeechEngine for EspeakEngine {
    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.inner
            .voices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn speak(&self, utterance: Utterance) -> Result<(), EngineError> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut playback = self.inner.playback();
            if let Some(sink) = playback.sink.take() {
                sink.stop();
            }
            playback.synthesizing = true;
        }

        let args = espeak_args(&utterance);
        let inner = Arc::clone(&self.inner);
        let events = utterance.events;
        let spawned = thread::Builder::new()
            .name("espeak-utterance".into())
            .spawn(move || inner.play(generation, args, events));

        if let Err(e) = spawned {
            self.inner.finish(generation);
            return Err(e.into());
        }
        Ok(())
    }

    fn cancel(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let mut playback = self.inner.playback();
        if let Some(sink) = playback.sink.take() {
            sink.stop();
        }
        playback.synthesizing = false;
    }

    fn pause(&self) {
        if let Some(sink) = &self.inner.playback().sink {
            sink.pause();
        }
    }

    fn resume(&self) {
        if let Some(sink) = &self.inner.playback().sink {
            sink.play();
        }
    }

    fn is_speaking(&self) -> bool {
        let playback = self.inner.playback();
        playback.synthesizing || playback.sink.as_ref().is_some_and(|sink| !sink.empty())
    }

    fn subscribe_voices_changed(&self) -> broadcast::Receiver<()> {
        self.inner.voices_changed.subscribe()
    }
}

/// Command line for synthesizing `utterance` to WAV on stdout.
pub(crate) fn espeak_args(utterance: &Utterance) -> Vec<String> {
    let voice = utterance
        .voice
        .as_ref()
        .map(|v| v.lang.as_str())
        .unwrap_or(&utterance.lang)
        .to_lowercase();
    let words_per_minute = (BASE_WORDS_PER_MINUTE * utterance.rate).round().clamp(80.0, 450.0);
    let pitch = (50.0 * utterance.pitch).round().clamp(0.0, 99.0);
    let amplitude = (100.0 * utterance.volume).round().clamp(0.0, 200.0);

    vec![
        "--stdout".to_string(),
        "-v".to_string(),
        voice,
        "-s".to_string(),
        format!("{}", words_per_minute as u32),
        "-p".to_string(),
        format!("{}", pitch as u32),
        "-a".to_string(),
        format!("{}", amplitude as u32),
        "--".to_string(),
        utterance.text.clone(),
    ]
}

/// Parse `espeak-ng --voices` output.
///
/// Columns: `Pty Language Age/Gender VoiceName File Other Languages`.
pub(crate) fn parse_voice_list(output: &str) -> Vec<VoiceDescriptor> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let _priority = columns.next()?;
            let lang = columns.next()?;
            let _age_gender = columns.next()?;
            let name = columns.next()?;
            Some(VoiceDescriptor::new(name.replace('_', " "), lang, true))
        })
        .collect()
}
