use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};

use super::voice::{fallback_lang, select_voice};
use super::{
    EngineEvent, SpeakCallbacks, SpeechEngine, Utterance, UtteranceEvents, UtteranceRequest,
    FULL_VOLUME,
};

pub const UNSUPPORTED_MESSAGE: &str = "Speech synthesis not supported on this host";

/// Timers driving playback. Defaults match what desktop engines need.
#[derive(Debug, Clone)]
pub struct PlaybackTiming {
    /// Pause between cancelling old speech and submitting new speech.
    pub settle_delay: Duration,
    /// Extra cancel-and-wait rounds while the engine still reports speaking.
    pub max_settle_rounds: u32,
    pub watchdog_period: Duration,
    /// Texts longer than this many characters get a pause/resume watchdog.
    pub long_text_threshold: usize,
    /// Upper bound on waiting for an empty voice inventory to populate.
    pub inventory_wait: Duration,
}

impl Default for PlaybackTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            max_settle_rounds: 3,
            watchdog_period: Duration::from_secs(14),
            long_text_threshold: 100,
            inventory_wait: Duration::from_secs(2),
        }
    }
}

struct Session {
    generation: u64,
    watchdog: Option<JoinHandle<()>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
    }
}

#[derive(Default)]
struct SessionState {
    generation: AtomicU64,
    active: Mutex<Option<Session>>,
}

impl SessionState {
    fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }

    /// Invalidate the active session and return the generation for the next one.
    fn supersede(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(previous);
        generation
    }

    fn install(&self, session: Session) {
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(session);
        drop(previous);
    }

    fn finish(&self, generation: u64) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().map(|s| s.generation) == Some(generation) {
            let finished = active.take();
            drop(active);
            drop(finished);
        }
    }

    /// Hand `watchdog` to the session for `generation`, or abort it when
    /// that session has already finished or been superseded.
    fn attach_watchdog(&self, generation: u64, watchdog: JoinHandle<()>) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match active.as_mut() {
            Some(session) if session.generation == generation => {
                session.watchdog = Some(watchdog);
            }
            _ => watchdog.abort(),
        }
    }

    #[cfg(test)]
    fn has_watchdog(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.watchdog.as_ref().is_some_and(|w| !w.is_finished()))
            .unwrap_or(false)
    }
}

/// Owns the host speech engine and enforces one active utterance at a time.
pub struct SpeechController {
    pub(super) engine: Option<Arc<dyn SpeechEngine>>,
    pub(super) timing: PlaybackTiming,
    sessions: Arc<SessionState>,
    // Serializes preemption against submission so a cancel never lands
    // between another request's generation check and its engine submit.
    submit: tokio::sync::Mutex<()>,
}

impl SpeechController {
    pub fn new(engine: Option<Arc<dyn SpeechEngine>>, timing: PlaybackTiming) -> Self {
        Self {
            engine,
            timing,
            sessions: Arc::new(SessionState::default()),
            submit: tokio::sync::Mutex::new(()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    /// Speak `request`, replacing whatever is currently being spoken.
    ///
    /// Returns whether the utterance reached the engine, not whether it was
    /// heard. Failures are reported through `callbacks` and never returned.
    /// A request superseded by a newer one before submission returns `false`
    /// without reporting an error.
    pub async fn speak(&self, request: UtteranceRequest, callbacks: SpeakCallbacks) -> bool {
        let Some(engine) = self.engine.clone() else {
            tracing::warn!("{}", UNSUPPORTED_MESSAGE);
            callbacks.failed(UNSUPPORTED_MESSAGE);
            return false;
        };

        let generation = self.preempt(engine.as_ref()).await;
        self.settle(engine.as_ref(), generation).await;

        let _submit = self.submit.lock().await;
        if !self.sessions.is_current(generation) {
            tracing::debug!("Speak request superseded before submission");
            return false;
        }

        let voices = engine.voices();
        let voice = select_voice(&voices, &request.language).cloned();
        let lang = match &voice {
            Some(voice) => {
                tracing::info!("Using voice: {} for text: {:?}", voice.label(), request.text);
                voice.lang.clone()
            }
            None => {
                let lang = fallback_lang(&request.language);
                tracing::info!("No specific voice found, using language: {}", lang);
                lang.to_string()
            }
        };

        let callbacks = Arc::new(callbacks);
        let utterance = Utterance {
            text: request.text.clone(),
            lang,
            voice,
            rate: request.rate,
            pitch: request.pitch,
            volume: FULL_VOLUME,
            events: self.session_events(generation, Arc::clone(&callbacks)),
        };

        // Installed before submission: the engine may end or fail the
        // utterance from its own thread before `speak` returns.
        self.sessions.install(Session {
            generation,
            watchdog: None,
        });

        if let Err(e) = engine.speak(utterance) {
            tracing::error!("Error starting speech: {}", e);
            self.sessions.finish(generation);
            callbacks.failed(&e.reason());
            return false;
        }

        if request.text.chars().count() > self.timing.long_text_threshold {
            self.sessions.attach_watchdog(
                generation,
                spawn_watchdog(Arc::clone(&engine), self.timing.watchdog_period),
            );
        }

        true
    }

    /// Cancel any speech without submitting anything new.
    pub async fn stop(&self) {
        if let Some(engine) = &self.engine {
            self.preempt(engine.as_ref()).await;
            tracing::info!("Speech stopped");
        }
    }

    #[cfg(test)]
    pub(crate) fn has_active_watchdog(&self) -> bool {
        self.sessions.has_watchdog()
    }

    async fn preempt(&self, engine: &dyn SpeechEngine) -> u64 {
        let _submit = self.submit.lock().await;
        let generation = self.sessions.supersede();
        engine.cancel();
        generation
    }

    // Engines that apply cancel asynchronously may still report speaking
    // after the first delay; keep cancelling for a bounded number of rounds
    // unless a newer request has taken over.
    async fn settle(&self, engine: &dyn SpeechEngine, generation: u64) {
        sleep(self.timing.settle_delay).await;

        let mut rounds = 0;
        while rounds < self.timing.max_settle_rounds
            && engine.is_speaking()
            && self.sessions.is_current(generation)
        {
            rounds += 1;
            tracing::debug!("Engine still speaking after cancel, settle round {}", rounds);
            engine.cancel();
            sleep(self.timing.settle_delay).await;
        }

        if engine.is_speaking() && self.sessions.is_current(generation) {
            tracing::warn!(
                "Engine still reports speaking after {} settle rounds, submitting anyway",
                rounds
            );
        }
    }

    fn session_events(&self, generation: u64, callbacks: Arc<SpeakCallbacks>) -> UtteranceEvents {
        let sessions = Arc::clone(&self.sessions);
        UtteranceEvents::new(move |event| {
            if !sessions.is_current(generation) {
                tracing::debug!("Dropping {:?} from superseded utterance", event);
                return;
            }
            match event {
                EngineEvent::Started => {
                    tracing::info!("Speech started");
                    callbacks.started();
                }
                EngineEvent::Ended => {
                    tracing::info!("Speech ended");
                    sessions.finish(generation);
                    callbacks.ended();
                }
                EngineEvent::Failed(reason) => {
                    tracing::error!("Speech error: {}", reason);
                    sessions.finish(generation);
                    callbacks.failed(&reason);
                }
            }
        })
    }
}

// Some engines silently stop long utterances after an internal buffer
// timeout; a pause/resume pair resets it.
fn spawn_watchdog(engine: Arc<dyn SpeechEngine>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            if !engine.is_speaking() {
                tracing::debug!("Speech watchdog finished");
                break;
            }
            engine.pause();
            engine.resume();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::testing::{EngineCall, FakeEngine};
    use crate::speech::VoiceDescriptor;
    use std::sync::atomic::AtomicUsize;

    const LONG_TEXT: &str = "I would like to go outside and play in the garden with my brother, \
        and after that I want to eat some ice cream please";

    fn controller(engine: &Arc<FakeEngine>) -> SpeechController {
        SpeechController::new(
            Some(Arc::clone(engine) as Arc<dyn SpeechEngine>),
            PlaybackTiming::default(),
        )
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn counting_callbacks(
        starts: &Arc<AtomicUsize>,
        ends: &Arc<AtomicUsize>,
        errors: &Arc<Mutex<Vec<String>>>,
    ) -> SpeakCallbacks {
        let (starts, ends, errors) = (Arc::clone(starts), Arc::clone(ends), Arc::clone(errors));
        SpeakCallbacks::new()
            .on_start(move || {
                starts.fetch_add(1, Ordering::SeqCst);
            })
            .on_end(move || {
                ends.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |reason| errors.lock().unwrap().push(reason.to_string()))
    }

    fn pause_count(engine: &FakeEngine) -> usize {
        engine
            .calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::Pause))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn missing_engine_reports_error_and_returns_false() {
        let controller = SpeechController::new(None, PlaybackTiming::default());
        let errors = Arc::new(Mutex::new(Vec::new()));
        let callbacks = counting_callbacks(&counter(), &counter(), &errors);

        let submitted = controller.speak(UtteranceRequest::new("hello", "en"), callbacks).await;

        assert!(!submitted);
        assert!(!controller.is_available());
        assert_eq!(errors.lock().unwrap().as_slice(), [UNSUPPORTED_MESSAGE]);
    }

    #[tokio::test(start_paused = true)]
    async fn croatian_voice_binds_its_own_tag_for_serbian() {
        let engine = FakeEngine::with_voices(vec![
            VoiceDescriptor::new("Microsoft Ivan", "hr-HR", true),
            VoiceDescriptor::new("Microsoft David", "en-US", true),
        ]);
        let controller = controller(&engine);

        assert!(controller.speak(UtteranceRequest::new("Желим воду", "sr"), SpeakCallbacks::new()).await);

        let utterance = engine.last_utterance().unwrap();
        assert_eq!(utterance.voice.unwrap().name, "Microsoft Ivan");
        assert_eq!(utterance.lang, "hr-HR");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_inventory_uses_direct_language_tag() {
        let engine = FakeEngine::with_voices(Vec::new());
        let controller = controller(&engine);

        assert!(controller.speak(UtteranceRequest::new("water", "en"), SpeakCallbacks::new()).await);
        let utterance = engine.last_utterance().unwrap();
        assert!(utterance.voice.is_none());
        assert_eq!(utterance.lang, "en-US");

        assert!(controller.speak(UtteranceRequest::new("вода", "sr"), SpeakCallbacks::new()).await);
        assert_eq!(engine.last_utterance().unwrap().lang, "sr-RS");
    }

    #[tokio::test(start_paused = true)]
    async fn binds_rate_pitch_and_full_volume() {
        let engine = FakeEngine::with_voices(vec![VoiceDescriptor::new("Daniel", "en-GB", true)]);
        let controller = controller(&engine);

        controller
            .speak(UtteranceRequest::new("hi", "en"), SpeakCallbacks::new())
            .await;
        let utterance = engine.last_utterance().unwrap();
        assert_eq!(utterance.rate, 0.8);
        assert_eq!(utterance.pitch, 1.0);
        assert_eq!(utterance.volume, 1.0);

        controller
            .speak(
                UtteranceRequest::new("hi", "en").with_rate(1.5).with_pitch(0.5),
                SpeakCallbacks::new(),
            )
            .await;
        let utterance = engine.last_utterance().unwrap();
        assert_eq!(utterance.rate, 1.5);
        assert_eq!(utterance.pitch, 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn cancels_before_submitting() {
        let engine = FakeEngine::with_voices(Vec::new());
        let controller = controller(&engine);

        controller
            .speak(UtteranceRequest::new("first", "en"), SpeakCallbacks::new())
            .await;

        let calls = engine.calls();
        assert_eq!(calls.first(), Some(&EngineCall::Cancel));
        assert!(matches!(calls.last(), Some(EngineCall::Speak { text, .. }) if text == "first"));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_session_reports_nothing() {
        let engine = FakeEngine::with_voices(Vec::new());
        let controller = controller(&engine);
        let (a_starts, a_ends, a_errors) = (counter(), counter(), Arc::new(Mutex::new(Vec::new())));
        let (b_starts, b_ends, b_errors) = (counter(), counter(), Arc::new(Mutex::new(Vec::new())));

        assert!(
            controller
                .speak(
                    UtteranceRequest::new("A", "en"),
                    counting_callbacks(&a_starts, &a_ends, &a_errors)
                )
                .await
        );
        let a_events = engine.last_utterance().unwrap().events;
        a_events.started();

        assert!(
            controller
                .speak(
                    UtteranceRequest::new("B", "en"),
                    counting_callbacks(&b_starts, &b_ends, &b_errors)
                )
                .await
        );
        let b_events = engine.last_utterance().unwrap().events;

        // An engine that misbehaves and reports on the cancelled utterance.
        a_events.ended();
        a_events.failed("interrupted");
        b_events.started();
        b_events.ended();

        assert_eq!(a_starts.load(Ordering::SeqCst), 1);
        assert_eq!(a_ends.load(Ordering::SeqCst), 0);
        assert!(a_errors.lock().unwrap().is_empty());
        assert_eq!(b_starts.load(Ordering::SeqCst), 1);
        assert_eq!(b_ends.load(Ordering::SeqCst), 1);

        let calls = engine.calls();
        let b_submit = calls
            .iter()
            .position(|c| matches!(c, EngineCall::Speak { text, .. } if text == "B"))
            .unwrap();
        let a_submit = calls
            .iter()
            .position(|c| matches!(c, EngineCall::Speak { text, .. } if text == "A"))
            .unwrap();
        assert!(calls[a_submit..b_submit].contains(&EngineCall::Cancel));
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_requests_only_submit_the_last() {
        let engine = FakeEngine::with_voices(Vec::new());
        let controller = controller(&engine);

        let (first, second) = tokio::join!(
            controller.speak(UtteranceRequest::new("A", "en"), SpeakCallbacks::new()),
            controller.speak(UtteranceRequest::new("B", "en"), SpeakCallbacks::new()),
        );

        assert!(!first);
        assert!(second);
        let spoken: Vec<_> = engine
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Speak { text, .. } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(spoken, vec!["B".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn long_text_watchdog_pauses_and_resumes_while_speaking() {
        let engine = FakeEngine::with_voices(Vec::new());
        let controller = controller(&engine);

        assert!(controller.speak(UtteranceRequest::new(LONG_TEXT, "en"), SpeakCallbacks::new()).await);
        assert!(controller.has_active_watchdog());
        assert!(engine.is_speaking());

        sleep(Duration::from_secs(13)).await;
        assert_eq!(pause_count(&engine), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(pause_count(&engine), 1);
        let calls = engine.calls();
        assert_eq!(&calls[calls.len() - 2..], &[EngineCall::Pause, EngineCall::Resume]);

        sleep(Duration::from_secs(14)).await;
        assert_eq!(pause_count(&engine), 2);

        engine.set_speaking(false);
        sleep(Duration::from_secs(60)).await;
        assert_eq!(pause_count(&engine), 2);
        assert!(!controller.has_active_watchdog());
    }

    #[tokio::test(start_paused = true)]
    async fn short_text_has_no_watchdog() {
        let engine = FakeEngine::with_voices(Vec::new());
        let controller = controller(&engine);

        controller
            .speak(UtteranceRequest::new("I want water", "en"), SpeakCallbacks::new())
            .await;
        assert!(!controller.has_active_watchdog());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(pause_count(&engine), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn superseding_tears_down_the_previous_watchdog() {
        let engine = FakeEngine::with_voices(Vec::new());
        let controller = controller(&engine);

        for _ in 0..5 {
            controller
                .speak(UtteranceRequest::new(LONG_TEXT, "en"), SpeakCallbacks::new())
                .await;
        }
        controller
            .speak(UtteranceRequest::new("short", "en"), SpeakCallbacks::new())
            .await;
        assert!(engine.is_speaking());
        assert!(!controller.has_active_watchdog());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(pause_count(&engine), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ended_event_stops_the_watchdog() {
        let engine = FakeEngine::with_voices(Vec::new());
        let controller = controller(&engine);

        controller
            .speak(UtteranceRequest::new(LONG_TEXT, "en"), SpeakCallbacks::new())
            .await;
        assert!(controller.has_active_watchdog());

        engine.last_utterance().unwrap().events.ended();
        assert!(!controller.has_active_watchdog());
    }

    #[tokio::test(start_paused = true)]
    async fn utterance_ending_during_submission_leaves_no_watchdog() {
        let engine = FakeEngine::with_voices(Vec::new());
        engine.end_on_submit();
        let controller = controller(&engine);
        let ends = counter();
        let errors = Arc::new(Mutex::new(Vec::new()));

        let submitted = controller
            .speak(
                UtteranceRequest::new(LONG_TEXT, "en"),
                counting_callbacks(&counter(), &ends, &errors),
            )
            .await;

        assert!(submitted);
        assert_eq!(ends.load(Ordering::SeqCst), 1);
        assert!(!controller.has_active_watchdog());

        engine.set_speaking(true);
        sleep(Duration::from_secs(60)).await;
        assert_eq!(pause_count(&engine), 0);
        assert!(errors.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn submission_failure_is_reported_not_raised() {
        let engine = FakeEngine::with_voices(Vec::new());
        engine.fail_next_submission("audio device busy");
        let controller = controller(&engine);
        let errors = Arc::new(Mutex::new(Vec::new()));

        let submitted = controller
            .speak(
                UtteranceRequest::new(LONG_TEXT, "en"),
                counting_callbacks(&counter(), &counter(), &errors),
            )
            .await;

        assert!(!submitted);
        assert!(!controller.has_active_watchdog());
        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0], "audio device busy");
    }

    #[tokio::test(start_paused = true)]
    async fn engine_error_is_forwarded_verbatim() {
        let engine = FakeEngine::with_voices(Vec::new());
        let controller = controller(&engine);
        let errors = Arc::new(Mutex::new(Vec::new()));

        controller
            .speak(
                UtteranceRequest::new("hello", "en"),
                counting_callbacks(&counter(), &counter(), &errors),
            )
            .await;
        engine.last_utterance().unwrap().events.failed("audio-busy");

        assert_eq!(errors.lock().unwrap().as_slice(), ["audio-busy"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_speaking_flag_gets_extra_cancel_rounds() {
        let engine = FakeEngine::with_voices(Vec::new());
        engine.set_speaking(true);
        engine.ignore_cancels(2);
        let controller = controller(&engine);

        assert!(controller.speak(UtteranceRequest::new("hello", "en"), SpeakCallbacks::new()).await);

        let calls = engine.calls();
        assert_eq!(
            &calls[..3],
            &[EngineCall::Cancel, EngineCall::Cancel, EngineCall::Cancel]
        );
        assert!(matches!(calls[3], EngineCall::Speak { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_rounds_are_bounded() {
        let engine = FakeEngine::with_voices(Vec::new());
        engine.set_speaking(true);
        engine.ignore_cancels(100);
        let controller = controller(&engine);

        assert!(controller.speak(UtteranceRequest::new("hello", "en"), SpeakCallbacks::new()).await);

        let cancels = engine
            .calls()
            .iter()
            .filter(|c| matches!(c, EngineCall::Cancel))
            .count();
        assert_eq!(cancels, 1 + PlaybackTiming::default().max_settle_rounds as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_and_silences_the_session() {
        let engine = FakeEngine::with_voices(Vec::new());
        let controller = controller(&engine);
        let ends = counter();

        controller
            .speak(
                UtteranceRequest::new(LONG_TEXT, "en"),
                counting_callbacks(&counter(), &ends, &Arc::new(Mutex::new(Vec::new()))),
            )
            .await;
        let events = engine.last_utterance().unwrap().events;

        controller.stop().await;
        events.ended();

        assert!(!engine.is_speaking());
        assert!(!controller.has_active_watchdog());
        assert_eq!(ends.load(Ordering::SeqCst), 0);
        assert_eq!(engine.calls().last(), Some(&EngineCall::Cancel));
    }
}
