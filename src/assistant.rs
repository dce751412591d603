//! Interaction flow controller: activation, greeting, and the
//! listen/respond conversation loop.
//!
//! The assistant is an explicitly constructed service. Activation spawns a
//! conversation task that owns the turn cycle (speak → listen → match →
//! speak); deactivation cancels the task's token, which tears down any
//! in-flight synthesis, recognition, or timer. Because the whole cycle runs
//! on one task, speaking and listening can never overlap.

use crate::config::AssistantConfig;
use crate::debounce::DebouncePolicy;
use crate::history::{ConversationLog, HistoryStore, Utterance};
use crate::intent::{self, IntentMatcher, MatchOutcome};
use crate::persona::{self, Persona};
use crate::voice::{ListenOutcome, VoiceIo, VoiceProfile, VoiceTuning, select_preferred_voice};
use chrono::Timelike;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the session command queue.
const COMMAND_QUEUE_SIZE: usize = 8;
/// Capacity of the event broadcast channel.
const EVENT_CHANNEL_SIZE: usize = 32;

/// Lifecycle phase of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No conversation in progress.
    Idle,
    /// Speaking the activation greeting.
    Greeting,
    /// Waiting for one user utterance.
    Listening,
    /// A transcript is being matched and answered.
    Processing,
    /// A stop command was heard; speaking the acknowledgment.
    ShuttingDown,
}

/// Input driving a phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PhaseInput {
    Activated,
    ListenStarted,
    TranscriptHeard,
    ShutdownHeard,
    SessionEnded,
}

/// Single transition function for the conversation lifecycle.
pub(crate) fn next_phase(current: Phase, input: PhaseInput) -> Phase {
    match (current, input) {
        (_, PhaseInput::SessionEnded) => Phase::Idle,
        (_, PhaseInput::ShutdownHeard) => Phase::ShuttingDown,
        (Phase::Idle, PhaseInput::Activated) => Phase::Greeting,
        (Phase::Greeting | Phase::Processing, PhaseInput::ListenStarted) => Phase::Listening,
        (Phase::Listening, PhaseInput::TranscriptHeard) => Phase::Processing,
        (current, _) => current,
    }
}

/// Events emitted to the embedding UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantEvent {
    /// The conversation moved to a new phase.
    PhaseChanged(Phase),
    /// A spoken line finished playing.
    SpeechEnded,
    /// A user transcript was accepted for processing.
    UserResponded(String),
    /// The embedding page should open its contact form.
    ContactFormRequested,
}

/// Transient per-conversation flags, reset on every activation.
#[derive(Debug, Default)]
struct SessionFlags {
    has_asked_about_contact: bool,
    user_wants_contact: bool,
    interaction_completed: bool,
    retry_count: u32,
    last_command: String,
    last_command_at: Option<Instant>,
}

/// State shared between the public handle and the conversation task.
struct SharedState {
    active: AtomicBool,
    speaking: AtomicBool,
    listening: AtomicBool,
    phase: Mutex<Phase>,
    flags: Mutex<SessionFlags>,
    log: Mutex<ConversationLog>,
    matcher: Mutex<IntentMatcher>,
    persona: Mutex<Persona>,
    rng: Mutex<StdRng>,
    /// Epoch ms of the most recent spoken line, for greeting selection.
    last_interaction_ms: AtomicI64,
}

impl SharedState {
    fn apply_phase(&self, events: &broadcast::Sender<AssistantEvent>, input: PhaseInput) {
        let mut phase = lock(&self.phase);
        let next = next_phase(*phase, input);
        if next != *phase {
            debug!("phase {:?} -> {next:?}", *phase);
            *phase = next;
            let _ = events.send(AssistantEvent::PhaseChanged(next));
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Commands processed by the conversation task.
#[derive(Debug)]
enum SessionCommand {
    /// Speak a line, then auto-relisten if the session qualifies.
    Say(String),
    /// Begin a listen cycle after a delay.
    Listen(Duration),
}

struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
    _task: JoinHandle<()>,
}

/// The voice assistant service.
///
/// Construct one per embedding surface and share it behind an [`Arc`];
/// methods take `&self`. Must live inside a Tokio runtime, since
/// activation spawns the conversation task.
pub struct Assistant {
    config: AssistantConfig,
    voice: Arc<dyn VoiceIo>,
    selected_voice: Option<VoiceProfile>,
    tuning: VoiceTuning,
    shared: Arc<SharedState>,
    events: broadcast::Sender<AssistantEvent>,
    session: Mutex<Option<SessionHandle>>,
}

impl Assistant {
    /// Build an assistant over the injected voice engine and history store.
    ///
    /// The persona voice is selected once here; previously persisted history
    /// is reloaded so a conversation survives page reloads.
    #[must_use]
    pub fn new(
        config: AssistantConfig,
        voice: Arc<dyn VoiceIo>,
        store: Arc<dyn HistoryStore>,
    ) -> Self {
        let selected_voice = select_preferred_voice(&voice.voices(), &config.voice);
        match &selected_voice {
            Some(v) => info!("selected voice {} ({})", v.name, v.language),
            None => info!("no suitable voice advertised, using engine default"),
        }

        let persona = Persona::new(&config.persona);
        let matcher = IntentMatcher::new(&persona);
        let rng = match config.response_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let log = ConversationLog::new(config.history.max_entries, store);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let tuning = VoiceTuning::from_config(&config.voice);

        let shared = Arc::new(SharedState {
            active: AtomicBool::new(false),
            speaking: AtomicBool::new(false),
            listening: AtomicBool::new(false),
            phase: Mutex::new(Phase::Idle),
            flags: Mutex::new(SessionFlags::default()),
            log: Mutex::new(log),
            matcher: Mutex::new(matcher),
            persona: Mutex::new(persona),
            rng: Mutex::new(rng),
            last_interaction_ms: AtomicI64::new(chrono::Utc::now().timestamp_millis()),
        });

        Self {
            config,
            voice,
            selected_voice,
            tuning,
            shared,
            events,
            session: Mutex::new(None),
        }
    }

    /// Subscribe to assistant events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AssistantEvent> {
        self.events.subscribe()
    }

    /// Whether a persona voice was found at startup.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.selected_voice.is_some()
    }

    /// The voice chosen at startup, if any.
    #[must_use]
    pub fn selected_voice(&self) -> Option<&VoiceProfile> {
        self.selected_voice.as_ref()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_speaking_now(&self) -> bool {
        self.shared.speaking.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_listening_now(&self) -> bool {
        self.shared.listening.load(Ordering::SeqCst)
    }

    /// Current conversation phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *lock(&self.shared.phase)
    }

    /// Snapshot of the utterance log, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Utterance> {
        lock(&self.shared.log).entries().to_vec()
    }

    /// Drop the utterance log, in memory and in the store.
    pub fn clear_history(&self) {
        lock(&self.shared.log).clear();
    }

    /// Hint shown by the embedding UI after a quiet period.
    #[must_use]
    pub fn reminder(&self) -> String {
        lock(&self.shared.persona).reminder()
    }

    /// Change the assistant display name; canned responses are re-templated.
    pub fn set_assistant_name(&self, name: &str) {
        let mut persona = lock(&self.shared.persona);
        persona.set_assistant_name(name);
        *lock(&self.shared.matcher) = IntentMatcher::new(&persona);
    }

    /// Activate or deactivate the assistant.
    ///
    /// Activation is idempotent: a second call without an intervening
    /// deactivation changes nothing. Deactivation cancels in-flight speech
    /// and listening immediately.
    pub fn set_active(&self, active: bool) {
        if active {
            self.activate();
        } else {
            self.deactivate();
        }
    }

    /// Cancel in-flight synthesis and recognition without deactivating.
    pub fn cancel(&self) {
        self.voice.cancel();
    }

    /// Queue a line to speak in the running session. Ignored while inactive.
    pub fn speak(&self, text: &str) {
        if !self.is_active() {
            return;
        }
        if let Some(handle) = lock(&self.session).as_ref()
            && handle.tx.try_send(SessionCommand::Say(text.to_owned())).is_err()
        {
            warn!("session queue full, dropping spoken line");
        }
    }

    /// Schedule a listen cycle after `delay`. Ignored while inactive or once
    /// the interaction has completed.
    pub fn start_listening_with_delay(&self, delay: Duration) {
        if !self.is_active() || lock(&self.shared.flags).interaction_completed {
            return;
        }
        if let Some(handle) = lock(&self.session).as_ref() {
            let _ = handle.tx.try_send(SessionCommand::Listen(delay));
        }
    }

    fn activate(&self) {
        if self.shared.active.swap(true, Ordering::SeqCst) {
            debug!("already active, ignoring activation");
            return;
        }
        info!("assistant activated");

        {
            let mut flags = lock(&self.shared.flags);
            *flags = SessionFlags::default();
            // The greeting always ends by asking about contact.
            flags.has_asked_about_contact = true;
        }
        let greeting = self.build_greeting();
        self.shared.apply_phase(&self.events, PhaseInput::Activated);

        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let cancel = CancellationToken::new();
        let task = SessionTask {
            config: self.config.clone(),
            voice: Arc::clone(&self.voice),
            selected_voice: self.selected_voice.clone(),
            tuning: self.tuning,
            shared: Arc::clone(&self.shared),
            events: self.events.clone(),
            tx: tx.clone(),
            cancel: cancel.clone(),
            debounce: DebouncePolicy::new(&self.config.debounce),
        };
        let join = tokio::spawn(task.run(rx));

        if tx.try_send(SessionCommand::Say(greeting)).is_err() {
            warn!("failed to queue greeting");
        }
        *lock(&self.session) = Some(SessionHandle {
            tx,
            cancel,
            _task: join,
        });
    }

    fn deactivate(&self) {
        if !self.shared.active.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("assistant deactivated");

        // Completing the interaction blocks any further auto-relisten.
        lock(&self.shared.flags).interaction_completed = true;
        self.voice.cancel();
        if let Some(handle) = lock(&self.session).take() {
            handle.cancel.cancel();
        }
        self.shared.speaking.store(false, Ordering::SeqCst);
        self.shared.listening.store(false, Ordering::SeqCst);
        self.shared.apply_phase(&self.events, PhaseInput::SessionEnded);
    }

    fn build_greeting(&self) -> String {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let last_ms = self.shared.last_interaction_ms.load(Ordering::SeqCst);
        let since_last_ms = now_ms.saturating_sub(last_ms).max(0) as u64;
        let kind = persona::greeting_kind(since_last_ms, &self.config.greeting);
        let hour = chrono::Local::now().hour();

        let persona = lock(&self.shared.persona);
        let mut rng = lock(&self.shared.rng);
        persona.greeting(kind, hour, &mut *rng)
    }
}

/// Owns one activation's conversation cycle.
struct SessionTask {
    config: AssistantConfig,
    voice: Arc<dyn VoiceIo>,
    selected_voice: Option<VoiceProfile>,
    tuning: VoiceTuning,
    shared: Arc<SharedState>,
    events: broadcast::Sender<AssistantEvent>,
    tx: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
    debounce: DebouncePolicy,
}

impl SessionTask {
    async fn run(self, mut rx: mpsc::Receiver<SessionCommand>) {
        loop {
            let command = tokio::select! {
                () = self.cancel.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Some(cmd) => cmd,
                    None => break,
                },
            };
            match command {
                SessionCommand::Say(text) => self.handle_say(text).await,
                SessionCommand::Listen(delay) => self.handle_listen(delay).await,
            }
        }
        debug!("conversation task ended");
    }

    fn is_live(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    /// Speak one line, then schedule a relisten when the session qualifies.
    async fn handle_say(&self, text: String) {
        if !self.is_live() {
            return;
        }
        // Speaking preempts any listening session.
        self.voice.cancel();

        lock(&self.shared.log).push(&text, false);
        self.shared
            .last_interaction_ms
            .store(chrono::Utc::now().timestamp_millis(), Ordering::SeqCst);

        self.shared.speaking.store(true, Ordering::SeqCst);
        let result = tokio::select! {
            () = self.cancel.cancelled() => Ok(()),
            r = self.voice.speak(&text, self.selected_voice.as_ref(), self.tuning) => r,
        };
        self.shared.speaking.store(false, Ordering::SeqCst);

        if let Err(e) = result {
            // Synthesis failures just mark speaking finished.
            warn!("synthesis failed: {e}");
            return;
        }
        if !self.is_live() {
            return;
        }
        let _ = self.events.send(AssistantEvent::SpeechEnded);

        // Auto-relisten once at least one prior turn exists.
        let completed = lock(&self.shared.flags).interaction_completed;
        let has_prior_turns = lock(&self.shared.log).len() > 1;
        if !completed && has_prior_turns {
            let delay = Duration::from_millis(self.config.listen.relisten_delay_ms);
            let _ = self.tx.try_send(SessionCommand::Listen(delay));
        }
    }

    fn listen_allowed(&self) -> bool {
        if !self.is_live() {
            return false;
        }
        if self.shared.speaking.load(Ordering::SeqCst)
            || self.shared.listening.load(Ordering::SeqCst)
        {
            return false;
        }
        !lock(&self.shared.flags).interaction_completed
    }

    /// Wait out `delay`, then capture and process one utterance.
    async fn handle_listen(&self, delay: Duration) {
        if !self.listen_allowed() {
            return;
        }
        if !self.sleep_cancellable(delay).await {
            return;
        }
        if !self.listen_allowed() {
            return;
        }

        self.shared.apply_phase(&self.events, PhaseInput::ListenStarted);
        self.shared.listening.store(true, Ordering::SeqCst);
        debug!("listening for one utterance");
        let outcome = tokio::select! {
            () = self.cancel.cancelled() => {
                self.shared.listening.store(false, Ordering::SeqCst);
                return;
            }
            r = self.voice.listen_once() => r,
        };
        self.shared.listening.store(false, Ordering::SeqCst);

        match outcome {
            Ok(ListenOutcome::Heard(transcript)) => self.handle_transcript(transcript).await,
            Ok(ListenOutcome::NoSpeech) => self.handle_no_speech(),
            Err(e) => {
                // Non-retryable recognition failure resets listening to idle.
                warn!("recognition failed: {e}");
            }
        }
    }

    fn handle_no_speech(&self) {
        let next_attempt = {
            let mut flags = lock(&self.shared.flags);
            if flags.interaction_completed {
                return;
            }
            if flags.retry_count >= self.config.listen.max_retries {
                None
            } else {
                flags.retry_count += 1;
                Some(flags.retry_count)
            }
        };
        match next_attempt {
            Some(attempt) => {
                debug!(
                    "no speech, retrying ({attempt}/{})",
                    self.config.listen.max_retries
                );
                let delay = Duration::from_millis(self.config.listen.retry_delay_ms);
                let _ = self.tx.try_send(SessionCommand::Listen(delay));
            }
            None => {
                debug!("no speech and retry budget exhausted, going quiet");
                self.shared.apply_phase(&self.events, PhaseInput::SessionEnded);
            }
        }
    }

    async fn handle_transcript(&self, transcript: String) {
        // Stale-callback guard: the assistant may have been deactivated
        // while recognition was in flight.
        if !self.is_live() {
            return;
        }
        info!("heard: {transcript}");
        lock(&self.shared.flags).retry_count = 0;
        lock(&self.shared.log).push(&transcript, true);
        self.shared
            .apply_phase(&self.events, PhaseInput::TranscriptHeard);

        // A pending answer to the contact question short-circuits matching.
        let contact_pending = {
            let flags = lock(&self.shared.flags);
            flags.has_asked_about_contact && !flags.user_wants_contact
        };
        if contact_pending {
            if intent::is_affirmative(&transcript) {
                {
                    let mut flags = lock(&self.shared.flags);
                    flags.user_wants_contact = true;
                    flags.interaction_completed = true;
                }
                self.schedule_contact_event();
                let line = lock(&self.shared.persona).contact_confirmed();
                self.handle_say(line).await;
                return;
            }
            if intent::is_negative(&transcript) {
                // Re-arm so the question can come up again later.
                lock(&self.shared.flags).has_asked_about_contact = false;
                let line = lock(&self.shared.persona).contact_declined();
                self.handle_say(line).await;
                return;
            }
        }

        // Near-duplicates of the previous command resume listening silently.
        let debounced = {
            let flags = lock(&self.shared.flags);
            flags.last_command_at.is_some_and(|at| {
                self.debounce
                    .is_duplicate(&transcript, &flags.last_command, at.elapsed())
            })
        };
        if debounced {
            debug!("debounced near-duplicate command");
            let _ = self.tx.try_send(SessionCommand::Listen(self.debounce.window()));
            return;
        }

        let outcome = {
            let matcher = lock(&self.shared.matcher);
            let mut rng = lock(&self.shared.rng);
            matcher.match_transcript(&transcript, &mut *rng)
        };
        {
            let mut flags = lock(&self.shared.flags);
            flags.last_command = transcript.to_lowercase();
            flags.last_command_at = Some(Instant::now());
        }
        let _ = self
            .events
            .send(AssistantEvent::UserResponded(transcript.clone()));

        let response_delay = Duration::from_millis(self.config.listen.response_delay_ms);
        match outcome {
            MatchOutcome::Shutdown(ack) => {
                info!("shutdown command received");
                self.shared
                    .apply_phase(&self.events, PhaseInput::ShutdownHeard);
                lock(&self.shared.flags).interaction_completed = true;
                if !self.sleep_cancellable(response_delay).await {
                    return;
                }
                self.handle_say(ack).await;
                self.shared.apply_phase(&self.events, PhaseInput::SessionEnded);
            }
            MatchOutcome::Contact(line) => {
                {
                    let mut flags = lock(&self.shared.flags);
                    flags.user_wants_contact = true;
                    flags.interaction_completed = true;
                }
                self.schedule_contact_event();
                if !self.sleep_cancellable(response_delay).await {
                    return;
                }
                self.handle_say(line).await;
            }
            MatchOutcome::Reply(text) | MatchOutcome::Fallback(text) => {
                if !self.sleep_cancellable(response_delay).await {
                    return;
                }
                self.handle_say(text).await;
            }
        }
    }

    /// Emit the contact-form event after the configured delay, unless the
    /// assistant is deactivated first.
    fn schedule_contact_event(&self) {
        let events = self.events.clone();
        let cancel = self.cancel.clone();
        let shared = Arc::clone(&self.shared);
        let delay = Duration::from_millis(self.config.listen.contact_open_delay_ms);
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    if shared.active.load(Ordering::SeqCst) {
                        let _ = events.send(AssistantEvent::ContactFormRequested);
                    }
                }
            }
        });
    }

    /// Sleep unless cancelled; returns `false` when the session was torn down.
    async fn sleep_cancellable(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}
