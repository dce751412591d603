//! End-to-end conversation flows driven through a scripted voice adapter.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use stellarforge::assistant::{Assistant, AssistantEvent, Phase};
use stellarforge::config::AssistantConfig;
use stellarforge::history::{HistoryStore, JsonFileStore, MemoryStore};
use stellarforge::voice::{ListenOutcome, NullVoice, VoiceIo, VoiceProfile, VoiceTuning};
use tokio::sync::broadcast;

/// Voice adapter that records spoken lines and plays back a scripted list of
/// recognition results. Once the script is exhausted, listening hears nothing.
struct FakeVoice {
    script: Mutex<VecDeque<ListenOutcome>>,
    spoken: Mutex<Vec<String>>,
    listen_calls: AtomicUsize,
}

impl FakeVoice {
    fn scripted<I>(outcomes: I) -> Arc<Self>
    where
        I: IntoIterator<Item = ListenOutcome>,
    {
        Arc::new(Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            spoken: Mutex::new(Vec::new()),
            listen_calls: AtomicUsize::new(0),
        })
    }

    fn heard<I: IntoIterator<Item = &'static str>>(lines: I) -> Arc<Self> {
        Self::scripted(
            lines
                .into_iter()
                .map(|l| ListenOutcome::Heard(l.to_owned()))
                .collect::<Vec<_>>(),
        )
    }

    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    fn listen_count(&self) -> usize {
        self.listen_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceIo for FakeVoice {
    fn voices(&self) -> Vec<VoiceProfile> {
        vec![VoiceProfile {
            name: "Fake English (UK Male)".to_owned(),
            language: "en-GB".to_owned(),
        }]
    }

    async fn speak(
        &self,
        text: &str,
        _voice: Option<&VoiceProfile>,
        _tuning: VoiceTuning,
    ) -> stellarforge::Result<()> {
        self.spoken.lock().unwrap().push(text.to_owned());
        Ok(())
    }

    async fn listen_once(&self) -> stellarforge::Result<ListenOutcome> {
        self.listen_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        Ok(next.unwrap_or(ListenOutcome::NoSpeech))
    }

    fn cancel(&self) {}
}

/// Config with millisecond-scale delays so flows finish quickly.
fn fast_config() -> AssistantConfig {
    let mut config = AssistantConfig::default();
    config.listen.retry_delay_ms = 5;
    config.listen.relisten_delay_ms = 5;
    config.listen.response_delay_ms = 5;
    config.listen.contact_open_delay_ms = 10;
    config.response_seed = Some(7);
    config
}

fn assistant_with(voice: Arc<FakeVoice>, config: AssistantConfig) -> Assistant {
    Assistant::new(config, voice, Arc::new(MemoryStore::default()))
}

/// Drain events until the assistant reports `Idle`, panicking on timeout.
async fn wait_for_idle(rx: &mut broadcast::Receiver<AssistantEvent>) -> Vec<AssistantEvent> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(AssistantEvent::PhaseChanged(Phase::Idle)) => break,
                Ok(event) => seen.push(event),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
    .await
    .expect("assistant did not go idle in time");
    seen
}

/// Collect every event arriving within `window`.
async fn collect_events(
    rx: &mut broadcast::Receiver<AssistantEvent>,
    window: Duration,
) -> Vec<AssistantEvent> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok(event)) => events.push(event),
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => {}
            _ => break,
        }
    }
    events
}

fn count_contact_requests(events: &[AssistantEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, AssistantEvent::ContactFormRequested))
        .count()
}

#[tokio::test]
async fn double_activation_produces_one_greeting() {
    let voice = FakeVoice::scripted([]);
    let assistant = assistant_with(voice.clone(), fast_config());

    assistant.set_active(true);
    assistant.set_active(true);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let spoken = voice.spoken();
    assert_eq!(spoken.len(), 1, "exactly one greeting: {spoken:?}");
    assert!(
        spoken[0].starts_with("Good "),
        "first-ever activation uses the time-of-day greeting: {}",
        spoken[0]
    );
    assert!(spoken[0].contains("Rishi"));
}

#[tokio::test]
async fn greeting_alone_does_not_start_listening() {
    let voice = FakeVoice::scripted([]);
    let assistant = assistant_with(voice.clone(), fast_config());

    assistant.set_active(true);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(voice.listen_count(), 0);
}

#[tokio::test]
async fn speak_is_ignored_while_inactive() {
    let voice = FakeVoice::scripted([]);
    let assistant = assistant_with(voice.clone(), fast_config());

    assistant.speak("nobody hears this");
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(voice.spoken().is_empty());

    assistant.set_active(true);
    assistant.speak("manual line");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let spoken = voice.spoken();
    assert_eq!(spoken.len(), 2, "greeting plus the queued line: {spoken:?}");
    assert_eq!(spoken[1], "manual line");
}

#[tokio::test]
async fn yes_to_contact_question_opens_form_once() {
    let voice = FakeVoice::heard(["yes please"]);
    let assistant = assistant_with(voice.clone(), fast_config());
    let mut events = assistant.subscribe();

    assistant.set_active(true);
    assistant.start_listening_with_delay(Duration::ZERO);

    let events = collect_events(&mut events, Duration::from_millis(300)).await;
    assert_eq!(
        count_contact_requests(&events),
        1,
        "contact form fires exactly once: {events:?}"
    );

    let spoken = voice.spoken();
    assert_eq!(spoken.len(), 2, "greeting plus confirmation: {spoken:?}");
    assert!(spoken[1].contains("contact form"), "got: {}", spoken[1]);
    assert_eq!(
        voice.listen_count(),
        1,
        "no listening resumes after the handoff"
    );
}

#[tokio::test]
async fn no_to_contact_question_continues_conversation() {
    let voice = FakeVoice::heard(["no thanks", "what skills does he have"]);
    let assistant = assistant_with(voice.clone(), fast_config());
    let mut events = assistant.subscribe();

    assistant.set_active(true);
    assistant.start_listening_with_delay(Duration::ZERO);

    let seen = wait_for_idle(&mut events).await;
    assert_eq!(count_contact_requests(&seen), 0);

    let spoken = voice.spoken();
    assert_eq!(spoken.len(), 3, "greeting, decline ack, skills reply: {spoken:?}");
    assert!(spoken[1].contains("No problem"), "got: {}", spoken[1]);
    assert!(spoken[2].contains("React"), "got: {}", spoken[2]);
}

#[tokio::test]
async fn contact_keyword_mid_conversation_hands_off() {
    let voice = FakeVoice::heard(["no thanks", "how do i contact him"]);
    let assistant = assistant_with(voice.clone(), fast_config());
    let mut events = assistant.subscribe();

    assistant.set_active(true);
    assistant.start_listening_with_delay(Duration::ZERO);

    let events = collect_events(&mut events, Duration::from_millis(400)).await;
    assert_eq!(count_contact_requests(&events), 1);

    let spoken = voice.spoken();
    assert_eq!(spoken.len(), 3, "{spoken:?}");
    assert!(
        spoken[2].contains("open the contact form"),
        "got: {}",
        spoken[2]
    );
    assert_eq!(
        voice.listen_count(),
        2,
        "no listening resumes after the handoff"
    );
}

#[tokio::test]
async fn stop_command_ends_interaction() {
    let voice = FakeVoice::heard(["please stop now"]);
    let assistant = assistant_with(voice.clone(), fast_config());
    let mut events = assistant.subscribe();

    assistant.set_active(true);
    assistant.start_listening_with_delay(Duration::ZERO);

    wait_for_idle(&mut events).await;

    let spoken = voice.spoken();
    assert_eq!(spoken.len(), 2, "greeting plus shutdown ack: {spoken:?}");
    assert!(
        spoken[1].contains("powering down") || spoken[1].contains("Shutting down"),
        "got: {}",
        spoken[1]
    );
    assert_eq!(voice.listen_count(), 1);

    // The completed interaction ignores further listen requests.
    assistant.start_listening_with_delay(Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(voice.listen_count(), 1);
}

#[tokio::test]
async fn stop_beats_other_keywords_in_one_transcript() {
    let voice = FakeVoice::heard(["tell me about skills and then power off"]);
    let assistant = assistant_with(voice.clone(), fast_config());
    let mut events = assistant.subscribe();

    assistant.set_active(true);
    assistant.start_listening_with_delay(Duration::ZERO);

    wait_for_idle(&mut events).await;

    let spoken = voice.spoken();
    assert_eq!(spoken.len(), 2, "{spoken:?}");
    assert!(
        !spoken[1].contains("React"),
        "skills reply must not win over stop: {}",
        spoken[1]
    );
    assert_eq!(voice.listen_count(), 1);
}

#[tokio::test]
async fn duplicate_command_within_window_is_debounced() {
    let voice = FakeVoice::heard(["what skills does he have", "what skills does he have"]);
    let assistant = assistant_with(voice.clone(), fast_config());
    let mut events = assistant.subscribe();

    assistant.set_active(true);
    assistant.start_listening_with_delay(Duration::ZERO);

    let seen = wait_for_idle(&mut events).await;

    let spoken = voice.spoken();
    assert_eq!(
        spoken.len(),
        2,
        "greeting plus a single skills reply: {spoken:?}"
    );
    assert!(spoken[1].contains("React"), "got: {}", spoken[1]);

    // Only the first transcript surfaced to the embedding UI.
    let responded = seen
        .iter()
        .filter(|e| matches!(e, AssistantEvent::UserResponded(_)))
        .count();
    assert_eq!(responded, 1);
}

#[tokio::test]
async fn retry_budget_exhaustion_goes_quiet() {
    let voice = FakeVoice::scripted([]);
    let assistant = assistant_with(voice.clone(), fast_config());
    let mut events = assistant.subscribe();

    assistant.set_active(true);
    assistant.start_listening_with_delay(Duration::ZERO);

    wait_for_idle(&mut events).await;

    // Initial attempt plus the full retry budget, then silence.
    assert_eq!(voice.listen_count(), 4);
    assert_eq!(voice.spoken().len(), 1, "no error is ever spoken");
}

#[tokio::test]
async fn reactivation_after_gap_uses_return_greeting() {
    let mut config = fast_config();
    config.greeting.min_inactivity_ms = 30;
    config.greeting.return_window_ms = 10_000;
    let voice = FakeVoice::scripted([]);
    let assistant = assistant_with(voice.clone(), config);

    assistant.set_active(true);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assistant.set_active(false);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assistant.set_active(true);
    tokio::time::sleep(Duration::from_millis(30)).await;

    let spoken = voice.spoken();
    assert_eq!(spoken.len(), 2, "{spoken:?}");
    assert!(spoken[0].starts_with("Good "), "got: {}", spoken[0]);
    assert!(
        !spoken[1].starts_with("Good "),
        "reactivation inside the window gets the return-visitor variant: {}",
        spoken[1]
    );
}

#[tokio::test]
async fn deactivation_cancels_pending_listen() {
    let voice = FakeVoice::heard(["what skills does he have"]);
    let assistant = assistant_with(voice.clone(), fast_config());

    assistant.set_active(true);
    assistant.start_listening_with_delay(Duration::from_millis(200));
    assistant.set_active(false);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(voice.listen_count(), 0, "cancelled timer must not fire");
    assert!(!assistant.is_active());
}

#[tokio::test]
async fn null_voice_degrades_to_noop() {
    let assistant = Assistant::new(
        fast_config(),
        Arc::new(NullVoice),
        Arc::new(MemoryStore::default()),
    );
    assert!(!assistant.is_ready());

    assistant.set_active(true);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The greeting is still logged even though nothing can play it.
    assert_eq!(assistant.history().len(), 1);
    assistant.set_active(false);
    assert!(!assistant.is_active());
}

#[tokio::test]
async fn history_survives_reconstruction() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn HistoryStore> = Arc::new(JsonFileStore::new(dir.path()));

    {
        let voice = FakeVoice::scripted([]);
        let assistant = Assistant::new(fast_config(), voice, store.clone());
        assistant.set_active(true);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assistant.set_active(false);
    }

    let revived = Assistant::new(fast_config(), FakeVoice::scripted([]), store);
    let history = revived.history();
    assert_eq!(history.len(), 1);
    assert!(!history[0].from_user);
}

#[tokio::test]
async fn auto_relisten_resumes_with_persisted_history() {
    // With prior turns on record, the greeting alone is enough to resume
    // listening without an explicit kick.
    let store: Arc<dyn HistoryStore> = Arc::new(MemoryStore::default());
    store
        .save(&[stellarforge::Utterance {
            text: "earlier conversation".to_owned(),
            timestamp_ms: 0,
            from_user: true,
        }])
        .unwrap();

    let voice = FakeVoice::scripted([]);
    let assistant = Assistant::new(fast_config(), voice.clone(), store);
    let mut events = assistant.subscribe();

    assistant.set_active(true);
    wait_for_idle(&mut events).await;

    assert!(voice.listen_count() >= 1, "relisten should start on its own");
}
