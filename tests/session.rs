
use gemini_overlay::client::{GenerationClient, KEY_CHECK_PROMPT};
use gemini_overlay::fade::SystemClock;
use gemini_overlay::history::{ConversationContext, HistoryStore, JsonHistoryStore, Role};
use gemini_overlay::modes::Mode;
use gemini_overlay::session::{
    HistoryPolicy, KeyCheck, KeyVerdict, OverlaySession, SessionConfig, SessionEvent,
    SubmitOutcome, Transition, THINKING_TEXT,
};
use gemini_overlay::visibility::{Visibility, WindowCommand};
use gemini_overlay::OverlayError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use manual_clock::ManualClock;
use tempfile::tempdir;

const WAIT: Duration = Duration::from_secs(5);

/// Blocks every request until the test releases it.
struct GatedClient {
    calls: AtomicUsize,
    gate: Mutex<Receiver<()>>,
}

impl GatedClient {
    fn new() -> (Arc<Self>, Sender<()>) {
        let (tx, rx) = channel();
        let client = Arc::new(Self {
            calls: AtomicUsize::new(0),
            gate: Mutex::new(rx),
        });
        (client, tx)
    }
}

impl GenerationClient for GatedClient {
    fn generate(&self, _prompt: &str) -> Result<String, OverlayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.gate.lock().unwrap().recv();
        Ok("reply".into())
    }
}

/// Answers immediately and remembers every prompt.
#[derive(Default)]
struct RecordingClient {
    prompts: Mutex<Vec<String>>,
}

impl GenerationClient for RecordingClient {
    fn generate(&self, prompt: &str) -> Result<String, OverlayError> {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        Ok(format!("answer {}", prompts.len()))
    }
}

struct FailingClient;

impl GenerationClient for FailingClient {
    fn generate(&self, _prompt: &str) -> Result<String, OverlayError> {
        Err(OverlayError::Transport("network down".into()))
    }
}

struct RejectingClient;

impl GenerationClient for RejectingClient {
    fn generate(&self, _prompt: &str) -> Result<String, OverlayError> {
        Err(OverlayError::InvalidCredential("API key not valid.".into()))
    }
}

struct PanickingClient;

impl GenerationClient for PanickingClient {
    fn generate(&self, _prompt: &str) -> Result<String, OverlayError> {
        panic!("worker blew up");
    }
}

fn instant_config() -> SessionConfig {
    SessionConfig {
        fade_duration: Duration::ZERO,
        ..Default::default()
    }
}

fn session_with(config: SessionConfig, client: Option<Arc<dyn GenerationClient>>) -> OverlaySession {
    OverlaySession::new(config, ConversationContext::new(50), Arc::new(SystemClock))
        .with_client(client)
}

fn make_visible(session: &mut OverlaySession) {
    assert_eq!(session.show(), Transition::Started);
    session.advance();
    assert_eq!(session.visibility(), Visibility::Visible);
    session.take_window_commands();
}

fn visible_session(
    config: SessionConfig,
    client: Option<Arc<dyn GenerationClient>>,
) -> OverlaySession {
    let mut session = session_with(config, client);
    make_visible(&mut session);
    session
}

#[test]
fn repeated_submits_while_loading_issue_one_request() {
    let (client, gate) = GatedClient::new();
    let mut session = session_with(instant_config(), Some(client.clone()));
    make_visible(&mut session);

    assert_eq!(session.submit("hello"), SubmitOutcome::Dispatched);
    assert!(session.is_loading());
    assert!(!session.input_enabled());
    assert_eq!(session.response(), THINKING_TEXT);
    for _ in 0..5 {
        assert_eq!(session.submit("again"), SubmitOutcome::Busy);
    }

    gate.send(()).unwrap();
    assert!(session.pump_blocking(WAIT));
    assert!(!session.is_loading());
    assert!(session.input_enabled());
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);

    let entries: Vec<_> = session.context().entries().cloned().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!((entries[0].role, entries[0].text.as_str()), (Role::User, "hello"));
    assert_eq!(entries[1].text, "reply");
    assert_eq!(entries[1].mode_tag.as_deref(), Some("Normal"));
    assert_eq!(session.response(), "reply");
}

#[test]
fn blank_submit_does_nothing() {
    let mut session = visible_session(instant_config(), Some(Arc::new(FailingClient)));
    assert_eq!(session.submit("   \n"), SubmitOutcome::Empty);
    assert!(session.context().is_empty());
    assert!(!session.is_loading());
}

#[test]
fn hide_is_refused_until_the_request_completes() {
    let (client, gate) = GatedClient::new();
    let mut session = session_with(instant_config(), Some(client));
    make_visible(&mut session);

    session.input_mut().push_str("question");
    assert_eq!(session.submit_input(), SubmitOutcome::Dispatched);
    assert_eq!(session.input(), "");

    assert_eq!(session.hide(), Transition::RefusedWhileLoading);
    assert_eq!(session.toggle(), Transition::RefusedWhileLoading);
    assert_eq!(session.visibility(), Visibility::Visible);

    // a completion for some other request must not clear loading
    session.handle().post(SessionEvent::Completed {
        request: 999,
        outcome: Ok("stale".into()),
    });
    session.pump();
    assert!(session.is_loading());

    gate.send(()).unwrap();
    assert!(session.pump_blocking(WAIT));
    assert_eq!(session.hide(), Transition::Started);
    session.advance();
    assert_eq!(session.visibility(), Visibility::Hidden);
    assert_eq!(session.take_window_commands(), vec![WindowCommand::Hide]);
    assert!(session.context().entries().all(|e| e.text != "stale"));
}

#[test]
fn failed_request_appends_one_error_entry() {
    let mut session = visible_session(instant_config(), Some(Arc::new(FailingClient)));
    assert_eq!(session.submit("hi"), SubmitOutcome::Dispatched);
    assert!(session.pump_blocking(WAIT));

    assert!(!session.is_loading());
    assert!(session.input_enabled());
    assert_eq!(session.context().len(), 2);
    let last = session.context().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(last.is_error);
    assert_eq!(
        last.text,
        OverlayError::Transport("network down".into()).display_message()
    );
    assert_eq!(session.response(), last.text);
    assert_eq!(session.last_response(), None);
}

#[test]
fn panicking_worker_is_reported_as_an_error() {
    let mut session = visible_session(instant_config(), Some(Arc::new(PanickingClient)));
    assert_eq!(session.submit("hi"), SubmitOutcome::Dispatched);
    assert!(session.pump_blocking(WAIT));
    assert!(!session.is_loading());
    assert!(session.context().last().unwrap().is_error);
}

#[test]
fn unconfigured_submit_records_an_error() {
    let mut session = visible_session(instant_config(), None);
    assert!(!session.is_configured());
    assert_eq!(session.submit("hi"), SubmitOutcome::Unconfigured);
    assert!(!session.is_loading());
    assert_eq!(session.context().len(), 2);
    let last = session.context().last().unwrap();
    assert!(last.is_error);
    assert!(last.text.starts_with("❌ Error:"));
}

#[test]
fn bare_quick_command_is_answered_locally() {
    let (client, _gate) = GatedClient::new();
    let mut session = visible_session(instant_config(), Some(client.clone()));
    assert_eq!(session.submit("/summarize"), SubmitOutcome::Answered);
    assert!(!session.is_loading());
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    assert!(session
        .response()
        .starts_with("Please provide content after the /summarize command."));
    assert_eq!(session.context().len(), 2);
}

#[test]
fn toggle_is_ignored_while_fading() {
    let clock = ManualClock::default();
    let mut session = OverlaySession::new(
        SessionConfig::default(),
        ConversationContext::new(50),
        Arc::new(clock.clone()),
    );

    assert_eq!(session.toggle(), Transition::Started);
    assert_eq!(session.visibility(), Visibility::Showing);
    assert!(session.is_animating());
    assert_eq!(session.toggle(), Transition::Ignored);

    clock.advance(Duration::from_millis(100));
    let opacity = session.advance();
    assert!((opacity - 0.4).abs() < 1e-3, "opacity {opacity}");
    assert_eq!(session.toggle(), Transition::Ignored);

    clock.advance(Duration::from_millis(200));
    assert_eq!(session.advance(), 1.0);
    assert_eq!(session.visibility(), Visibility::Visible);

    assert_eq!(session.toggle(), Transition::Started);
    assert_eq!(session.toggle(), Transition::Ignored);
    clock.advance(Duration::from_millis(250));
    assert_eq!(session.advance(), 0.0);
    assert_eq!(session.visibility(), Visibility::Hidden);

    assert_eq!(
        session.take_window_commands(),
        vec![WindowCommand::Show, WindowCommand::Focus, WindowCommand::Hide]
    );
    assert!(session.take_window_commands().is_empty());
}

#[test]
fn hide_clears_input_and_response() {
    let mut session = session_with(instant_config(), None);
    make_visible(&mut session);
    session.submit("hi");
    session.input_mut().push_str("draft");
    assert!(!session.response().is_empty());

    assert_eq!(session.hide(), Transition::Started);
    assert_eq!(session.input(), "");
    assert_eq!(session.response(), "");
}

#[test]
fn history_policy_controls_what_survives_a_hide() {
    for (policy, expected) in [(HistoryPolicy::Persist, 2), (HistoryPolicy::ClearOnHide, 0)] {
        let config = SessionConfig {
            history_policy: policy,
            ..instant_config()
        };
        let mut session = session_with(config, None);
        make_visible(&mut session);
        session.submit("hi");
        session.hide();
        session.advance();
        assert_eq!(session.context().len(), expected, "{policy:?}");
    }
}

#[test]
fn multi_turn_replays_prior_turns() {
    let client = Arc::new(RecordingClient::default());
    let config = SessionConfig {
        multi_turn: true,
        mode: Mode::Coder,
        ..instant_config()
    };
    let mut session = visible_session(config, Some(client.clone()));

    assert_eq!(session.submit("first"), SubmitOutcome::Dispatched);
    assert!(session.pump_blocking(WAIT));
    assert_eq!(session.submit("second"), SubmitOutcome::Dispatched);
    assert!(session.pump_blocking(WAIT));

    let prompts = client.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].starts_with(&format!("System: {}", Mode::Coder.instruction())));
    assert!(prompts[1].ends_with("User: first\nAssistant: answer 1\nUser: second"));
    assert_eq!(
        session.context().last().unwrap().mode_tag.as_deref(),
        Some("Coder")
    );
}

#[test]
fn single_turn_sends_only_the_current_query() {
    let client = Arc::new(RecordingClient::default());
    let mut session = visible_session(instant_config(), Some(client.clone()));
    session.submit("first");
    assert!(session.pump_blocking(WAIT));
    session.submit("second");
    assert!(session.pump_blocking(WAIT));

    let prompts = client.prompts.lock().unwrap().clone();
    assert!(prompts[1].ends_with("\n\nUser: second"));
    assert!(!prompts[1].contains("first"));
}

#[test]
fn pinned_context_reaches_the_prompt() {
    let client = Arc::new(RecordingClient::default());
    let mut session = visible_session(instant_config(), Some(client.clone()));
    assert!(session.pin("always answer in French"));
    session.submit("hello");
    assert!(session.pump_blocking(WAIT));
    assert!(client.prompts.lock().unwrap()[0].contains("- always answer in French\n"));

    session.clear_pins();
    assert!(session.pinned().is_empty());
}

#[test]
fn toggle_posted_from_another_thread_wakes_the_loop() {
    let mut session = session_with(instant_config(), None);
    let wakes = Arc::new(AtomicUsize::new(0));
    let counter = wakes.clone();
    assert!(session.set_waker(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    assert!(!session.set_waker(|| {}));

    let handle = session.handle();
    std::thread::spawn(move || handle.toggle()).join().unwrap();

    assert_eq!(wakes.load(Ordering::SeqCst), 1);
    session.tick();
    assert_eq!(session.visibility(), Visibility::Visible);
}

#[test]
fn transcript_is_saved_after_each_turn() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("history.json");
    let client = Arc::new(RecordingClient::default());
    let mut session = session_with(instant_config(), Some(client))
        .with_history_store(Box::new(JsonHistoryStore::new(&path)));
    make_visible(&mut session);

    session.submit("remember me");
    assert!(session.pump_blocking(WAIT));

    let stored = JsonHistoryStore::new(&path).load().unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].text, "remember me");
    assert_eq!(stored[1].text, "answer 1");

    session.clear_history();
    assert!(JsonHistoryStore::new(&path).load().unwrap().is_empty());
}

#[test]
fn input_is_refused_unless_fully_visible() {
    let (client, _gate) = GatedClient::new();
    let clock = ManualClock::default();
    let mut session = OverlaySession::new(
        SessionConfig::default(),
        ConversationContext::new(50),
        Arc::new(clock.clone()),
    )
    .with_client(Some(client.clone()));

    assert!(!session.input_enabled());
    session.input_mut().push_str("typed while hidden");
    assert_eq!(session.submit_input(), SubmitOutcome::NotVisible);

    session.show();
    assert_eq!(session.submit("too early"), SubmitOutcome::NotVisible);
    clock.advance(Duration::from_millis(250));
    session.advance();
    assert!(session.input_enabled());
    assert_eq!(session.input(), "");

    session.hide();
    assert!(!session.input_enabled());
    assert_eq!(session.submit("during fade out"), SubmitOutcome::NotVisible);
    clock.advance(Duration::from_millis(250));
    session.advance();
    assert_eq!(session.visibility(), Visibility::Hidden);
    assert_eq!(session.submit("after hide"), SubmitOutcome::NotVisible);

    assert!(session.context().is_empty());
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn working_key_is_verified_and_installed() {
    let client = Arc::new(RecordingClient::default());
    let mut session = session_with(instant_config(), None);
    assert!(session.check_key("good-key", client.clone()));
    assert!(session.pump_blocking(WAIT));

    assert_eq!(
        session.take_key_check(),
        Some(KeyCheck {
            key: "good-key".into(),
            verdict: KeyVerdict::Verified,
        })
    );
    assert!(session.take_key_check().is_none());
    assert!(session.is_configured());
    assert_eq!(client.prompts.lock().unwrap().as_slice(), [KEY_CHECK_PROMPT]);
    assert!(session.context().is_empty());
}

#[test]
fn rejected_key_keeps_the_previous_client() {
    let original = Arc::new(RecordingClient::default());
    let mut session = visible_session(instant_config(), Some(original.clone()));
    assert!(session.check_key("bad-key", Arc::new(RejectingClient)));
    assert!(session.pump_blocking(WAIT));

    let check = session.take_key_check().unwrap();
    assert_eq!(check.key, "bad-key");
    assert!(matches!(check.verdict, KeyVerdict::Rejected(OverlayError::InvalidCredential(_))));
    assert!(!check.verdict.accepted());

    assert_eq!(session.submit("still works?"), SubmitOutcome::Dispatched);
    assert!(session.pump_blocking(WAIT));
    assert_eq!(original.prompts.lock().unwrap().len(), 1);
}

#[test]
fn key_is_kept_when_only_the_network_failed() {
    let mut session = session_with(instant_config(), None);
    assert!(session.check_key("offline-key", Arc::new(FailingClient)));
    assert!(session.pump_blocking(WAIT));

    let check = session.take_key_check().unwrap();
    assert!(matches!(check.verdict, KeyVerdict::Unverified(OverlayError::Transport(_))));
    assert!(check.verdict.accepted());
    assert!(session.is_configured());
}

#[test]
fn one_key_check_at_a_time() {
    let (client, gate) = GatedClient::new();
    let mut session = session_with(instant_config(), None);
    assert!(session.check_key("first", client.clone()));
    assert!(session.is_checking_key());
    assert!(!session.check_key("second", Arc::new(RecordingClient::default())));

    gate.send(()).unwrap();
    assert!(session.pump_blocking(WAIT));
    assert!(!session.is_checking_key());
    assert_eq!(session.take_key_check().unwrap().key, "first");
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}
