use crate::client::{GenerationClient, KEY_CHECK_PROMPT};
use crate::error::OverlayError;
use crate::fade::{Clock, FadeAnimator, DEFAULT_FADE_DURATION, DEFAULT_FADE_TICK};
use crate::history::{ConversationContext, ConversationEntry, HistoryStore};
use crate::modes::Mode;
use crate::prompt::{compose, ComposedPrompt, PinnedContext};
use crate::visibility::{Visibility, WindowCommand};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

pub const THINKING_TEXT: &str = "🤔 Thinking...";

/// What happens to the transcript when the overlay is hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    /// Keep the transcript across hides and restarts.
    #[default]
    Persist,
    /// Start every showing with an empty transcript.
    ClearOnHide,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mode: Mode,
    pub multi_turn: bool,
    pub history_policy: HistoryPolicy,
    pub fade_duration: Duration,
    pub fade_tick: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Normal,
            multi_turn: false,
            history_policy: HistoryPolicy::Persist,
            fade_duration: DEFAULT_FADE_DURATION,
            fade_tick: DEFAULT_FADE_TICK,
        }
    }
}

/// Messages delivered to the control thread.
#[derive(Debug)]
pub enum SessionEvent {
    Toggle,
    Completed {
        request: u64,
        outcome: Result<String, OverlayError>,
    },
    KeyChecked {
        request: u64,
        outcome: Result<String, OverlayError>,
    },
}

type Outcome = Result<String, OverlayError>;

type Waker = Arc<OnceCell<Box<dyn Fn() + Send + Sync>>>;

/// Cloneable sender used by the hotkey listener and request workers. Posting
/// never touches session state directly.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Sender<SessionEvent>,
    waker: Waker,
}

impl SessionHandle {
    /// Queue `event` for the control thread and wake it. Returns `false` once
    /// the session is gone.
    pub fn post(&self, event: SessionEvent) -> bool {
        let sent = self.tx.send(event).is_ok();
        if let Some(wake) = self.waker.get() {
            wake();
        }
        sent
    }

    pub fn toggle(&self) -> bool {
        self.post(SessionEvent::Toggle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    /// Not applicable in the current state (already there, or a fade is
    /// running).
    Ignored,
    /// `hide` while a request is outstanding. Retry once loading clears.
    RefusedWhileLoading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A request is now in flight.
    Dispatched,
    /// Another request is still outstanding; nothing happened.
    Busy,
    /// Input was blank.
    Empty,
    /// Answered locally (quick command usage hint).
    Answered,
    /// No client configured; an error entry was appended instead.
    Unconfigured,
    /// The overlay is not fully shown; input is not accepted.
    NotVisible,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyVerdict {
    /// The test request went through and the key is now in use.
    Verified,
    /// The service rejected the key. The previous client is kept.
    Rejected(OverlayError),
    /// The check failed for another reason, usually the network. The key is
    /// used anyway.
    Unverified(OverlayError),
}

impl KeyVerdict {
    /// Whether the key should be stored.
    pub fn accepted(&self) -> bool {
        !matches!(self, KeyVerdict::Rejected(_))
    }
}

/// Outcome of [`OverlaySession::check_key`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCheck {
    pub key: String,
    pub verdict: KeyVerdict,
}

/// The overlay state machine.
///
/// Owned by the control thread. Other threads reach it only through a
/// [`SessionHandle`]; their events are applied in [`OverlaySession::pump`].
pub struct OverlaySession {
    config: SessionConfig,
    visibility: Visibility,
    loading: bool,
    input: String,
    input_enabled: bool,
    response: String,
    context: ConversationContext,
    pinned: PinnedContext,
    client: Option<Arc<dyn GenerationClient>>,
    store: Option<Box<dyn HistoryStore>>,
    animator: FadeAnimator,
    tx: Sender<SessionEvent>,
    rx: Receiver<SessionEvent>,
    waker: Waker,
    commands: Vec<WindowCommand>,
    next_request: u64,
    in_flight: Option<(u64, Mode)>,
    key_check: Option<(u64, String, Arc<dyn GenerationClient>)>,
    key_result: Option<KeyCheck>,
}

impl OverlaySession {
    pub fn new(config: SessionConfig, context: ConversationContext, clock: Arc<dyn Clock>) -> Self {
        let (tx, rx) = channel();
        let animator = FadeAnimator::new(clock, config.fade_tick);
        Self {
            config,
            visibility: Visibility::Hidden,
            loading: false,
            input: String::new(),
            input_enabled: false,
            response: String::new(),
            context,
            pinned: PinnedContext::new(),
            client: None,
            store: None,
            animator,
            tx,
            rx,
            waker: Arc::new(OnceCell::new()),
            commands: Vec::new(),
            next_request: 1,
            in_flight: None,
            key_check: None,
            key_result: None,
        }
    }

    pub fn with_client(mut self, client: Option<Arc<dyn GenerationClient>>) -> Self {
        self.client = client;
        self
    }

    pub fn with_history_store(mut self, store: Box<dyn HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.tx.clone(),
            waker: self.waker.clone(),
        }
    }

    /// Install the callback that wakes the control thread after an event is
    /// posted. Only the first call has an effect.
    pub fn set_waker(&self, wake: impl Fn() + Send + Sync + 'static) -> bool {
        self.waker.set(Box::new(wake)).is_ok()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    /// Text of the response panel. Cleared on hide.
    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn pinned(&self) -> &PinnedContext {
        &self.pinned
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if self.config.mode != mode {
            tracing::info!("mode changed to {mode:?}");
            self.config.mode = mode;
        }
    }

    pub fn multi_turn(&self) -> bool {
        self.config.multi_turn
    }

    pub fn set_multi_turn(&mut self, enabled: bool) {
        self.config.multi_turn = enabled;
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Replace the generation client. A request already in flight keeps
    /// using the client it started with.
    pub fn set_client(&mut self, client: Option<Arc<dyn GenerationClient>>) {
        self.client = client;
    }

    pub fn opacity(&self) -> f32 {
        self.animator.opacity()
    }

    pub fn is_animating(&self) -> bool {
        self.animator.is_animating()
    }

    pub fn fade_tick(&self) -> Duration {
        self.animator.tick_interval()
    }

    pub fn take_window_commands(&mut self) -> Vec<WindowCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn pin(&mut self, text: &str) -> bool {
        self.pinned.pin(text)
    }

    pub fn unpin(&mut self, index: usize) -> Option<String> {
        self.pinned.remove(index)
    }

    pub fn clear_pins(&mut self) {
        self.pinned.clear();
    }

    pub fn last_response(&self) -> Option<&str> {
        self.context.last_response()
    }

    pub fn clear_history(&mut self) {
        self.context.clear();
        self.response.clear();
        self.persist();
        tracing::info!("chat history cleared");
    }

    pub fn toggle(&mut self) -> Transition {
        match self.visibility.toggle_target() {
            Some(Visibility::Showing) => self.show(),
            Some(Visibility::Hiding) => self.hide(),
            _ => {
                tracing::debug!(state = ?self.visibility, "toggle ignored during fade");
                Transition::Ignored
            }
        }
    }

    pub fn show(&mut self) -> Transition {
        if self.visibility != Visibility::Hidden {
            return Transition::Ignored;
        }
        tracing::debug!("showing overlay");
        self.visibility = Visibility::Showing;
        self.commands.push(WindowCommand::Show);
        self.animator.animate_to(1.0, self.config.fade_duration);
        Transition::Started
    }

    /// Start fading out. Refused while a request is in flight so the
    /// response never lands on a torn-down view.
    pub fn hide(&mut self) -> Transition {
        if self.visibility != Visibility::Visible {
            return Transition::Ignored;
        }
        if self.loading {
            tracing::info!("hide refused while a request is in flight");
            return Transition::RefusedWhileLoading;
        }
        tracing::debug!("hiding overlay");
        self.visibility = Visibility::Hiding;
        self.input_enabled = false;
        self.input.clear();
        self.response.clear();
        if self.config.history_policy == HistoryPolicy::ClearOnHide {
            self.context.clear();
            self.persist();
        }
        self.animator.animate_to(0.0, self.config.fade_duration);
        Transition::Started
    }

    /// Submit whatever is in the input buffer.
    pub fn submit_input(&mut self) -> SubmitOutcome {
        let raw = self.input.clone();
        self.submit(&raw)
    }

    pub fn submit(&mut self, raw: &str) -> SubmitOutcome {
        if self.visibility != Visibility::Visible {
            tracing::debug!(state = ?self.visibility, "submit ignored while not visible");
            return SubmitOutcome::NotVisible;
        }
        if self.loading {
            tracing::debug!("submit ignored while loading");
            return SubmitOutcome::Busy;
        }
        let query = raw.trim();
        if query.is_empty() {
            return SubmitOutcome::Empty;
        }

        let history = self.config.multi_turn.then_some(&self.context);
        let composed = compose(query, self.config.mode, self.pinned.items(), history);
        tracing::trace!(chars = composed.text().len(), "prompt composed");
        self.input.clear();

        match composed {
            ComposedPrompt::UsageHint(hint) => {
                self.context.append(ConversationEntry::user(query));
                self.response = hint.clone();
                self.context.append(ConversationEntry::assistant(hint, None));
                self.persist();
                SubmitOutcome::Answered
            }
            ComposedPrompt::Forward(prompt) => {
                let Some(client) = self.client.clone() else {
                    let err = OverlayError::Config("no API key configured".into());
                    tracing::warn!("{err}");
                    self.context.append(ConversationEntry::user(query));
                    let entry = ConversationEntry::error(&err);
                    self.response = entry.text.clone();
                    self.context.append(entry);
                    self.persist();
                    return SubmitOutcome::Unconfigured;
                };
                self.context.append(ConversationEntry::user(query));
                self.loading = true;
                self.input_enabled = false;
                self.response = THINKING_TEXT.into();
                let request = self.next_request;
                self.next_request += 1;
                self.in_flight = Some((request, self.config.mode));
                tracing::debug!(request, "dispatching generation request");
                self.spawn_worker(client, prompt, request, |request, outcome| {
                    SessionEvent::Completed { request, outcome }
                });
                SubmitOutcome::Dispatched
            }
        }
    }

    /// Send a short test request with a client built from a newly entered
    /// key. The verdict is available from [`OverlaySession::take_key_check`]
    /// once the worker reports back; unless the key was rejected the client
    /// replaces the current one. Returns `false` while a check is running.
    pub fn check_key(&mut self, key: impl Into<String>, client: Arc<dyn GenerationClient>) -> bool {
        if self.key_check.is_some() {
            return false;
        }
        let request = self.next_request;
        self.next_request += 1;
        self.key_check = Some((request, key.into(), client.clone()));
        tracing::debug!(request, "checking API key");
        self.spawn_worker(client, KEY_CHECK_PROMPT.to_string(), request, |request, outcome| {
            SessionEvent::KeyChecked { request, outcome }
        });
        true
    }

    pub fn is_checking_key(&self) -> bool {
        self.key_check.is_some()
    }

    pub fn take_key_check(&mut self) -> Option<KeyCheck> {
        self.key_result.take()
    }

    fn spawn_worker(
        &mut self,
        client: Arc<dyn GenerationClient>,
        prompt: String,
        request: u64,
        wrap: fn(u64, Outcome) -> SessionEvent,
    ) {
        let handle = self.handle();
        let spawned = std::thread::Builder::new()
            .name(format!("generation-{request}"))
            .spawn(move || {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| client.generate(&prompt)))
                    .unwrap_or_else(|_| {
                        Err(OverlayError::Transport("generation worker panicked".into()))
                    });
                handle.post(wrap(request, outcome));
            });
        if let Err(e) = spawned {
            tracing::error!("failed to start generation worker: {e}");
            let outcome = Err(OverlayError::Transport(format!("failed to start worker: {e}")));
            self.handle_event(wrap(request, outcome));
        }
    }

    fn finish_key_check(&mut self, request: u64, outcome: Outcome) {
        let (key, client) = match self.key_check.take() {
            Some((id, key, client)) if id == request => (key, client),
            other => {
                self.key_check = other;
                tracing::warn!(request, "dropping stale key check");
                return;
            }
        };
        let verdict = match outcome {
            Ok(_) => KeyVerdict::Verified,
            Err(e @ OverlayError::InvalidCredential(_)) => KeyVerdict::Rejected(e),
            Err(e) => KeyVerdict::Unverified(e),
        };
        tracing::info!(?verdict, "API key check finished");
        if verdict.accepted() {
            self.client = Some(client);
        }
        self.key_result = Some(KeyCheck { key, verdict });
    }

    fn complete(&mut self, request: u64, outcome: Outcome) {
        let mode = match self.in_flight {
            Some((id, mode)) if id == request => mode,
            _ => {
                tracing::warn!(request, "dropping stale completion");
                return;
            }
        };
        self.in_flight = None;

        let entry = match outcome {
            Ok(text) => ConversationEntry::assistant(text, Some(format!("{mode:?}"))),
            Err(e) => {
                tracing::warn!(request, "generation failed: {e}");
                ConversationEntry::error(&e)
            }
        };
        self.response = entry.text.clone();
        self.context.append(entry);
        self.loading = false;
        self.input_enabled = true;
        self.persist();
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = self.context.persist(store.as_ref()) {
                tracing::error!("failed to save history: {e}");
            }
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Toggle => {
                self.toggle();
            }
            SessionEvent::Completed { request, outcome } => self.complete(request, outcome),
            SessionEvent::KeyChecked { request, outcome } => {
                self.finish_key_check(request, outcome)
            }
        }
    }

    /// Apply every queued event. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for an event, then drain the queue. Returns
    /// whether anything arrived.
    pub fn pump_blocking(&mut self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event);
                self.pump();
                true
            }
            Err(_) => false,
        }
    }

    /// Step the fade and settle the visibility state when it completes.
    pub fn advance(&mut self) -> f32 {
        let frame = self.animator.tick();
        let reached = match (self.visibility, frame.finished) {
            (Visibility::Showing, Some(target)) => target >= 1.0,
            (Visibility::Hiding, Some(target)) => target <= 0.0,
            _ => false,
        };
        if reached {
            self.visibility = self.visibility.settle();
            match self.visibility {
                Visibility::Visible => {
                    self.input.clear();
                    self.input_enabled = !self.loading;
                    self.commands.push(WindowCommand::Focus);
                }
                _ => self.commands.push(WindowCommand::Hide),
            }
            tracing::debug!(state = ?self.visibility, "fade settled");
        }
        frame.opacity
    }

    /// One control-loop iteration: apply queued events, then animate.
    pub fn tick(&mut self) -> f32 {
        self.pump();
        self.advance()
    }
}
