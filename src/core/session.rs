//! Session store with optimistic sends
//!
//! `send_message` is a provisional apply followed by confirm or compensate:
//!
//! 1. Reject blank input without touching state.
//! 2. Snapshot the transcript, publish it with the user's message appended
//!    and mark the session pending.
//! 3. Await the transport with the optimistic transcript.
//! 4. Publish `optimistic + reply` on success, or the snapshot plus an error
//!    message on failure. Both branches clear `pending`.
//!
//! At most one send is in flight per session. A call made while pending is
//! ignored, which keeps the snapshot in step 4 valid.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::watch;

use crate::agent::Agent;
use crate::conversation::{Message, Transcript};
use crate::providers::{CompletionTransport, ProviderError};

use super::failure::describe_failure;

/// Observable state of one conversation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub transcript: Transcript,
    pub pending: bool,
    pub last_error: Option<String>,
}

/// What happened to a `send_message` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Both the user message and the reply were committed
    Replied,
    /// The optimistic message was rolled back; carries the recorded error
    Failed(String),
    /// Nothing was sent
    Ignored(IgnoreReason),
    /// The session was reset while the request was in flight
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyInput,
    Busy,
}

/// Provisional state captured when a send is accepted
struct PendingTurn {
    generation: u64,
    before: Transcript,
    optimistic: Transcript,
}

pub struct SessionStore<T> {
    system_prompt: String,
    transport: T,
    state: watch::Sender<SessionState>,
    /// Bumped on every reset so late replies from an older session are dropped
    generation: AtomicU64,
}

impl<T: CompletionTransport> SessionStore<T> {
    pub fn new(system_prompt: impl Into<String>, transport: T) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            system_prompt: system_prompt.into(),
            transport,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn for_agent(agent: &Agent, transport: T) -> Self {
        Self::new(agent.system_prompt.clone(), transport)
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Current state
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every published state change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Send a user message and reconcile the reply into the transcript.
    ///
    /// Transport failures never escape as errors: they roll the transcript
    /// back and land in `last_error`.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let content = text.trim();
        if content.is_empty() {
            tracing::debug!("ignoring blank message");
            return SendOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        let Some(turn) = self.begin_turn(content) else {
            tracing::debug!("send already in flight, ignoring message");
            return SendOutcome::Ignored(IgnoreReason::Busy);
        };

        tracing::info!(turns = turn.optimistic.len(), "sending chat turn");

        let result = self
            .transport
            .send_chat_turn(&self.system_prompt, &turn.optimistic)
            .await;

        self.settle(turn, result)
    }

    fn begin_turn(&self, content: &str) -> Option<PendingTurn> {
        let mut turn = None;

        self.state.send_if_modified(|state| {
            if state.pending {
                return false;
            }

            let before = state.transcript.clone();
            let mut optimistic = before.clone();
            optimistic.push(Message::user(content));

            state.transcript = optimistic.clone();
            state.pending = true;
            state.last_error = None;

            turn = Some(PendingTurn {
                generation: self.generation.load(Ordering::SeqCst),
                before,
                optimistic,
            });
            true
        });

        turn
    }

    fn settle(&self, turn: PendingTurn, result: Result<Message, ProviderError>) -> SendOutcome {
        let mut outcome = SendOutcome::Discarded;

        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != turn.generation {
                return false;
            }

            match result {
                Ok(reply) => {
                    let mut transcript = turn.optimistic;
                    transcript.push(reply);
                    state.transcript = transcript;
                    outcome = SendOutcome::Replied;
                }
                Err(err) => {
                    let message = describe_failure(&err);
                    tracing::warn!(error = %message, "chat turn failed, rolling back");
                    state.transcript = turn.before;
                    state.last_error = Some(message.clone());
                    outcome = SendOutcome::Failed(message);
                }
            }
            state.pending = false;
            true
        });

        if outcome == SendOutcome::Discarded {
            tracing::debug!("session was reset during the request, dropping reply");
        }
        outcome
    }

    pub fn clear_error(&self) {
        self.state
            .send_if_modified(|state| state.last_error.take().is_some());
    }

    /// Start over with an empty transcript under the same system prompt
    pub fn reset_session(&self) {
        self.state.send_modify(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = SessionState::default();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::oneshot;
    use tokio_test::{assert_pending, assert_ready, task};

    const PROMPT: &str = "You are a helpful math tutor.";

    type Reply = Result<Message, ProviderError>;

    /// Answers from a fixed script and records every call
    #[derive(Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Reply>>,
        calls: Mutex<Vec<(String, Vec<Message>)>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::default(),
            }
        }

        fn calls(&self) -> Vec<(String, Vec<Message>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionTransport for ScriptedTransport {
        async fn send_chat_turn(
            &self,
            system_prompt: &str,
            transcript: &[Message],
        ) -> Result<Message, ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), transcript.to_vec()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected transport call")
        }
    }

    /// Suspends until the test releases a reply through the gate
    struct GatedTransport {
        gate: Mutex<Option<oneshot::Receiver<Reply>>>,
    }

    impl GatedTransport {
        fn new() -> (Self, oneshot::Sender<Reply>) {
            let (tx, rx) = oneshot::channel();
            (
                Self {
                    gate: Mutex::new(Some(rx)),
                },
                tx,
            )
        }
    }

    #[async_trait]
    impl CompletionTransport for GatedTransport {
        async fn send_chat_turn(
            &self,
            _system_prompt: &str,
            _transcript: &[Message],
        ) -> Result<Message, ProviderError> {
            let rx = self.gate.lock().unwrap().take().expect("gate already used");
            rx.await
                .unwrap_or_else(|_| Err(ProviderError::Transport("gate dropped".into())))
        }
    }

    fn timeout() -> Reply {
        Err(ProviderError::Transport("timeout".into()))
    }

    #[tokio::test]
    async fn test_successful_turn() {
        let transport = ScriptedTransport::new(vec![Ok(Message::assistant("Hi there"))]);
        let store = SessionStore::new(PROMPT, transport);

        let outcome = store.send_message("Hello").await;

        assert_eq!(outcome, SendOutcome::Replied);
        assert_eq!(
            store.snapshot(),
            SessionState {
                transcript: vec![Message::user("Hello"), Message::assistant("Hi there")],
                pending: false,
                last_error: None,
            }
        );
        assert_eq!(
            store.transport.calls(),
            vec![(PROMPT.to_string(), vec![Message::user("Hello")])]
        );
    }

    #[tokio::test]
    async fn test_failed_turn_from_empty() {
        let store = SessionStore::new(PROMPT, ScriptedTransport::new(vec![timeout()]));

        let outcome = store.send_message("Hello").await;

        assert_eq!(outcome, SendOutcome::Failed("timeout".into()));
        let state = store.snapshot();
        assert!(state.transcript.is_empty());
        assert!(!state.pending);
        assert_eq!(state.last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_failure_restores_prior_transcript() {
        let transport = ScriptedTransport::new(vec![
            Ok(Message::assistant("4")),
            timeout(),
        ]);
        let store = SessionStore::new(PROMPT, transport);

        store.send_message("What is 2+2?").await;
        let before = store.snapshot().transcript;

        let outcome = store.send_message("And 3+3?").await;

        assert!(matches!(outcome, SendOutcome::Failed(_)));
        assert_eq!(store.snapshot().transcript, before);
        assert!(!store.snapshot().pending);
    }

    #[tokio::test]
    async fn test_full_transcript_sent_each_turn() {
        let transport = ScriptedTransport::new(vec![
            Ok(Message::assistant("4")),
            Ok(Message::assistant("6")),
        ]);
        let store = SessionStore::new(PROMPT, transport);

        store.send_message("What is 2+2?").await;
        store.send_message("And 3+3?").await;

        let calls = store.transport.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1].1,
            vec![
                Message::user("What is 2+2?"),
                Message::assistant("4"),
                Message::user("And 3+3?"),
            ]
        );
        assert_eq!(store.snapshot().transcript.len(), 4);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let store = SessionStore::new(PROMPT, ScriptedTransport::default());
        let mut rx = store.subscribe();

        for text in ["", "   ", "\n\t"] {
            assert_eq!(
                store.send_message(text).await,
                SendOutcome::Ignored(IgnoreReason::EmptyInput)
            );
        }

        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.snapshot(), SessionState::default());
        assert!(store.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_input_is_trimmed() {
        let transport = ScriptedTransport::new(vec![Ok(Message::assistant("Hi"))]);
        let store = SessionStore::new(PROMPT, transport);

        store.send_message("  Hello \n").await;

        assert_eq!(store.snapshot().transcript[0], Message::user("Hello"));
    }

    #[test]
    fn test_user_message_appears_before_reply() {
        let (transport, gate) = GatedTransport::new();
        let store = SessionStore::new(PROMPT, transport);
        let mut rx = store.subscribe();

        let mut send = task::spawn(store.send_message("Hello"));
        assert_pending!(send.poll());

        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert!(state.pending);
        assert_eq!(state.transcript, vec![Message::user("Hello")]);

        gate.send(Ok(Message::assistant("Hi there"))).unwrap();
        assert!(send.is_woken());
        assert_eq!(assert_ready!(send.poll()), SendOutcome::Replied);

        let state = rx.borrow_and_update().clone();
        assert!(!state.pending);
        assert_eq!(
            state.transcript,
            vec![Message::user("Hello"), Message::assistant("Hi there")]
        );
    }

    #[test]
    fn test_send_while_pending_is_noop() {
        let (transport, gate) = GatedTransport::new();
        let store = SessionStore::new(PROMPT, transport);

        let mut first = task::spawn(store.send_message("Hello"));
        assert_pending!(first.poll());
        let during = store.snapshot();

        let mut second = task::spawn(store.send_message("Are you there?"));
        assert_eq!(
            assert_ready!(second.poll()),
            SendOutcome::Ignored(IgnoreReason::Busy)
        );
        assert_eq!(store.snapshot(), during);

        gate.send(timeout()).unwrap();
        assert_eq!(
            assert_ready!(first.poll()),
            SendOutcome::Failed("timeout".into())
        );
        assert!(store.snapshot().transcript.is_empty());
    }

    #[test]
    fn test_reset_during_send_drops_late_reply() {
        let (transport, gate) = GatedTransport::new();
        let store = SessionStore::new(PROMPT, transport);

        let mut send = task::spawn(store.send_message("Hello"));
        assert_pending!(send.poll());

        store.reset_session();
        assert_eq!(store.snapshot(), SessionState::default());

        gate.send(Ok(Message::assistant("Hi there"))).unwrap();
        assert_eq!(assert_ready!(send.poll()), SendOutcome::Discarded);
        assert_eq!(store.snapshot(), SessionState::default());
    }

    #[tokio::test]
    async fn test_next_send_clears_error() {
        let transport = ScriptedTransport::new(vec![timeout(), Ok(Message::assistant("Hi"))]);
        let store = SessionStore::new(PROMPT, transport);

        store.send_message("Hello").await;
        assert!(store.snapshot().last_error.is_some());

        store.send_message("Hello").await;
        let state = store.snapshot();
        assert_eq!(state.last_error, None);
        assert_eq!(state.transcript.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_error() {
        let transport = ScriptedTransport::new(vec![Ok(Message::assistant("4")), timeout()]);
        let store = SessionStore::new(PROMPT, transport);
        store.send_message("What is 2+2?").await;
        store.send_message("And 3+3?").await;

        let before = store.snapshot();
        store.clear_error();
        let after = store.snapshot();

        assert_eq!(after.last_error, None);
        assert_eq!(after.transcript, before.transcript);
        assert_eq!(after.pending, before.pending);

        let mut rx = store.subscribe();
        store.clear_error();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_reset_session() {
        let transport = ScriptedTransport::new(vec![Ok(Message::assistant("4")), timeout()]);
        let store = SessionStore::new(PROMPT, transport);
        store.send_message("What is 2+2?").await;
        store.send_message("And 3+3?").await;

        store.reset_session();

        assert_eq!(store.snapshot(), SessionState::default());
        assert_eq!(store.system_prompt(), PROMPT);
    }

    #[test]
    fn test_for_agent_uses_system_prompt() {
        let agent = Agent::create("Tutor", PROMPT).unwrap();
        let store = SessionStore::for_agent(&agent, ScriptedTransport::default());
        assert_eq!(store.system_prompt(), PROMPT);
    }
}
