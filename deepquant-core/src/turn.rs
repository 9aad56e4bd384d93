//! Turn controller
//!
//! Owns the single in-flight send/stream cycle for a conversation.
//!
//! ```text
//! Idle ──send──▶ Sending ──first event──▶ Streaming ──┬─▶ (Finished)  ──┐
//!  │                │                                 ├─▶ (Cancelled) ──┼─▶ Idle
//!  │                └──────── open failed / cancel ───┴─▶ (Failed)    ──┘
//!  └──begin_load──▶ Loading ──guard dropped──▶ Idle
//! ```
//!
//! The terminal states in parentheses are never held by the slot: the
//! controller drops straight back to `Idle` and records the terminal state
//! as [`TurnController::last_outcome`].
//!
//! A send while another turn is alive, or while a stored thread is loading,
//! fails with [`Error::TurnInProgress`] and leaves the log untouched. Whatever
//! ends a turn, every message it left streaming is finished (`stop`,
//! `cancelled` or `error`).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;

use crate::config::ChatSettings;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::stream::{CancelToken, ChatRequest, EventSource, StreamIngestor};
use crate::types::{FinishReason, Message, Notice};

/// Lifecycle of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    /// A stored thread is replacing the log
    Loading,
    Sending,
    Streaming,
    Finished,
    Cancelled,
    Failed,
}

impl TurnState {
    /// True while the turn holds the slot
    pub fn is_active(&self) -> bool {
        matches!(self, TurnState::Sending | TurnState::Streaming)
    }
}

/// Optional parts of a send
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Feedback value for the interrupt this turn answers
    pub interrupt_feedback: Option<String>,
    /// Thread to send to, if not the store's current thread
    pub chat_id: Option<String>,
    /// Externally owned cancellation signal
    pub cancel: Option<CancelToken>,
}

/// What a completed turn did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSummary {
    /// Terminal state the turn reached
    pub outcome: TurnState,
    /// Id of the user message appended for this turn, if any
    pub user_message_id: Option<String>,
    /// Events received from the source
    pub events: usize,
    /// Messages the turn created or updated, in first-seen order
    pub message_ids: Vec<String>,
}

/// The in-flight turn
#[derive(Debug)]
struct Turn {
    text: String,
    thread_id: String,
    interrupt_feedback: Option<String>,
    cancel: CancelToken,
}

#[derive(Debug, Default)]
struct TurnSlot {
    state: TurnState,
    turn: Option<Turn>,
    last_outcome: Option<TurnState>,
}

/// Serializes turns for one conversation
#[derive(Clone)]
pub struct TurnController {
    store: Store,
    source: Arc<dyn EventSource>,
    settings: ChatSettings,
    user_id: Option<String>,
    slot: Arc<Mutex<TurnSlot>>,
}

impl std::fmt::Debug for TurnController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnController")
            .field("state", &self.state())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl TurnController {
    pub fn new(store: Store, source: Arc<dyn EventSource>, settings: ChatSettings) -> Self {
        Self {
            store,
            source,
            settings,
            user_id: None,
            slot: Arc::new(Mutex::new(TurnSlot::default())),
        }
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn state(&self) -> TurnState {
        self.lock().state
    }

    /// How the most recent turn ended
    pub fn last_outcome(&self) -> Option<TurnState> {
        self.lock().last_outcome
    }

    /// True iff a turn is sending or streaming
    pub fn responding(&self) -> bool {
        self.state().is_active()
    }

    /// Text of the in-flight turn
    pub fn current_text(&self) -> Option<String> {
        self.lock().turn.as_ref().map(|t| t.text.clone())
    }

    /// Send `text` and stream the response to completion.
    ///
    /// Empty text sends nothing to the log but still opens the stream.
    pub async fn send(&self, text: &str, options: SendOptions) -> Result<TurnSummary> {
        let text = text.trim();
        let cancel = options.cancel.clone().unwrap_or_default();
        let thread_id = options
            .chat_id
            .clone()
            .unwrap_or_else(|| self.store.thread_id());

        {
            let mut slot = self.lock();
            if slot.state != TurnState::Idle {
                tracing::warn!(state = ?slot.state, "Rejecting send while a turn is in progress");
                return Err(Error::TurnInProgress);
            }
            slot.state = TurnState::Sending;
            slot.turn = Some(Turn {
                text: text.to_string(),
                thread_id: thread_id.clone(),
                interrupt_feedback: options.interrupt_feedback.clone(),
                cancel: cancel.clone(),
            });
        }

        let user_message_id = (!text.is_empty()).then(|| uuid::Uuid::new_v4().to_string());
        self.store.mutate(|state| {
            state.responding = true;
            if let Some(id) = &user_message_id {
                let message = Message::user(
                    id.clone(),
                    thread_id.clone(),
                    text,
                    options.interrupt_feedback.clone(),
                );
                // Freshly generated id
                let _ = state.log.append(message);
            }
        });
        tracing::info!(
            thread_id = %thread_id,
            feedback = ?options.interrupt_feedback,
            "Turn started"
        );

        let request = ChatRequest::new(text, thread_id, &self.settings)
            .with_interrupt_feedback(options.interrupt_feedback)
            .with_user_id(self.user_id.clone());

        let mut active = ActiveTurn {
            controller: self,
            ingestor: StreamIngestor::new(self.store.clone()),
            done: false,
        };
        let (outcome, events) = active.run(&request, &cancel).await;
        let message_ids = active.ingestor.touched().to_vec();

        match outcome {
            Ok(()) => {
                active.complete(TurnState::Finished, FinishReason::Stop);
                tracing::info!(events, "Turn finished");
                Ok(TurnSummary {
                    outcome: TurnState::Finished,
                    user_message_id,
                    events,
                    message_ids,
                })
            }
            Err(Error::Cancelled) => {
                active.complete(TurnState::Cancelled, FinishReason::Cancelled);
                tracing::info!(events, "Turn cancelled");
                Err(Error::Cancelled)
            }
            Err(e) => {
                active.complete(TurnState::Failed, FinishReason::Error);
                tracing::error!(error = %e, events, "Turn failed");
                self.store.push_notice(Notice::error(e.to_string()));
                Err(match e {
                    Error::StreamTransport(_) => e,
                    other => Error::StreamTransport(other.to_string()),
                })
            }
        }
    }

    /// Hold the slot while a stored thread replaces the log. Sends fail with
    /// [`Error::TurnInProgress`] until the guard is dropped.
    pub fn begin_load(&self) -> Result<LoadGuard> {
        let mut slot = self.lock();
        if slot.state != TurnState::Idle {
            return Err(Error::TurnInProgress);
        }
        slot.state = TurnState::Loading;
        tracing::debug!("Turn slot reserved for thread load");
        Ok(LoadGuard {
            controller: self.clone(),
        })
    }

    /// Cancel the in-flight turn.
    pub fn cancel(&self) -> Result<()> {
        let slot = self.lock();
        match (&slot.state, &slot.turn) {
            (TurnState::Sending | TurnState::Streaming, Some(turn)) => {
                tracing::info!(
                    thread_id = %turn.thread_id,
                    feedback = ?turn.interrupt_feedback,
                    "Cancelling turn"
                );
                turn.cancel.cancel();
                Ok(())
            }
            (state, _) => Err(Error::InvalidTransition(format!(
                "cannot cancel in state {:?}",
                state
            ))),
        }
    }

    fn set_state(&self, state: TurnState) {
        self.lock().state = state;
    }

    /// Return to `Idle`, recording how the turn ended.
    fn release(&self, outcome: TurnState) {
        {
            let mut slot = self.lock();
            slot.state = TurnState::Idle;
            slot.last_outcome = Some(outcome);
            slot.turn = None;
        }
        self.store.mutate(|state| state.responding = false);
    }

    fn lock(&self) -> MutexGuard<'_, TurnSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps the slot in `Loading` until dropped
#[derive(Debug)]
pub struct LoadGuard {
    controller: TurnController,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        let mut slot = self.controller.lock();
        if slot.state == TurnState::Loading {
            slot.state = TurnState::Idle;
        }
    }
}

/// Turn that has taken the slot. Dropping it early (the send future was
/// dropped) finalizes as cancelled.
struct ActiveTurn<'a> {
    controller: &'a TurnController,
    ingestor: StreamIngestor,
    done: bool,
}

impl ActiveTurn<'_> {
    /// Drive the stream until it ends. Returns the outcome and the number of
    /// events received.
    async fn run(&mut self, request: &ChatRequest, cancel: &CancelToken) -> (Result<()>, usize) {
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return (Err(Error::Cancelled), 0),
            opened = self.controller.source.open(request) => match opened {
                Ok(stream) => stream,
                Err(e) => return (Err(e), 0),
            },
        };

        let mut events = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return (Err(Error::Cancelled), events),
                next = stream.next() => next,
            };
            match next {
                None => return (Ok(()), events),
                Some(Err(e)) => return (Err(e), events),
                Some(Ok(event)) => {
                    if cancel.is_cancelled() {
                        return (Err(Error::Cancelled), events);
                    }
                    if events == 0 {
                        self.controller.set_state(TurnState::Streaming);
                    }
                    events += 1;
                    self.ingestor.ingest(&event);
                }
            }
        }
    }

    fn complete(&mut self, outcome: TurnState, reason: FinishReason) {
        self.ingestor.finalize(reason);
        self.controller.release(outcome);
        self.done = true;
    }
}

impl Drop for ActiveTurn<'_> {
    fn drop(&mut self) {
        if !self.done {
            tracing::warn!("Turn dropped before completion");
            self.complete(TurnState::Cancelled, FinishReason::Cancelled);
        }
    }
}
