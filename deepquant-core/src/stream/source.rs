//! Event sources and the request that opens them

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::ChatSettings;
use crate::error::Result;
use crate::stream::events::ChatEvent;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Ordered events for one turn. Ends when the backend closes the stream.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ChatEvent>> + Send + 'static>>;

/// Anything that can produce the event feed for a turn: the live backend or
/// a recorded replay.
pub trait EventSource: Send + Sync {
    fn open<'a>(&'a self, request: &'a ChatRequest) -> BoxFuture<'a, Result<EventStream>>;
}

/// One entry of the `messages` array in a chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub role: String,
    pub content: String,
}

/// Body of `POST /chat/stream`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// New messages for this turn; empty for a kickoff without text
    pub messages: Vec<RequestMessage>,
    pub thread_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupt_feedback: Option<String>,
    pub max_plan_iterations: u32,
    pub max_step_num: u32,
    pub auto_accepted_plan: bool,
    pub enable_background_investigation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ChatRequest {
    pub fn new(text: &str, thread_id: impl Into<String>, settings: &ChatSettings) -> Self {
        let messages = if text.is_empty() {
            Vec::new()
        } else {
            vec![RequestMessage {
                role: "user".to_string(),
                content: text.to_string(),
            }]
        };
        Self {
            messages,
            thread_id: thread_id.into(),
            interrupt_feedback: None,
            max_plan_iterations: settings.max_plan_iterations,
            max_step_num: settings.max_step_num,
            auto_accepted_plan: settings.auto_accepted_plan,
            enable_background_investigation: settings.enable_background_investigation,
            user_id: None,
        }
    }

    pub fn with_interrupt_feedback(mut self, feedback: Option<String>) -> Self {
        self.interrupt_feedback = feedback;
        self
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Text of the user message, if any
    pub fn text(&self) -> Option<&str> {
        self.messages.first().map(|m| m.content.as_str())
    }
}

/// Cooperative cancellation signal shared between a turn and whoever may
/// cancel it. Cloning yields a handle to the same signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
