//! Conversation state container
//!
//! [`Store`] is an explicit, clonable handle to the conversation state: the
//! message log, the research index, the `responding` flag and user-visible
//! notices. It is created by the application root and passed to whatever
//! needs it; there is no global instance.
//!
//! ## Reads and writes
//!
//! - Readers take a short lock through [`Store::read`] or one of the
//!   convenience getters. Nothing awaits while holding the lock.
//! - The stream ingestor and turn controller mutate through
//!   `Store::mutate`, which applies one change and then bumps the change
//!   counter.
//! - Observers call [`Store::subscribe`] and wait on the returned
//!   `watch::Receiver`; each value is a change token, not a payload.

mod feedback;
mod log;
mod research;

pub use feedback::FeedbackChannel;
pub use log::{FinishOutcome, MessageLog};
pub use research::{LinkOutcome, ResearchIndex};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::types::{Message, Notice};

/// Everything observers can see about a conversation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    /// Thread new messages are created in
    pub thread_id: String,
    /// Ordered messages
    pub log: MessageLog,
    /// Research correlation
    pub research: ResearchIndex,
    /// True while a turn is sending or streaming
    pub responding: bool,
    /// User-visible notices, oldest first
    pub notices: Vec<Notice>,
}

/// Shared handle to one conversation's state
#[derive(Debug, Clone)]
pub struct Store {
    inner: Arc<Mutex<StoreState>>,
    changes: Arc<watch::Sender<u64>>,
}

impl Store {
    /// Create an empty store for a thread.
    pub fn new(thread_id: impl Into<String>) -> Self {
        let state = StoreState {
            thread_id: thread_id.into(),
            ..Default::default()
        };
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(state)),
            changes: Arc::new(changes),
        }
    }

    /// Create an empty store with a freshly generated thread id.
    pub fn with_new_thread() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// Receive a change token after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Current change counter
    pub fn version(&self) -> u64 {
        *self.changes.borrow()
    }

    /// Run a read-only closure against the state.
    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.lock())
    }

    /// Clone the whole state.
    pub fn snapshot(&self) -> StoreState {
        self.read(|s| s.clone())
    }

    pub fn thread_id(&self) -> String {
        self.read(|s| s.thread_id.clone())
    }

    pub fn responding(&self) -> bool {
        self.read(|s| s.responding)
    }

    pub fn message(&self, id: &str) -> Option<Message> {
        self.read(|s| s.log.get(id).cloned())
    }

    pub fn message_ids(&self) -> Vec<String> {
        self.read(|s| s.log.ids().to_vec())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.read(|s| s.log.iter().cloned().collect())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.read(|s| s.notices.clone())
    }

    pub fn has_report(&self, research_id: &str) -> bool {
        self.read(|s| s.research.has_report(research_id))
    }

    pub fn report_message_id(&self, research_id: &str) -> Option<String> {
        self.read(|s| s.research.report_message_id(research_id).map(str::to_string))
    }

    pub fn open_research_id(&self) -> Option<String> {
        self.read(|s| s.research.open_research_id().map(str::to_string))
    }

    /// Text of a research's report, if one has been linked.
    pub fn report_text(&self, research_id: &str) -> Option<String> {
        self.read(|s| {
            let message_id = s.research.report_message_id(research_id)?;
            s.log.get(message_id).map(|m| m.content.clone())
        })
    }

    /// True while the report of a research is still streaming.
    pub fn report_streaming(&self, research_id: &str) -> bool {
        self.read(|s| {
            s.research
                .report_message_id(research_id)
                .and_then(|id| s.log.get(id))
                .map(|m| m.is_streaming)
                .unwrap_or(false)
        })
    }

    pub fn open_research(&self, research_id: &str) {
        self.mutate(|s| s.research.open(research_id));
    }

    pub fn close_research(&self) {
        self.mutate(|s| s.research.close());
    }

    /// Replace the log with a previously stored thread.
    ///
    /// Research mappings that point at messages not in the new log are dropped.
    pub fn bulk_load(&self, thread_id: impl Into<String>, messages: Vec<Message>) {
        let thread_id = thread_id.into();
        let count = messages.len();
        self.mutate(|s| {
            s.log.bulk_load(messages);
            let log = &s.log;
            s.research.retain_messages(|id| log.contains(id));
            s.thread_id = thread_id;
        });
        tracing::info!(count, "Bulk loaded thread history");
    }

    /// Apply one change and notify subscribers.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let result = {
            let mut state = self.lock();
            f(&mut state)
        };
        self.changes.send_modify(|v| *v = v.wrapping_add(1));
        result
    }

    pub(crate) fn push_notice(&self, notice: Notice) {
        self.mutate(|s| s.notices.push(notice));
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
