//! Pending interrupt feedback
//!
//! Holds the option a user picked in response to an assistant interrupt until
//! the next send. Consuming does not clear: the caller clears after the send
//! succeeds, so a failed send can be retried with the same feedback.

use crate::types::{FeedbackSelection, InterruptOption};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FeedbackChannel {
    pending: Option<FeedbackSelection>,
}

impl FeedbackChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick an option, replacing any earlier pick.
    pub fn select(&mut self, option: InterruptOption) {
        tracing::debug!(value = %option.value, "Feedback selected");
        self.pending = Some(FeedbackSelection::new(option));
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// The selection to attach to the next send. Does not clear it.
    pub fn consume_for_next_send(&self) -> Option<FeedbackSelection> {
        self.pending.clone()
    }

    pub fn pending(&self) -> Option<&FeedbackSelection> {
        self.pending.as_ref()
    }
}
