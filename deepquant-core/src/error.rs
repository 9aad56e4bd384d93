//! Error types for deepquant-core

use thiserror::Error;

use crate::types::FinishReason;

/// Main error type for the deepquant-core library
#[derive(Error, Debug)]
pub enum Error {
    /// A send was attempted while another turn is still alive
    #[error("a turn is already in progress")]
    TurnInProgress,

    /// Message id already present in the log
    #[error("duplicate message id: {0}")]
    DuplicateId(String),

    /// Tool result whose call id was never recorded
    #[error("tool result for unknown call {call_id} on message {message_id}")]
    OrphanResult { message_id: String, call_id: String },

    /// Second finish with a different reason
    #[error("message {message_id} already finished with {existing}, refusing {attempted}")]
    ReFinishConflict {
        message_id: String,
        existing: FinishReason,
        attempted: FinishReason,
    },

    /// Research already linked to a different report message
    #[error("research {research_id} already linked to {existing}, refusing {attempted}")]
    ResearchConflict {
        research_id: String,
        existing: String,
        attempted: String,
    },

    /// Message id not present in the log
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// Mutation of a message that already finished
    #[error("message {0} is not streaming")]
    NotStreaming(String),

    /// Network or framing failure on the event stream
    #[error("stream transport error: {0}")]
    StreamTransport(String),

    /// Turn cancelled by the user
    #[error("turn cancelled")]
    Cancelled,

    /// Turn controller asked to do something its state forbids
    #[error("invalid turn transition: {0}")]
    InvalidTransition(String),

    /// Replay sessions can only be started once
    #[error("replay session already started")]
    ReplayAlreadyStarted,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Report store / REST API error
    #[error("API error: {0}")]
    Api(String),
}

impl Error {
    /// Protocol violations are recovered locally: the event is dropped and
    /// the turn keeps going.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Error::DuplicateId(_)
                | Error::OrphanResult { .. }
                | Error::ReFinishConflict { .. }
                | Error::ResearchConflict { .. }
                | Error::MessageNotFound(_)
                | Error::NotStreaming(_)
        )
    }
}

/// Result type alias for deepquant-core
pub type Result<T> = std::result::Result<T, Error>;
