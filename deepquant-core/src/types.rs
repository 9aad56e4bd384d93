//! Core domain types for deepquant
//!
//! These types describe the conversation as the client sees it: an ordered
//! log of messages, some still receiving chunks from the agent backend.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Thread** | One conversation; every message belongs to exactly one thread |
//! | **Turn** | One user-initiated send-and-stream cycle |
//! | **Agent** | Logical sub-agent on the backend that produced a message (planner, researcher, reporter, ...) |
//! | **Chunk** | An incremental text delta belonging to one message |
//! | **Research** | A sub-thread of a conversation that culminates in a long-form report |
//! | **Interrupt** | A choice presented by the assistant; the user's pick is sent with the next turn |

use serde::{Deserialize, Serialize};

/// Agent name used when the source event does not carry one.
pub const DEFAULT_AGENT: &str = "assistant";

// ============================================
// Roles and finish reasons
// ============================================

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[default]
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" | "human" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// Why a message stopped streaming
///
/// Serialized as the plain string the backend uses (`"stop"`, `"interrupt"`, ...).
/// Unrecognized reasons are preserved verbatim in [`FinishReason::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    /// Normal completion
    Stop,
    /// Assistant paused to present options to the user
    Interrupt,
    /// Assistant handed off to tools
    ToolCalls,
    /// Turn was cancelled by the user
    Cancelled,
    /// Turn failed (transport error or server-signalled error)
    Error,
    /// Anything else the backend sends
    Other(String),
}

impl FinishReason {
    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Interrupt => "interrupt",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Cancelled => "cancelled",
            FinishReason::Error => "error",
            FinishReason::Other(reason) => reason,
        }
    }
}

impl From<&str> for FinishReason {
    fn from(s: &str) -> Self {
        match s {
            "stop" => FinishReason::Stop,
            "interrupt" => FinishReason::Interrupt,
            "tool_calls" => FinishReason::ToolCalls,
            "cancelled" => FinishReason::Cancelled,
            "error" => FinishReason::Error,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

impl From<String> for FinishReason {
    fn from(s: String) -> Self {
        FinishReason::from(s.as_str())
    }
}

impl From<FinishReason> for String {
    fn from(reason: FinishReason) -> Self {
        reason.as_str().to_string()
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// Tool calls and interrupts
// ============================================

/// A tool invocation requested by the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id, unique within a thread
    pub id: String,
    /// Tool name (web_search, python_repl, crawl_tool, ...)
    pub name: String,
    /// Arguments as sent by the backend
    #[serde(default)]
    pub args: serde_json::Value,
}

/// The resolved result of a [`ToolCall`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Id of the call this result answers
    pub call_id: String,
    /// Tool output, usually text or serialized JSON
    #[serde(default)]
    pub content: String,
}

/// One choice the assistant presents in an interrupt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptOption {
    /// Label shown to the user
    pub text: String,
    /// Value sent back as `interrupt_feedback`
    pub value: String,
}

/// The option a user picked in response to an interrupt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSelection {
    pub option: InterruptOption,
}

impl FeedbackSelection {
    pub fn new(option: InterruptOption) -> Self {
        Self { option }
    }
}

// ============================================
// Message
// ============================================

/// A unit of conversation content.
///
/// `content` is always the concatenation of `content_chunks`; both are only
/// extended by the stream ingestor (or replaced wholesale by a bulk load).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque id, stable for the message's lifetime
    pub id: String,
    /// Conversation this message belongs to
    pub thread_id: String,
    /// Author role
    pub role: Role,
    /// Backend sub-agent that produced the content
    pub agent: String,
    /// Fully assembled text
    pub content: String,
    /// Raw deltas in arrival order
    pub content_chunks: Vec<String>,
    /// True until a finish/error/cancel is observed
    pub is_streaming: bool,
    /// Set exactly once, at termination
    pub finish_reason: Option<FinishReason>,
    /// Tool invocations in arrival order
    pub tool_calls: Vec<ToolCall>,
    /// Tool results in arrival order
    pub tool_call_results: Vec<ToolCallResult>,
    /// Choices presented by an interrupt
    #[serde(default)]
    pub options: Vec<InterruptOption>,
    /// Feedback value this (user) message was sent with
    #[serde(default)]
    pub interrupt_feedback: Option<String>,
}

impl Message {
    /// Create an empty message that is still receiving chunks.
    pub fn streaming(
        id: impl Into<String>,
        thread_id: impl Into<String>,
        role: Role,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            role,
            agent: agent.into(),
            content: String::new(),
            content_chunks: Vec::new(),
            is_streaming: true,
            finish_reason: None,
            tool_calls: Vec::new(),
            tool_call_results: Vec::new(),
            options: Vec::new(),
            interrupt_feedback: None,
        }
    }

    /// Create a complete user message as it is sent.
    pub fn user(
        id: impl Into<String>,
        thread_id: impl Into<String>,
        text: impl Into<String>,
        interrupt_feedback: Option<String>,
    ) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            role: Role::User,
            agent: "user".to_string(),
            content: text.clone(),
            content_chunks: vec![text],
            is_streaming: false,
            finish_reason: None,
            tool_calls: Vec::new(),
            tool_call_results: Vec::new(),
            options: Vec::new(),
            interrupt_feedback,
        }
    }

    /// Create a finished message from stored history.
    pub fn from_history(
        id: impl Into<String>,
        thread_id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let agent = match role {
            Role::User => "user",
            _ => DEFAULT_AGENT,
        };
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            role,
            agent: agent.to_string(),
            content: content.clone(),
            content_chunks: vec![content],
            is_streaming: false,
            finish_reason: None,
            tool_calls: Vec::new(),
            tool_call_results: Vec::new(),
            options: Vec::new(),
            interrupt_feedback: None,
        }
    }

    /// Look up a tool call by id.
    pub fn tool_call(&self, call_id: &str) -> Option<&ToolCall> {
        self.tool_calls.iter().find(|c| c.id == call_id)
    }

    /// Look up the result for a tool call, if it has resolved.
    pub fn tool_result(&self, call_id: &str) -> Option<&ToolCallResult> {
        self.tool_call_results.iter().find(|r| r.call_id == call_id)
    }
}

// ============================================
// Notices
// ============================================

/// Severity of a user-visible notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible notice (the client shows these as toasts)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_strings() {
        assert_eq!(FinishReason::from("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from("interrupt"), FinishReason::Interrupt);
        assert_eq!(
            FinishReason::from("length"),
            FinishReason::Other("length".to_string())
        );
        assert_eq!(FinishReason::Cancelled.as_str(), "cancelled");
    }

    #[test]
    fn test_finish_reason_serde() {
        let json = serde_json::to_string(&FinishReason::ToolCalls).unwrap();
        assert_eq!(json, "\"tool_calls\"");
        let parsed: FinishReason = serde_json::from_str("\"content_filter\"").unwrap();
        assert_eq!(parsed, FinishReason::Other("content_filter".to_string()));
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert!("tool".parse::<Role>().is_err());
    }

    #[test]
    fn test_user_message_is_complete() {
        let msg = Message::user("u1", "t1", "AAA", Some("accepted".to_string()));
        assert!(!msg.is_streaming);
        assert_eq!(msg.content, "AAA");
        assert_eq!(msg.content_chunks, vec!["AAA".to_string()]);
        assert_eq!(msg.interrupt_feedback.as_deref(), Some("accepted"));
    }

    #[test]
    fn test_streaming_message_starts_empty() {
        let msg = Message::streaming("m1", "t1", Role::Assistant, "planner");
        assert!(msg.is_streaming);
        assert!(msg.content.is_empty());
        assert!(msg.finish_reason.is_none());
        assert_eq!(msg.agent, "planner");
    }
}
