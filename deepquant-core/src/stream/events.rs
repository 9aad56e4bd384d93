//! Typed agent events
//!
//! The backend sends one SSE frame per update. A frame's `event:` line names
//! the type and its `data:` line holds a flat JSON object:
//!
//! ```text
//! event: message_chunk
//! data: {"thread_id": "t1", "agent": "planner", "id": "run-1", "role": "assistant", "content": "He"}
//! ```
//!
//! A single frame may expand into several [`ChatEvent`]s (a final chunk that
//! also carries `finish_reason` becomes a chunk followed by a finish; a
//! `tool_calls` frame yields one event per call). Expansion preserves the
//! order in which the fields describe the update.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{FinishReason, InterruptOption, Role, ToolCall, ToolCallResult};

/// Payload of one event
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Text delta for the message
    Chunk { delta: String },
    /// Tool invocation requested by the message
    ToolCall(ToolCall),
    /// Result for an earlier tool call
    ToolResult(ToolCallResult),
    /// This message is the report of a research
    ReportLink { research_id: String },
    /// The message stopped streaming
    Finish { reason: FinishReason },
    /// The backend failed while producing the message
    Error { message: String },
    /// The assistant is waiting for the user to pick an option
    Interrupt { options: Vec<InterruptOption> },
    /// Anything this client does not understand
    Unknown { event_type: String },
}

impl EventKind {
    /// Wire name used when the event is written back out
    pub fn event_type(&self) -> &str {
        match self {
            EventKind::Chunk { .. } => "message_chunk",
            EventKind::ToolCall(_) => "tool_calls",
            EventKind::ToolResult(_) => "tool_call_result",
            EventKind::ReportLink { .. } => "report_link",
            EventKind::Finish { .. } => "finish",
            EventKind::Error { .. } => "error",
            EventKind::Interrupt { .. } => "interrupt",
            EventKind::Unknown { event_type } => event_type.as_str(),
        }
    }
}

/// One typed update for one message
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEvent {
    /// Message the update applies to
    pub message_id: String,
    /// Thread, when the backend names one
    pub thread_id: Option<String>,
    /// Author role (assistant unless the source says otherwise)
    pub role: Role,
    /// Sub-agent, when the backend names one
    pub agent: Option<String>,
    /// Research the message belongs to, when tagged
    pub research_id: Option<String>,
    /// Recorded delay before this event (replay files only)
    pub delay_ms: Option<u64>,
    pub kind: EventKind,
}

impl ChatEvent {
    /// Build an event with default envelope fields.
    pub fn new(message_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            message_id: message_id.into(),
            thread_id: None,
            role: Role::Assistant,
            agent: None,
            research_id: None,
            delay_ms: None,
            kind,
        }
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_research(mut self, research_id: impl Into<String>) -> Self {
        self.research_id = Some(research_id.into());
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }

    pub fn chunk(message_id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::new(
            message_id,
            EventKind::Chunk {
                delta: delta.into(),
            },
        )
    }

    pub fn finish(message_id: impl Into<String>, reason: impl Into<FinishReason>) -> Self {
        Self::new(
            message_id,
            EventKind::Finish {
                reason: reason.into(),
            },
        )
    }

    /// Decode one SSE frame into events.
    ///
    /// `event_type` is the frame's `event:` value and `data` its JSON body.
    /// Returns an empty list for frame types that carry nothing to apply.
    pub fn decode(event_type: &str, data: &str) -> Result<Vec<ChatEvent>> {
        let wire: WireEvent = serde_json::from_str(data)?;
        Ok(wire.into_events(event_type))
    }

    /// Encode as an SSE frame, the inverse of [`ChatEvent::decode`].
    pub fn encode(&self) -> Result<String> {
        let mut wire = WireEvent {
            id: self.message_id.clone(),
            thread_id: self.thread_id.clone(),
            role: Some(self.role.as_str().to_string()),
            agent: self.agent.clone(),
            research_id: self.research_id.clone(),
            delay_ms: self.delay_ms,
            ..Default::default()
        };
        match &self.kind {
            EventKind::Chunk { delta } => wire.content = Some(delta.clone()),
            EventKind::ToolCall(call) => wire.tool_calls = vec![call.clone()],
            EventKind::ToolResult(result) => {
                wire.tool_call_id = Some(result.call_id.clone());
                wire.content = Some(result.content.clone());
            }
            EventKind::ReportLink { research_id } => wire.research_id = Some(research_id.clone()),
            EventKind::Finish { reason } => wire.finish_reason = Some(reason.to_string()),
            EventKind::Error { message } => wire.message = Some(message.clone()),
            EventKind::Interrupt { options } => wire.options = options.clone(),
            EventKind::Unknown { .. } => {}
        }
        let data = serde_json::to_string(&wire)?;
        Ok(format!("event: {}\ndata: {}\n\n", self.kind.event_type(), data))
    }
}

/// Flat JSON body of an SSE frame
#[derive(Debug, Default, Serialize, Deserialize)]
struct WireEvent {
    #[serde(alias = "message_id")]
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    research_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call: Option<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, alias = "reason", skip_serializing_if = "Option::is_none")]
    finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    options: Vec<InterruptOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delay_ms: Option<u64>,
}

impl WireEvent {
    fn into_events(self, event_type: &str) -> Vec<ChatEvent> {
        let role = self
            .role
            .as_deref()
            .and_then(|r| r.parse::<Role>().ok())
            .unwrap_or_default();
        let envelope = ChatEvent {
            message_id: self.id.clone(),
            thread_id: self.thread_id.clone(),
            role,
            agent: self.agent.clone(),
            research_id: None,
            delay_ms: self.delay_ms,
            kind: EventKind::Unknown {
                event_type: event_type.to_string(),
            },
        };
        let tagged = |kind: EventKind| ChatEvent {
            research_id: self.research_id.clone(),
            kind,
            ..envelope.clone()
        };

        let mut events = Vec::new();
        match event_type {
            "chunk" | "message_chunk" => {
                events.push(tagged(EventKind::Chunk {
                    delta: self.content.clone().unwrap_or_default(),
                }));
                if let Some(reason) = &self.finish_reason {
                    events.push(tagged(EventKind::Finish {
                        reason: FinishReason::from(reason.as_str()),
                    }));
                }
            }
            "tool_call" | "tool_calls" => {
                if let Some(content) = self.content.as_ref().filter(|c| !c.is_empty()) {
                    events.push(tagged(EventKind::Chunk {
                        delta: content.clone(),
                    }));
                }
                for call in self.tool_call.iter().chain(self.tool_calls.iter()) {
                    events.push(tagged(EventKind::ToolCall(call.clone())));
                }
            }
            "tool_call_chunks" => {
                // Partial call arguments; the complete call arrives as `tool_calls`.
            }
            "tool_result" | "tool_call_result" => {
                if let Some(call_id) = &self.tool_call_id {
                    events.push(tagged(EventKind::ToolResult(ToolCallResult {
                        call_id: call_id.clone(),
                        content: self.content.clone().unwrap_or_default(),
                    })));
                } else {
                    events.push(tagged(EventKind::Unknown {
                        event_type: event_type.to_string(),
                    }));
                }
            }
            "report_link" => match &self.research_id {
                Some(research_id) => events.push(ChatEvent {
                    kind: EventKind::ReportLink {
                        research_id: research_id.clone(),
                    },
                    ..envelope.clone()
                }),
                None => events.push(envelope.clone()),
            },
            "finish" => events.push(tagged(EventKind::Finish {
                reason: self
                    .finish_reason
                    .as_deref()
                    .map(FinishReason::from)
                    .unwrap_or(FinishReason::Stop),
            })),
            "error" => events.push(tagged(EventKind::Error {
                message: self
                    .message
                    .clone()
                    .or_else(|| self.content.clone())
                    .unwrap_or_else(|| "unknown error".to_string()),
            })),
            "interrupt" => {
                if let Some(content) = self.content.as_ref().filter(|c| !c.is_empty()) {
                    events.push(tagged(EventKind::Chunk {
                        delta: content.clone(),
                    }));
                }
                events.push(tagged(EventKind::Interrupt {
                    options: self.options.clone(),
                }));
            }
            _ => events.push(tagged(EventKind::Unknown {
                event_type: event_type.to_string(),
            })),
        }
        events
    }
}
