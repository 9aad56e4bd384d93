//! Ordered message log
//!
//! Messages are stored in a map keyed by id; a separate id sequence records
//! conversation order. The sequence never holds duplicates and every id in it
//! has an entry in the map.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{FinishReason, Message, ToolCall, ToolCallResult};

/// Outcome of [`MessageLog::finish`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    /// The message stopped streaming
    Finished,
    /// The message had already finished with the same reason
    AlreadyFinished,
}

/// Id-keyed message storage with preserved insertion order
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MessageLog {
    ids: Vec<String>,
    messages: HashMap<String, Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message at the end of the conversation.
    pub fn append(&mut self, message: Message) -> Result<()> {
        if self.messages.contains_key(&message.id) {
            return Err(Error::DuplicateId(message.id));
        }
        self.ids.push(message.id.clone());
        self.messages.insert(message.id.clone(), message);
        Ok(())
    }

    /// Append a text delta to a streaming message.
    pub fn apply_chunk(&mut self, id: &str, delta: &str) -> Result<()> {
        let message = self.streaming_mut(id)?;
        if delta.is_empty() {
            return Ok(());
        }
        message.content_chunks.push(delta.to_string());
        message.content.push_str(delta);
        Ok(())
    }

    /// Record a tool invocation on a message.
    pub fn apply_tool_call(&mut self, id: &str, call: ToolCall) -> Result<()> {
        let message = self.get_mut(id)?;
        message.tool_calls.push(call);
        Ok(())
    }

    /// Record a tool result. The matching call must already be on the message.
    pub fn apply_tool_result(&mut self, id: &str, result: ToolCallResult) -> Result<()> {
        let message = self.get_mut(id)?;
        if message.tool_call(&result.call_id).is_none() {
            return Err(Error::OrphanResult {
                message_id: id.to_string(),
                call_id: result.call_id,
            });
        }
        message.tool_call_results.push(result);
        Ok(())
    }

    /// Stop a message from streaming.
    ///
    /// Calling again with the same reason is a no-op; a different reason is a
    /// [`Error::ReFinishConflict`].
    pub fn finish(&mut self, id: &str, reason: FinishReason) -> Result<FinishOutcome> {
        let message = self.get_mut(id)?;
        if !message.is_streaming {
            return match &message.finish_reason {
                Some(existing) if *existing == reason => Ok(FinishOutcome::AlreadyFinished),
                Some(existing) => Err(Error::ReFinishConflict {
                    message_id: id.to_string(),
                    existing: existing.clone(),
                    attempted: reason,
                }),
                None => Err(Error::NotStreaming(id.to_string())),
            };
        }
        message.is_streaming = false;
        message.finish_reason = Some(reason);
        Ok(FinishOutcome::Finished)
    }

    /// Replace the whole log. Later duplicates of an id are dropped.
    pub fn bulk_load(&mut self, messages: Vec<Message>) {
        let mut log = MessageLog::new();
        for message in messages {
            if let Err(e) = log.append(message) {
                tracing::warn!(error = %e, "Skipping duplicate message in bulk load");
            }
        }
        *self = log;
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.contains_key(id)
    }

    /// Message ids in conversation order
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Messages in conversation order
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.ids.iter().filter_map(|id| self.messages.get(id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids of messages still receiving chunks, in conversation order
    pub fn streaming_ids(&self) -> Vec<String> {
        self.iter()
            .filter(|m| m.is_streaming)
            .map(|m| m.id.clone())
            .collect()
    }

    /// Find the message that owns a tool call id.
    pub fn find_by_tool_call(&self, call_id: &str) -> Option<&Message> {
        self.iter().find(|m| m.tool_call(call_id).is_some())
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Result<&mut Message> {
        self.messages
            .get_mut(id)
            .ok_or_else(|| Error::MessageNotFound(id.to_string()))
    }

    fn streaming_mut(&mut self, id: &str) -> Result<&mut Message> {
        let message = self.get_mut(id)?;
        if !message.is_streaming {
            return Err(Error::NotStreaming(id.to_string()));
        }
        Ok(message)
    }
}
