//! Applying events to the store
//!
//! The ingestor is the only writer of messages during a turn. Each event is
//! applied inside a single [`Store`] mutation, so observers never see half an
//! event, and events are applied strictly in the order they are passed in.
//!
//! ## Research tracking
//!
//! An event tagged with `research_id` attributes its message to that
//! research. Untagged messages from the research agents (researcher, coder,
//! reporter) join the ongoing research, or start a new one keyed by their own
//! message id. A message from the reporter agent is the research's report.

use crate::error::{Error, Result};
use crate::store::{FinishOutcome, Store, StoreState};
use crate::stream::events::{ChatEvent, EventKind};
use crate::types::{FinishReason, Message, Notice, DEFAULT_AGENT};

/// Agents whose messages belong to a research rather than the main chat
pub const RESEARCH_AGENTS: &[&str] = &["researcher", "coder", "reporter"];

/// Agent whose message is the research's report
pub const REPORTER_AGENT: &str = "reporter";

/// Applies one turn's events to a [`Store`]
#[derive(Debug)]
pub struct StreamIngestor {
    store: Store,
    /// Messages this turn touched, in first-seen order
    touched: Vec<String>,
}

impl StreamIngestor {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            touched: Vec::new(),
        }
    }

    /// Apply an event, dropping it with a warning if it violates the
    /// protocol. Returns true if it was applied.
    pub fn ingest(&mut self, event: &ChatEvent) -> bool {
        match self.apply(event) {
            Ok(()) => true,
            Err(e) if e.is_protocol_violation() => {
                tracing::warn!(
                    message_id = %event.message_id,
                    event_type = event.kind.event_type(),
                    error = %e,
                    "Dropping event"
                );
                false
            }
            Err(e) => {
                tracing::warn!(message_id = %event.message_id, error = %e, "Failed to apply event");
                false
            }
        }
    }

    /// Apply an event, returning protocol violations to the caller.
    pub fn apply(&mut self, event: &ChatEvent) -> Result<()> {
        if let EventKind::Unknown { event_type } = &event.kind {
            tracing::warn!(
                event_type = %event_type,
                message_id = %event.message_id,
                "Ignoring unknown event type"
            );
            return Ok(());
        }

        let (result, notice) = self.store.mutate(|state| {
            // A rejected event must not leave an implicitly created message.
            if let Err(e) = check_event(state, event) {
                return (Err(e), None);
            }
            let created = ensure_message(state, event);
            track_research(state, event, created);
            let result = apply_kind(state, event);
            let notice = match (&result, &event.kind) {
                (Ok(()), EventKind::Error { message }) => Some(Notice::error(message.clone())),
                _ => None,
            };
            if let Some(notice) = &notice {
                state.notices.push(notice.clone());
            }
            (result, notice)
        });

        if self.store.read(|s| s.log.contains(&event.message_id))
            && !self.touched.contains(&event.message_id)
        {
            self.touched.push(event.message_id.clone());
        }

        if let Some(notice) = notice {
            tracing::warn!(message_id = %event.message_id, error = %notice.text, "Backend reported an error");
        }
        result
    }

    /// Finish every message this turn left streaming. Returns their ids.
    pub fn finalize(&mut self, reason: FinishReason) -> Vec<String> {
        let touched = std::mem::take(&mut self.touched);
        let finished = self.store.mutate(|state| {
            let mut finished = Vec::new();
            for id in &touched {
                let streaming = state.log.get(id).map(|m| m.is_streaming).unwrap_or(false);
                if !streaming {
                    continue;
                }
                if let Ok(FinishOutcome::Finished) = finish_message(state, id, reason.clone()) {
                    finished.push(id.clone());
                }
            }
            finished
        });
        if !finished.is_empty() {
            tracing::debug!(count = finished.len(), reason = %reason, "Finalized streaming messages");
        }
        finished
    }

    /// Messages this turn has touched so far
    pub fn touched(&self) -> &[String] {
        &self.touched
    }
}

/// Reject events that would violate the protocol against the current state.
fn check_event(state: &StoreState, event: &ChatEvent) -> Result<()> {
    let id = event.message_id.as_str();
    match &event.kind {
        EventKind::ToolResult(result) => {
            tool_call_owner(state, id, &result.call_id).map(|_| ())
        }
        EventKind::ReportLink { research_id } => {
            match state.research.report_message_id(research_id) {
                Some(existing) if existing != id => Err(Error::ResearchConflict {
                    research_id: research_id.clone(),
                    existing: existing.to_string(),
                    attempted: id.to_string(),
                }),
                _ => Ok(()),
            }
        }
        _ => Ok(()),
    }
}

/// Message holding the tool call a result answers: the event's own message
/// if it made the call, otherwise whichever message did.
fn tool_call_owner(state: &StoreState, id: &str, call_id: &str) -> Result<String> {
    if let Some(message) = state.log.get(id) {
        if message.tool_call(call_id).is_some() {
            return Ok(id.to_string());
        }
    }
    state
        .log
        .find_by_tool_call(call_id)
        .map(|owner| owner.id.clone())
        .ok_or_else(|| Error::OrphanResult {
            message_id: id.to_string(),
            call_id: call_id.to_string(),
        })
}

/// Create the event's message if the log has not seen it. Returns true if
/// the message was created here.
fn ensure_message(state: &mut StoreState, event: &ChatEvent) -> bool {
    if state.log.contains(&event.message_id) {
        return false;
    }
    let thread_id = event
        .thread_id
        .clone()
        .unwrap_or_else(|| state.thread_id.clone());
    let agent = event.agent.as_deref().unwrap_or(DEFAULT_AGENT);
    tracing::debug!(
        message_id = %event.message_id,
        agent,
        event_type = event.kind.event_type(),
        "Creating message"
    );
    let message = Message::streaming(&event.message_id, thread_id, event.role, agent);
    // Cannot collide: presence was checked above.
    let _ = state.log.append(message);
    true
}

fn track_research(state: &mut StoreState, event: &ChatEvent, created: bool) {
    let research_id = match &event.research_id {
        Some(id) => Some(id.clone()),
        None if created => {
            let agent = event.agent.as_deref().unwrap_or(DEFAULT_AGENT);
            RESEARCH_AGENTS.contains(&agent).then(|| {
                state
                    .research
                    .ongoing_research_id()
                    .map(str::to_string)
                    .unwrap_or_else(|| event.message_id.clone())
            })
        }
        None => None,
    };
    let Some(research_id) = research_id else {
        return;
    };

    if state.research.record_activity(&research_id, &event.message_id) {
        tracing::info!(research_id = %research_id, "Research started");
    }
    if event.agent.as_deref() == Some(REPORTER_AGENT) && !state.research.has_report(&research_id) {
        if let Err(e) = state.research.link_report(&research_id, &event.message_id) {
            tracing::warn!(error = %e, "Could not link report");
        }
    }
}

fn apply_kind(state: &mut StoreState, event: &ChatEvent) -> Result<()> {
    let id = event.message_id.as_str();
    match &event.kind {
        EventKind::Chunk { delta } => state.log.apply_chunk(id, delta),
        EventKind::ToolCall(call) => state.log.apply_tool_call(id, call.clone()),
        EventKind::ToolResult(result) => {
            let owner = tool_call_owner(state, id, &result.call_id)?;
            state.log.apply_tool_result(&owner, result.clone())
        }
        EventKind::ReportLink { research_id } => {
            state.research.link_report(research_id, id).map(|_| ())
        }
        EventKind::Finish { reason } => finish_message(state, id, reason.clone()).map(|_| ()),
        EventKind::Error { .. } => finish_message(state, id, FinishReason::Error).map(|_| ()),
        EventKind::Interrupt { options } => {
            state.log.get_mut(id)?.options = options.clone();
            finish_message(state, id, FinishReason::Interrupt).map(|_| ())
        }
        EventKind::Unknown { .. } => Ok(()),
    }
}

fn finish_message(state: &mut StoreState, id: &str, reason: FinishReason) -> Result<FinishOutcome> {
    let outcome = state.log.finish(id, reason)?;
    if outcome == FinishOutcome::Finished {
        if let Some(research_id) = state.research.report_finished(id) {
            tracing::info!(research_id = %research_id, "Research finished");
        }
    }
    Ok(outcome)
}
