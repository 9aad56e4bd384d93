//! Research correlation
//!
//! A research is a sub-thread of the conversation (planning, searching,
//! coding) that ends in a long-form report message. The index maps each
//! research id to its report message, tracks the activity messages that
//! belong to it, and remembers which research is open in the UI.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Result of [`ResearchIndex::link_report`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    AlreadyLinked,
}

/// Research id → report message correlation
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResearchIndex {
    /// Known research ids in discovery order
    research_ids: Vec<String>,
    /// research id → report message id (immutable once set)
    reports: HashMap<String, String>,
    /// research id → activity message ids in arrival order
    activities: HashMap<String, Vec<String>>,
    /// Research currently expanded in the UI
    open_research_id: Option<String>,
    /// Research that is still producing activities
    ongoing_research_id: Option<String>,
}

impl ResearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Correlate a research with its report message.
    pub fn link_report(&mut self, research_id: &str, message_id: &str) -> Result<LinkOutcome> {
        match self.reports.get(research_id) {
            Some(existing) if existing == message_id => Ok(LinkOutcome::AlreadyLinked),
            Some(existing) => Err(Error::ResearchConflict {
                research_id: research_id.to_string(),
                existing: existing.clone(),
                attempted: message_id.to_string(),
            }),
            None => {
                self.register(research_id);
                self.reports
                    .insert(research_id.to_string(), message_id.to_string());
                Ok(LinkOutcome::Linked)
            }
        }
    }

    /// Expand a research in the UI. Does not require a report.
    pub fn open(&mut self, research_id: &str) {
        self.open_research_id = Some(research_id.to_string());
    }

    /// Collapse whatever is open. Always legal.
    pub fn close(&mut self) {
        self.open_research_id = None;
    }

    pub fn has_report(&self, research_id: &str) -> bool {
        self.reports.contains_key(research_id)
    }

    pub fn report_message_id(&self, research_id: &str) -> Option<&str> {
        self.reports.get(research_id).map(String::as_str)
    }

    pub fn open_research_id(&self) -> Option<&str> {
        self.open_research_id.as_deref()
    }

    pub fn ongoing_research_id(&self) -> Option<&str> {
        self.ongoing_research_id.as_deref()
    }

    /// Known research ids in discovery order
    pub fn research_ids(&self) -> &[String] {
        &self.research_ids
    }

    /// Activity message ids recorded for a research
    pub fn activities(&self, research_id: &str) -> &[String] {
        self.activities
            .get(research_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Which research (if any) a message is the report of.
    pub fn research_for_report(&self, message_id: &str) -> Option<&str> {
        self.reports
            .iter()
            .find(|(_, m)| m.as_str() == message_id)
            .map(|(r, _)| r.as_str())
    }

    /// Attribute an activity message to a research.
    ///
    /// The first activity of an unknown research while nothing is ongoing
    /// starts it and opens it. Returns true if the research was started.
    pub fn record_activity(&mut self, research_id: &str, message_id: &str) -> bool {
        let is_new = self.register(research_id);
        let list = self.activities.entry(research_id.to_string()).or_default();
        if !list.iter().any(|m| m == message_id) {
            list.push(message_id.to_string());
        }

        if is_new && self.ongoing_research_id.is_none() {
            self.ongoing_research_id = Some(research_id.to_string());
            self.open_research_id = Some(research_id.to_string());
            return true;
        }
        false
    }

    /// Called when a message finishes; ends the ongoing research if it was
    /// that research's report. Returns the research that ended.
    pub fn report_finished(&mut self, message_id: &str) -> Option<String> {
        let research_id = self.research_for_report(message_id)?.to_string();
        if self.ongoing_research_id.as_deref() == Some(research_id.as_str()) {
            self.ongoing_research_id = None;
            return Some(research_id);
        }
        None
    }

    /// Drop mappings that point at messages no longer in the log.
    pub fn retain_messages<F>(&mut self, exists: F)
    where
        F: Fn(&str) -> bool,
    {
        self.reports.retain(|_, message_id| exists(message_id));
        for list in self.activities.values_mut() {
            list.retain(|message_id| exists(message_id));
        }
        self.activities.retain(|_, list| !list.is_empty());

        let reports = &self.reports;
        let activities = &self.activities;
        self.research_ids
            .retain(|r| reports.contains_key(r) || activities.contains_key(r));

        if let Some(ongoing) = &self.ongoing_research_id {
            if !self.research_ids.contains(ongoing) {
                self.ongoing_research_id = None;
            }
        }
    }

    fn register(&mut self, research_id: &str) -> bool {
        if self.research_ids.iter().any(|r| r == research_id) {
            return false;
        }
        self.research_ids.push(research_id.to_string());
        true
    }
}
