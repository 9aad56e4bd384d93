//! Conversation root
//!
//! Wires a [`Store`], a [`TurnController`] and the pending interrupt feedback
//! into one handle the application owns. Clones share all state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::ApiClient;
use crate::config::{ChatSettings, Config};
use crate::error::{Error, Result};
use crate::replay::ReplaySession;
use crate::store::{FeedbackChannel, Store};
use crate::stream::{CancelToken, EventSource};
use crate::turn::{SendOptions, TurnController, TurnSummary};
use crate::types::{FeedbackSelection, InterruptOption};

#[derive(Debug, Clone)]
pub struct Conversation {
    store: Store,
    turns: TurnController,
    feedback: Arc<Mutex<FeedbackChannel>>,
    api: Option<ApiClient>,
}

impl Conversation {
    /// Conversation over an arbitrary event source.
    pub fn new(store: Store, source: Arc<dyn EventSource>, settings: ChatSettings) -> Self {
        Self {
            turns: TurnController::new(store.clone(), source, settings),
            store,
            feedback: Arc::new(Mutex::new(FeedbackChannel::new())),
            api: None,
        }
    }

    /// Conversation against the live backend, on a new thread.
    pub fn connect(config: &Config) -> Result<Self> {
        let client = ApiClient::new(&config.api)?;
        let store = Store::with_new_thread();
        let turns = TurnController::new(
            store.clone(),
            Arc::new(client.clone()),
            config.chat.clone(),
        )
        .with_user_id(client.user_id().map(str::to_string));
        Ok(Self {
            store,
            turns,
            feedback: Arc::new(Mutex::new(FeedbackChannel::new())),
            api: Some(client),
        })
    }

    /// Conversation driven by a recorded session.
    pub fn replay(session: Arc<ReplaySession>, settings: ChatSettings) -> Self {
        Self::new(Store::with_new_thread(), session, settings)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn turns(&self) -> &TurnController {
        &self.turns
    }

    pub fn responding(&self) -> bool {
        self.turns.responding()
    }

    /// Pick an option for the next send, replacing any earlier pick.
    pub fn select_feedback(&self, option: InterruptOption) {
        self.feedback().select(option);
    }

    pub fn clear_feedback(&self) {
        self.feedback().clear();
    }

    pub fn pending_feedback(&self) -> Option<FeedbackSelection> {
        self.feedback().consume_for_next_send()
    }

    /// Send a turn with any pending feedback attached.
    ///
    /// The feedback is cleared only if the turn completes; after a failed or
    /// cancelled send it is still pending for a retry.
    pub async fn send(
        &self,
        text: &str,
        chat_id: Option<String>,
        cancel: Option<CancelToken>,
    ) -> Result<TurnSummary> {
        let feedback = self.pending_feedback();
        let options = SendOptions {
            interrupt_feedback: feedback.map(|f| f.option.value),
            chat_id,
            cancel,
        };
        let summary = self.turns.send(text, options).await?;
        self.clear_feedback();
        Ok(summary)
    }

    /// Answer an interrupt: select the option and send its label.
    pub async fn respond_to_interrupt(
        &self,
        option: InterruptOption,
        cancel: Option<CancelToken>,
    ) -> Result<TurnSummary> {
        let text = option.text.clone();
        self.select_feedback(option);
        self.send(&text, None, cancel).await
    }

    pub fn cancel(&self) -> Result<()> {
        self.turns.cancel()
    }

    pub fn open_research(&self, research_id: &str) {
        self.store.open_research(research_id);
    }

    pub fn close_research(&self) {
        self.store.close_research();
    }

    /// Text to copy for a research's report.
    pub fn report_text(&self, research_id: &str) -> Option<String> {
        self.store.report_text(research_id)
    }

    /// Replace the log with a stored thread. Returns the number of messages.
    ///
    /// The turn slot is held until the history is in the log, so a send
    /// cannot start while the fetch is pending.
    pub async fn load_thread(&self, thread_id: &str) -> Result<usize> {
        let api = self.api()?;
        let _slot = self.turns.begin_load()?;
        let history = api.fetch_thread(thread_id).await?;
        let messages = history.into_messages();
        let count = messages.len();
        self.store.bulk_load(thread_id, messages);
        Ok(count)
    }

    /// Generate podcast audio from a finished report.
    pub async fn generate_podcast(&self, research_id: &str) -> Result<Vec<u8>> {
        if self.store.report_streaming(research_id) {
            return Err(Error::Api(format!(
                "report for {} is still streaming",
                research_id
            )));
        }
        let text = self
            .report_text(research_id)
            .ok_or_else(|| Error::Api(format!("no report for research {}", research_id)))?;
        self.api()?.generate_podcast(&text).await
    }

    fn api(&self) -> Result<&ApiClient> {
        self.api
            .as_ref()
            .ok_or_else(|| Error::Config("no backend configured".to_string()))
    }

    fn feedback(&self) -> MutexGuard<'_, FeedbackChannel> {
        self.feedback.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
