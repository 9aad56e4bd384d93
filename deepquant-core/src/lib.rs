//! # deepquant-core
//!
//! Core library for deepquant - a client for a multi-agent financial
//! research backend.
//!
//! This library provides:
//! - Domain types for messages, tool calls and interrupts
//! - A subscribable conversation store (message log and research index)
//! - The turn controller and stream ingestor
//! - Deterministic replay of recorded conversations
//! - The backend API client
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! ```text
//! send(text) ─▶ TurnController ─▶ EventSource ─▶ StreamIngestor ─▶ Store ─▶ subscribers
//!                                 (ApiClient or
//!                                  ReplaySession)
//! ```
//!
//! At most one turn is in flight per conversation. Every event is applied to
//! the store in arrival order, and every message a turn created is finished
//! when the turn ends, whether it completed, failed or was cancelled.
//!
//! ## Example
//!
//! ```rust,no_run
//! use deepquant_core::{Config, Conversation};
//!
//! # async fn run() -> deepquant_core::Result<()> {
//! let config = Config::load()?;
//! let conversation = Conversation::connect(&config)?;
//!
//! conversation.send("Analyze NVDA's latest earnings", None, None).await?;
//! for message in conversation.store().messages() {
//!     println!("[{}] {}", message.agent, message.content);
//! }
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use api::ApiClient;
pub use config::Config;
pub use conversation::Conversation;
pub use error::{Error, Result};
pub use replay::{Pacing, ReplayLog, ReplaySession};
pub use store::{Store, StoreState};
pub use stream::{CancelToken, ChatEvent, EventKind, EventSource};
pub use turn::{SendOptions, TurnController, TurnState, TurnSummary};
pub use types::*;

// Public modules
pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod logging;
pub mod replay;
pub mod store;
pub mod stream;
pub mod turn;
pub mod types;
