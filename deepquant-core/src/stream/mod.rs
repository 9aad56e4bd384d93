//! Agent event streams
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   bytes   ┌────────────┐  frames  ┌─────────────┐
//! │  ApiClient   │──────────▶│ SseDecoder │─────────▶│  ChatEvent  │──┐
//! └──────────────┘           └────────────┘          │   decode    │  │
//! ┌──────────────┐                                   └─────────────┘  │
//! │ReplaySession │──────────── recorded ChatEvents ───────────────────┤
//! └──────────────┘                                                    ▼
//!                                                           ┌────────────────┐
//!                                                           │ StreamIngestor │──▶ Store
//!                                                           └────────────────┘
//! ```
//!
//! Both sources implement [`EventSource`]; the turn controller does not know
//! which one it is driving.

mod events;
mod ingest;
mod source;
mod sse;

pub use events::{ChatEvent, EventKind};
pub use ingest::{StreamIngestor, REPORTER_AGENT, RESEARCH_AGENTS};
pub use source::{BoxFuture, CancelToken, ChatRequest, EventSource, EventStream, RequestMessage};
pub use sse::{decode_event_stream, parse_sse_text, SseDecoder, SseFrame};
