//! Backend API
//!
//! [`ApiClient`] is the live [`EventSource`](crate::stream::EventSource) and
//! the client for the report store. The report store owns persistence; this
//! crate only reads thread histories into the log and deletes reports.

mod client;
mod reports;

pub use client::ApiClient;
pub use reports::{HistoryMessage, Report, ThreadHistory};
