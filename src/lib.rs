#![deny(missing_docs)]

//! Core library for the docsum PDF summarization service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// PDF text extraction.
pub mod extract;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline activity counters.
pub mod metrics;
/// Fetch → extract → summarize → persist orchestration.
pub mod pipeline;
/// Retry policy for upstream calls.
pub mod retry;
/// Object storage capability.
pub mod store;
/// Chat-completion client.
pub mod summarization;
