//! Summarization pipeline: object reference in, structured summary out.

pub mod keys;
pub mod observer;
pub mod prompts;
mod service;
pub mod types;

pub use keys::{KeyMapping, derive_output_key, upload_key};
pub use observer::{IdentityLogger, PipelineObserver};
pub use service::{PipelineApi, PipelineService, PipelineSettings, SUMMARY_CONTENT_TYPE};
pub use types::{
    ExtractedText, ObjectReference, PipelineError, PipelineResponse, SummaryResult,
    UploadOutcome,
};
