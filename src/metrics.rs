use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity since startup.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_summarized: AtomicU64,
    summarize_failures: AtomicU64,
    pages_processed: AtomicU64,
    characters_analyzed: AtomicU64,
    uploads: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a summarized document and the text volume sent to the model.
    pub fn record_summary(&self, page_count: u64, char_count: u64) {
        self.documents_summarized.fetch_add(1, Ordering::Relaxed);
        self.pages_processed.fetch_add(page_count, Ordering::Relaxed);
        self.characters_analyzed
            .fetch_add(char_count, Ordering::Relaxed);
    }

    /// Record a summarize request that ended in an error.
    pub fn record_failure(&self) {
        self.summarize_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stored upload.
    pub fn record_upload(&self) {
        self.uploads.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_summarized: self.documents_summarized.load(Ordering::Relaxed),
            summarize_failures: self.summarize_failures.load(Ordering::Relaxed),
            pages_processed: self.pages_processed.load(Ordering::Relaxed),
            characters_analyzed: self.characters_analyzed.load(Ordering::Relaxed),
            uploads: self.uploads.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents summarized successfully.
    pub documents_summarized: u64,
    /// Summarize requests that failed at any stage.
    pub summarize_failures: u64,
    /// Pages across all summarized documents.
    pub pages_processed: u64,
    /// Characters submitted to the model across all summarized documents.
    pub characters_analyzed: u64,
    /// Files stored through the upload endpoint.
    pub uploads: u64,
}
