//! Sink abstraction over log backends.

use async_trait::async_trait;

use super::LogEntry;

/// Failure of a single sink operation.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend is unreachable. The writer holds the entry and retries
    /// with backoff until the backend recovers.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SinkError {
    /// Whether retrying the same entry can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SinkError::Io(_) | SinkError::Unavailable(_))
    }
}

/// A durable append destination for log records.
///
/// Implementations are owned and driven by a single writer task, so they
/// take `&mut self` and need not synchronize internally. Appends must be
/// durable or fail: an `Ok` return means the record reached the backend.
#[async_trait]
pub trait LogSink: Send {
    /// Append one record.
    async fn append(&mut self, entry: &LogEntry) -> Result<(), SinkError>;

    /// Push any buffered state to the backend.
    async fn flush(&mut self) -> Result<(), SinkError>;

    /// Flush and release the backend handle. Called exactly once, on
    /// shutdown.
    async fn close(&mut self) -> Result<(), SinkError>;
}
