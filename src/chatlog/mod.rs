//! Chat log - durable, ordered append sink for log records.
//!
//! Producers hand [`LogEntry`] records to [`ChatLog::add_entry`], which
//! places them in a bounded backlog. A single writer task drains the
//! backlog into the configured [`LogSink`] (rotating local files or a
//! remote queue), retrying with backoff while the backend is unavailable.
//! FIFO order is the channel order, so it holds across concurrent
//! producers; delivery is at-least-once (duplicates possible on reconnect,
//! loss is not acceptable).

mod entry;
mod file;
mod queue;
mod sink;

use std::path::PathBuf;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::Error;

pub use entry::LogEntry;
pub use file::FileSink;
pub use queue::QueueSink;
pub use sink::{LogSink, SinkError};

/// Default bound on the in-memory backlog.
const DEFAULT_BACKLOG: usize = 1024;

/// Default time a producer blocks on a full backlog before
/// [`Error::Backpressure`].
const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_secs(5);

/// Writer retry backoff bounds (exponential, doubling).
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Backend selection, decided once at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum SinkConfig {
    File {
        directory: PathBuf,
        label: String,
        max_entries_per_file: usize,
    },
    Queue {
        host: String,
        port: u16,
        username: String,
        password: String,
        queue_name: String,
    },
}

/// Durable ordered append log.
///
/// Constructed once at startup and shared via `Arc`. Must be created inside
/// a tokio runtime (construction spawns the writer task).
pub struct ChatLog {
    tx: Mutex<Option<mpsc::Sender<LogEntry>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    enqueue_timeout: Duration,
}

impl ChatLog {
    /// Create a log backed by the configured sink.
    pub fn new(config: SinkConfig) -> Self {
        let sink: Box<dyn LogSink> = match config {
            SinkConfig::File {
                directory,
                label,
                max_entries_per_file,
            } => {
                info!(directory = %directory.display(), label = %label, "chat log using file backend");
                Box::new(FileSink::new(directory, label, max_entries_per_file))
            }
            SinkConfig::Queue {
                host,
                port,
                username,
                password,
                queue_name,
            } => {
                info!(host = %host, queue = %queue_name, "chat log using queue backend");
                Box::new(QueueSink::new(host, port, username, password, queue_name))
            }
        };
        Self::with_sink(sink, DEFAULT_BACKLOG)
    }

    /// Create a log over a custom sink with the given backlog bound.
    pub fn with_sink(sink: Box<dyn LogSink>, backlog: usize) -> Self {
        let (tx, rx) = mpsc::channel(backlog.max(1));
        let writer = tokio::spawn(write_loop(sink, rx));
        Self {
            tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
        }
    }

    /// Set how long a producer blocks on a full backlog (builder pattern).
    #[must_use]
    pub fn enqueue_timeout(mut self, timeout: Duration) -> Self {
        self.enqueue_timeout = timeout;
        self
    }

    /// Append one record.
    ///
    /// Returns once the record is accepted into the backlog (from which the
    /// writer delivers it, retrying as long as it takes). If the backlog
    /// stays full past the enqueue timeout, returns
    /// [`Error::Backpressure`]; the record was not accepted and is never
    /// silently dropped.
    pub async fn add_entry(&self, entry: LogEntry) -> Result<(), Error> {
        let tx = self.tx.lock().clone().ok_or(Error::LogClosed)?;
        match tokio::time::timeout(self.enqueue_timeout, tx.send(entry)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::LogClosed),
            Err(_) => Err(Error::Backpressure(self.enqueue_timeout)),
        }
    }

    /// Drain the backlog, flush and release the sink, and stop the writer.
    ///
    /// Subsequent [`add_entry`](Self::add_entry) calls fail with
    /// [`Error::LogClosed`].
    pub async fn close(&self) -> Result<(), Error> {
        self.tx.lock().take();
        let writer = self.writer.lock().take();
        if let Some(writer) = writer {
            writer
                .await
                .map_err(|e| Error::SinkUnavailable(format!("writer task failed: {e}")))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChatLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatLog")
            .field("closed", &self.tx.lock().is_none())
            .field("enqueue_timeout", &self.enqueue_timeout)
            .finish()
    }
}

/// Single-writer drain loop. Ordering across producers is the channel
/// order; the sink only ever sees one operation at a time.
async fn write_loop(mut sink: Box<dyn LogSink>, mut rx: mpsc::Receiver<LogEntry>) {
    while let Some(entry) = rx.recv().await {
        append_with_retry(sink.as_mut(), &entry).await;
    }
    if let Err(e) = sink.close().await {
        warn!(error = %e, "error closing log sink");
    }
}

/// Deliver one entry, retrying transient failures with exponential backoff
/// until the backend accepts it. The entry is held, not dropped, for as
/// long as the outage lasts.
async fn append_with_retry(sink: &mut dyn LogSink, entry: &LogEntry) {
    let mut delay = INITIAL_RETRY_DELAY;
    loop {
        match sink.append(entry).await {
            Ok(()) => return,
            Err(e) if e.is_transient() => {
                warn!(error = %e, retry_in = ?delay, "log sink unavailable, retrying");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }
            Err(e) => {
                // Encode failures cannot succeed on retry. A flat
                // string map always encodes, so this path is unreachable
                // in practice; log loudly rather than block the queue.
                error!(error = %e, "dropping unencodable log entry");
                return;
            }
        }
    }
}
