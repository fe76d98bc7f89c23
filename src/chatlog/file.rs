//! Rotating local file sink.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::sink::{LogSink, SinkError};
use super::LogEntry;

/// Writes records as JSON lines to files under a directory, rotating to a
/// fresh file every `max_entries_per_file` records.
///
/// Files are named `{label}-{UTC time}-{sequence}.log`; the zero-padded
/// sequence keeps names unique and sortable within one rotation second. The
/// previous file handle is synced and released on every rotation and on
/// close.
pub struct FileSink {
    directory: PathBuf,
    label: String,
    max_entries_per_file: usize,
    file: Option<File>,
    entries_in_file: usize,
    sequence: u64,
}

impl FileSink {
    pub fn new(directory: impl Into<PathBuf>, label: impl Into<String>, max_entries_per_file: usize) -> Self {
        Self {
            directory: directory.into(),
            label: label.into(),
            // A zero threshold would rotate before every entry; treat it
            // as one entry per file.
            max_entries_per_file: max_entries_per_file.max(1),
            file: None,
            entries_in_file: 0,
            sequence: 0,
        }
    }

    /// Release the current file, if any, and open the next one.
    async fn rotate(&mut self) -> Result<(), SinkError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
            debug!(entries = self.entries_in_file, "rotated chat log file");
        }

        tokio::fs::create_dir_all(&self.directory).await?;
        self.sequence += 1;
        let name = format!(
            "{}-{}-{:05}.log",
            self.label,
            Utc::now().format("%Y%m%dT%H%M%S"),
            self.sequence
        );
        let path = self.directory.join(name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        info!(path = %path.display(), "opened chat log file");
        self.file = Some(file);
        self.entries_in_file = 0;
        Ok(())
    }
}

#[async_trait]
impl LogSink for FileSink {
    async fn append(&mut self, entry: &LogEntry) -> Result<(), SinkError> {
        if self.file.is_none() || self.entries_in_file >= self.max_entries_per_file {
            self.rotate().await?;
        }

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        if let Some(file) = self.file.as_mut() {
            file.write_all(line.as_bytes()).await?;
            self.entries_in_file += 1;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if let Some(file) = self.file.as_mut() {
            file.flush().await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        Ok(())
    }
}
