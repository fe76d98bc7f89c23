//! Durability tests for the chat log.
//!
//! Covers file rotation, FIFO ordering, at-least-once delivery through a
//! sink outage, backpressure on a full backlog, and close semantics.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chronicle::{ChatLog, Error, LogEntry, LogSink, SinkConfig, SinkError};
use parking_lot::Mutex;

/// Records every delivered entry in memory.
#[derive(Default)]
struct CaptureSink {
    delivered: Arc<Mutex<Vec<LogEntry>>>,
}

#[async_trait]
impl LogSink for CaptureSink {
    async fn append(&mut self, entry: &LogEntry) -> Result<(), SinkError> {
        self.delivered.lock().push(entry.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Fails the first `failures` append attempts, then delivers.
struct FlakySink {
    failures: u32,
    delivered: Arc<Mutex<Vec<LogEntry>>>,
}

#[async_trait]
impl LogSink for FlakySink {
    async fn append(&mut self, entry: &LogEntry) -> Result<(), SinkError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(SinkError::Unavailable("connection refused".to_string()));
        }
        self.delivered.lock().push(entry.clone());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Never completes an append.
struct BlockedSink;

#[async_trait]
impl LogSink for BlockedSink {
    async fn append(&mut self, _entry: &LogEntry) -> Result<(), SinkError> {
        std::future::pending().await
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

fn entry(seq: u32) -> LogEntry {
    LogEntry::new()
        .with("Seq", seq.to_string())
        .with("Type", "MESSAGE")
        .with("Content", format!("message {seq}"))
}

#[tokio::test]
async fn file_backend_rotates_after_max_entries() {
    let dir = tempfile::tempdir().unwrap();
    let log = ChatLog::new(SinkConfig::File {
        directory: dir.path().to_path_buf(),
        label: "DISCORD".to_string(),
        max_entries_per_file: 2,
    });

    for seq in 1..=3 {
        log.add_entry(entry(seq)).await.unwrap();
    }
    log.close().await.unwrap();

    let mut files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|f| f.unwrap().path())
        .collect();
    files.sort();
    assert_eq!(files.len(), 2, "three entries at two per file need two files");

    let read_entries = |path: &std::path::Path| -> Vec<LogEntry> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    };

    let first = read_entries(&files[0]);
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].get("Seq"), Some("1"));
    assert_eq!(first[1].get("Seq"), Some("2"));

    let second = read_entries(&files[1]);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].get("Seq"), Some("3"));
}

#[tokio::test]
async fn entries_are_delivered_in_call_order() {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let log = ChatLog::with_sink(
        Box::new(CaptureSink {
            delivered: Arc::clone(&delivered),
        }),
        16,
    );

    for seq in 1..=20 {
        log.add_entry(entry(seq)).await.unwrap();
    }
    log.close().await.unwrap();

    let delivered = delivered.lock();
    assert_eq!(delivered.len(), 20);
    for (i, e) in delivered.iter().enumerate() {
        assert_eq!(e.get("Seq"), Some((i as u32 + 1).to_string().as_str()));
    }
}

#[tokio::test(start_paused = true)]
async fn sink_outage_loses_nothing_and_preserves_order() {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    // Unreachable for the first five attempts, spanning all three entries.
    let log = ChatLog::with_sink(
        Box::new(FlakySink {
            failures: 5,
            delivered: Arc::clone(&delivered),
        }),
        16,
    );

    for seq in 1..=3 {
        log.add_entry(entry(seq)).await.unwrap();
    }
    log.close().await.unwrap();

    let delivered = delivered.lock();
    assert_eq!(delivered.len(), 3, "all entries delivered after recovery");
    for (i, e) in delivered.iter().enumerate() {
        assert_eq!(e.get("Seq"), Some((i as u32 + 1).to_string().as_str()));
    }
}

#[tokio::test(start_paused = true)]
async fn full_backlog_surfaces_backpressure() {
    let log = ChatLog::with_sink(Box::new(BlockedSink), 1)
        .enqueue_timeout(Duration::from_millis(100));

    // The writer pulls the first entry and blocks in the sink; the next
    // fills the one-slot backlog.
    log.add_entry(entry(1)).await.unwrap();
    log.add_entry(entry(2)).await.unwrap();

    let err = log.add_entry(entry(3)).await.unwrap_err();
    assert!(matches!(err, Error::Backpressure(_)));
    // No close: the blocked writer would never drain.
}

#[tokio::test]
async fn add_entry_after_close_fails() {
    let log = ChatLog::with_sink(Box::new(CaptureSink::default()), 16);
    log.close().await.unwrap();

    let err = log.add_entry(entry(1)).await.unwrap_err();
    assert!(matches!(err, Error::LogClosed));
}
