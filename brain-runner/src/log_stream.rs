//! Structured log pipeline.
//!
//! Every child-process output line and runner event becomes a `LogRecord`
//! that is (a) kept in a bounded ring buffer for the TUI, (b) appended to
//! the per-project JSONL file, and (c) broadcast to live subscribers.
//! Subscribers that fall behind lose the oldest entries and receive a
//! single "N dropped" marker instead.

use std::collections::{HashMap, VecDeque};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use crate::types::LogLevel;

/// One structured log line, serialized as a single JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            level,
            message: message.into(),
            task_id: None,
            project_id: None,
            context: None,
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

struct Inner {
    ring: VecDeque<LogRecord>,
    ring_max: usize,
    sinks: HashMap<String, PathBuf>,
}

/// Fan-out hub owned by the runner; clones of the broadcast sender feed the
/// supervisor's stdio pumps.
pub struct LogStream {
    tx: broadcast::Sender<LogRecord>,
    inner: Mutex<Inner>,
    /// Notebook root for per-project JSONL sinks; `None` disables file output.
    base: Option<PathBuf>,
}

impl LogStream {
    pub fn new(base: Option<PathBuf>, subscriber_buffer: usize, ring_max: usize) -> Self {
        let (tx, _) = broadcast::channel(subscriber_buffer.max(1));
        Self {
            tx,
            inner: Mutex::new(Inner {
                ring: VecDeque::with_capacity(ring_max),
                ring_max,
                sinks: HashMap::new(),
            }),
            base,
        }
    }

    /// Publish a record to the ring, the file sink, and all subscribers.
    pub fn publish(&self, record: LogRecord) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.ring.push_back(record.clone());
            while inner.ring.len() > inner.ring_max {
                inner.ring.pop_front();
            }
            if let Some(ref base) = self.base {
                if let Some(ref project) = record.project_id {
                    let path = inner
                        .sinks
                        .entry(project.clone())
                        .or_insert_with(|| crate::config::project_log_path(base, project))
                        .clone();
                    write_jsonl(&path, &record);
                }
            }
        }
        // No subscribers is fine; the ring still has the record.
        let _ = self.tx.send(record);
    }

    pub fn info(&self, project: &str, message: impl Into<String>) {
        self.publish(LogRecord::new(LogLevel::Info, message).with_project(project));
    }

    pub fn warn(&self, project: &str, message: impl Into<String>) {
        self.publish(LogRecord::new(LogLevel::Warn, message).with_project(project));
    }

    pub fn error(&self, project: &str, message: impl Into<String>) {
        self.publish(LogRecord::new(LogLevel::Error, message).with_project(project));
    }

    /// Most recent `count` records, oldest first.
    pub fn recent(&self, count: usize) -> Vec<LogRecord> {
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        let len = inner.ring.len();
        inner.ring.iter().skip(len.saturating_sub(count)).cloned().collect()
    }

    pub fn subscribe(&self) -> LogSubscriber {
        LogSubscriber {
            rx: self.tx.subscribe(),
        }
    }
}

fn write_jsonl(path: &PathBuf, record: &LogRecord) {
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) else {
        warn!(path = %path.display(), "Cannot open log sink");
        return;
    };
    if let Ok(line) = serde_json::to_string(record) {
        let _ = writeln!(file, "{line}");
    }
}

/// Receiving end of the broadcast. Lag is converted into a marker record so
/// consumers see exactly one "N dropped" line instead of an error.
pub struct LogSubscriber {
    rx: broadcast::Receiver<LogRecord>,
}

impl LogSubscriber {
    /// Next record, or `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<LogRecord> {
        loop {
            match self.rx.recv().await {
                Ok(record) => return Some(record),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    return Some(LogRecord::new(
                        LogLevel::Warn,
                        format!("{n} log entries dropped (subscriber lagging)"),
                    ));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant used by render loops.
    pub fn try_recv(&mut self) -> Option<LogRecord> {
        match self.rx.try_recv() {
            Ok(record) => Some(record),
            Err(broadcast::error::TryRecvError::Lagged(n)) => Some(LogRecord::new(
                LogLevel::Warn,
                format!("{n} log entries dropped (subscriber lagging)"),
            )),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_caps_length() {
        let stream = LogStream::new(None, 16, 3);
        for i in 0..5 {
            stream.publish(LogRecord::new(LogLevel::Info, format!("line {i}")));
        }
        let recent = stream.recent(10);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].message, "line 2");
        assert_eq!(recent[2].message, "line 4");
    }

    #[tokio::test]
    async fn test_subscriber_receives_in_order() {
        let stream = LogStream::new(None, 16, 10);
        let mut sub = stream.subscribe();
        for i in 0..4 {
            stream.publish(
                LogRecord::new(LogLevel::Info, format!("frame {i}")).with_task("a1b2c3d4"),
            );
        }
        for i in 0..4 {
            let record = sub.recv().await.unwrap();
            assert_eq!(record.message, format!("frame {i}"));
            assert_eq!(record.task_id.as_deref(), Some("a1b2c3d4"));
        }
    }

    #[tokio::test]
    async fn test_lagged_subscriber_gets_drop_marker() {
        let stream = LogStream::new(None, 2, 100);
        let mut sub = stream.subscribe();
        for i in 0..10 {
            stream.publish(LogRecord::new(LogLevel::Info, format!("line {i}")));
        }
        let record = sub.recv().await.unwrap();
        assert!(
            record.message.contains("dropped"),
            "expected drop marker, got: {}",
            record.message
        );
    }

    #[test]
    fn test_jsonl_sink_writes_one_object_per_line() {
        let tmp = tempfile::tempdir().unwrap();
        let stream = LogStream::new(Some(tmp.path().to_path_buf()), 16, 10);
        stream.info("demo", "first");
        stream.warn("demo", "second");

        let path = crate::config::project_log_path(tmp.path(), "demo");
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: LogRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.message, "first");
        assert_eq!(first.project_id.as_deref(), Some("demo"));
        let second: LogRecord = serde_json::from_str(lines[1]).unwrap();
        assert!(matches!(second.level, LogLevel::Warn));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = LogRecord::new(LogLevel::Error, "boom")
            .with_task("a1b2c3d4")
            .with_project("demo");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"taskId\":\"a1b2c3d4\""));
        assert!(json.contains("\"projectId\":\"demo\""));
        assert!(json.contains("\"level\":\"error\""));
    }
}
