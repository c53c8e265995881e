//! JSONL file bus.
//!
//! Each delivered message becomes one JSON line in the events file with a
//! `timestamp` field; dead letters go to a separate file in the same shape
//! plus `reason` and `attempts`.

use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use taskforge_application::ports::message_bus::{
    DeadLetter, MessageBus, OutboundMessage, TransportError,
};
use tracing::warn;

struct JsonlFile {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlFile {
    fn open(path: &Path) -> Option<Self> {
        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create event log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open event log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    fn append(&self, record: &serde_json::Value) -> Result<(), TransportError> {
        let line =
            serde_json::to_string(record).map_err(|e| TransportError::Rejected(e.to_string()))?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line).map_err(|e| TransportError::Io(e.to_string()))?;
        // flushed per line: Ok means the line reached the file
        writer.flush().map_err(|e| TransportError::Io(e.to_string()))
    }
}

impl Drop for JsonlFile {
    fn drop(&mut self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writer.flush();
    }
}

fn record(message: &OutboundMessage) -> serde_json::Value {
    serde_json::json!({
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "exchange": message.exchange,
        "routing_key": message.routing_key,
        "message_id": message.message_id,
        "payload": message.payload,
    })
}

/// File-backed bus writing one JSON object per line.
pub struct JsonlMessageBus {
    events: JsonlFile,
    dead_letters: JsonlFile,
}

impl JsonlMessageBus {
    /// Open (appending) the events file and the dead-letter file.
    ///
    /// Creates parent directories as needed. Returns `None` if either file
    /// cannot be opened.
    pub fn new(events_path: impl AsRef<Path>, dead_letter_path: impl AsRef<Path>) -> Option<Self> {
        Some(Self {
            events: JsonlFile::open(events_path.as_ref())?,
            dead_letters: JsonlFile::open(dead_letter_path.as_ref())?,
        })
    }

    /// `<dir>/events.jsonl` and `<dir>/dead_letters.jsonl`
    pub fn in_dir(dir: impl AsRef<Path>) -> Option<Self> {
        let dir = dir.as_ref();
        Self::new(dir.join("events.jsonl"), dir.join("dead_letters.jsonl"))
    }

    pub fn events_path(&self) -> &Path {
        &self.events.path
    }

    pub fn dead_letter_path(&self) -> &Path {
        &self.dead_letters.path
    }
}

#[async_trait]
impl MessageBus for JsonlMessageBus {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        self.events.append(&record(message))
    }

    async fn dead_letter(&self, letter: &DeadLetter) -> Result<(), TransportError> {
        let mut value = record(&letter.message);
        if let serde_json::Value::Object(map) = &mut value {
            map.insert("reason".to_string(), letter.reason.clone().into());
            map.insert("attempts".to_string(), letter.attempts.into());
        }
        self.dead_letters.append(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(key: &str, id: &str) -> OutboundMessage {
        OutboundMessage {
            exchange: "coding_agent_events".to_string(),
            routing_key: key.to_string(),
            message_id: id.to_string(),
            payload: serde_json::json!({"eventType": "TaskCreated", "taskId": "t-1"}),
        }
    }

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_writes_one_line_per_message() {
        let dir = tempfile::tempdir().unwrap();
        let bus = JsonlMessageBus::in_dir(dir.path().join("bus")).unwrap();

        bus.send(&message("task.created", "e-1")).await.unwrap();
        bus.send(&message("task.started", "e-2")).await.unwrap();

        let lines = read_lines(bus.events_path());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["routing_key"], "task.created");
        assert_eq!(lines[0]["message_id"], "e-1");
        assert_eq!(lines[0]["payload"]["taskId"], "t-1");
        assert!(lines[1].get("timestamp").is_some());
    }

    #[tokio::test]
    async fn test_dead_letters_go_to_their_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let bus = JsonlMessageBus::in_dir(dir.path()).unwrap();

        bus.dead_letter(&DeadLetter {
            message: message("task.failed", "e-3"),
            reason: "Transport unavailable: broker down".to_string(),
            attempts: 3,
        })
        .await
        .unwrap();

        assert!(read_lines(bus.events_path()).is_empty());
        let letters = read_lines(bus.dead_letter_path());
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0]["attempts"], 3);
        assert_eq!(letters[0]["reason"], "Transport unavailable: broker down");
    }

    #[tokio::test]
    async fn test_reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        {
            let bus = JsonlMessageBus::in_dir(dir.path()).unwrap();
            bus.send(&message("task.created", "e-1")).await.unwrap();
        }
        let bus = JsonlMessageBus::in_dir(dir.path()).unwrap();
        bus.send(&message("task.completed", "e-2")).await.unwrap();

        assert_eq!(read_lines(bus.events_path()).len(), 2);
    }
}
