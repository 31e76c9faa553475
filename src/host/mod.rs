// =====================================================
// HOST PROTOCOL
// JSON-over-newline events in, notifications out
// =====================================================

use crate::error::AdapterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::Mutex;

pub const INSERTED_TITLE: &str = "Record Successfully inserted.";

/// Messages from the host to the adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum HostEvent {
    /// Configuration handshake. Options stay raw until validated.
    Ready(ReadyPayload),

    /// One record or a batch of records.
    Data(Value),

    Close,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReadyPayload {
    #[serde(default)]
    pub options: Value,
}

/// Messages from the adapter to the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Notification {
    Ready,

    /// Serialized JSON text, as the host expects for log entries.
    Log(String),

    Error(ErrorReport),

    Close,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorReport {
    pub message: String,
    pub kind: String,
}

impl Notification {
    pub fn error(error: &AdapterError) -> Self {
        Notification::Error(ErrorReport {
            message: error.to_string(),
            kind: error.kind().to_string(),
        })
    }

    /// Log entry for a persisted record, carrying the record as received.
    pub fn inserted(record: &Map<String, Value>) -> Self {
        let entry = serde_json::json!({
            "title": INSERTED_TITLE,
            "data": record,
        });
        Notification::Log(entry.to_string())
    }
}

pub fn decode_event(line: &str) -> Result<HostEvent, AdapterError> {
    serde_json::from_str(line.trim()).map_err(|e| AdapterError::Protocol(e.to_string()))
}

pub fn encode_notification(notification: &Notification) -> Result<String, AdapterError> {
    let mut line =
        serde_json::to_string(notification).map_err(|e| AdapterError::Protocol(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Reads host events line by line. Blank lines are skipped.
pub struct EventReader<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// `None` at end of input. A malformed line yields a protocol error and
    /// the reader stays usable.
    pub async fn next_event(&mut self) -> Option<Result<HostEvent, AdapterError>> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(decode_event(&line)),
                Ok(None) => return None,
                Err(e) => return Some(Err(AdapterError::Io(e))),
            }
        }
    }
}

/// Outbound channel to the host.
#[async_trait]
pub trait HostNotifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), AdapterError>;
}

/// Writes one notification per line and flushes after each, so the host sees
/// it even if the process exits right after.
pub struct LineNotifier<W> {
    writer: Mutex<W>,
}

pub type StdoutNotifier = LineNotifier<tokio::io::Stdout>;

impl<W> LineNotifier<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl LineNotifier<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> HostNotifier for LineNotifier<W> {
    async fn notify(&self, notification: Notification) -> Result<(), AdapterError> {
        let line = encode_notification(&notification)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests;
