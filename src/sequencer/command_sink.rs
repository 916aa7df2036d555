//! Command sink: the line-oriented chat transport the sequencer drives.

use async_trait::async_trait;
use std::sync::Mutex as StdMutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex as AsyncMutex;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum CommandSinkError {
    #[error("failed to write command: {0}")]
    Write(String),
}

/// Single-writer resource owned by the supervisor; accepts opaque command
/// strings (`!y ...`, `!p ...`, `!w ...`, `!eol ...`).
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send(&self, line: &str) -> Result<(), CommandSinkError>;
}

/// Test/demo double that records every command in order instead of sending
/// it anywhere. The integration tests for the end-to-end scenarios assert
/// against this log.
#[derive(Default)]
pub struct RecordingCommandSink {
    log: StdMutex<Vec<String>>,
}

impl RecordingCommandSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<String> {
        self.log.lock().expect("recording sink poisoned").clone()
    }
}

#[async_trait]
impl CommandSink for RecordingCommandSink {
    async fn send(&self, line: &str) -> Result<(), CommandSinkError> {
        self.log
            .lock()
            .expect("recording sink poisoned")
            .push(line.to_string());
        Ok(())
    }
}

/// Wraps any `AsyncWrite` (process stdin, a file) as a line-oriented
/// command sink, for manual or demo use. Uses an async mutex since the
/// write itself is held across an await point.
pub struct LineWriterCommandSink<W> {
    writer: AsyncMutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> LineWriterCommandSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: AsyncMutex::new(writer),
        }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> CommandSink for LineWriterCommandSink<W> {
    async fn send(&self, line: &str) -> Result<(), CommandSinkError> {
        let mut guard = self.writer.lock().await;
        let payload = format!("{line}\n");
        guard
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| {
                error!(error = %e, "command emission failed");
                CommandSinkError::Write(e.to_string())
            })
    }
}
