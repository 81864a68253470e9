//! Fault & lifecycle log channel.
//!
//! Every significant lifecycle event, per-batch parse summary and error is sent as a plain
//! `String`. Informational entries carry the [`INFO_PREFIX`] marker so that consumers can keep
//! them out of the user-facing error surface.

use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Marker prefix for purely informational entries.
pub const INFO_PREFIX: &str = "DEBUG:";

/// Classified view of a fault channel entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultEntry<'a> {
    /// Diagnostic entry, prefix and surrounding whitespace removed.
    Info(&'a str),
    /// User-facing error.
    Error(&'a str),
}

impl<'a> FaultEntry<'a> {
    pub fn parse(entry: &'a str) -> Self {
        match entry.strip_prefix(INFO_PREFIX) {
            Some(body) => FaultEntry::Info(body.trim()),
            None => FaultEntry::Error(entry),
        }
    }

    pub fn is_info(&self) -> bool {
        matches!(self, FaultEntry::Info(_))
    }
}

/// Producer handle for the bounded fault channel, cloned into every feed task.
///
/// Each entry is mirrored to `tracing` so that a log file captures the same lifecycle.
#[derive(Debug, Clone)]
pub struct FaultSender {
    tx: mpsc::Sender<String>,
}

impl FaultSender {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    /// Send an informational entry. Blocks while the channel is full.
    pub async fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        debug!(%message, "posmon info");
        self.send(format!("{INFO_PREFIX} {message}")).await;
    }

    /// Send a user-facing error entry. Blocks while the channel is full.
    pub async fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!(%message, "posmon fault");
        self.send(message.to_string()).await;
    }

    async fn send(&self, entry: String) {
        if self.tx.send(entry).await.is_err() {
            debug!("fault receiver dropped, discarding entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_entry_parse() {
        assert_eq!(
            FaultEntry::parse("DEBUG: Connecting to OKX public WebSocket"),
            FaultEntry::Info("Connecting to OKX public WebSocket")
        );
        assert_eq!(
            FaultEntry::parse("OKX error: Invalid sign"),
            FaultEntry::Error("OKX error: Invalid sign")
        );
        assert!(FaultEntry::parse("DEBUG:no space").is_info());
    }

    #[tokio::test]
    async fn test_fault_sender_prefixes_info_only() {
        let (tx, mut rx) = mpsc::channel(4);
        let faults = FaultSender::new(tx);

        faults.info("WebSocket connection established").await;
        faults.error("Authentication failed").await;

        assert_eq!(
            rx.recv().await.as_deref(),
            Some("DEBUG: WebSocket connection established")
        );
        assert_eq!(rx.recv().await.as_deref(), Some("Authentication failed"));
    }
}
