//! JSONL Event Source
//!
//! Replays normalized buy events from a JSON-lines file, one `BuyEvent`
//! per line. The production transport (webhook or polling normalizer)
//! lives outside this crate; this adapter keeps the host binary honest
//! and doubles as a replay harness for recorded feeds.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::domain::BuyEvent;
use crate::ports::event_source::{EventSourceError, EventSourcePort};

/// Channel depth between the reader task and the engine
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct JsonlEventSource {
    path: PathBuf,
}

impl JsonlEventSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl EventSourcePort for JsonlEventSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<BuyEvent>, EventSourceError> {
        let file = File::open(&self.path)
            .await
            .map_err(|e| EventSourceError::SubscriptionError(e.to_string()))?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let path = self.path.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(file).lines();
            let mut line_no = 0usize;
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        line_no += 1;
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<BuyEvent>(trimmed) {
                            Ok(event) => {
                                if tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                // Malformed events are skipped, not fatal
                                tracing::warn!(
                                    "Skipping malformed event at {}:{}: {}",
                                    path.display(),
                                    line_no,
                                    e
                                );
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("Event file read error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_replays_events_in_order() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"wallet":"W1","token_mint":"M1","tx_signature":"s1","amount_usd":10.0,"market_cap_at_buy":50000.0,"timestamp":1000}}"#
        )
        .unwrap();
        writeln!(
            file,
            r#"{{"wallet":"W2","token_mint":"M1","tx_signature":"s2","amount_usd":20.0,"market_cap_at_buy":51000.0,"timestamp":1005}}"#
        )
        .unwrap();

        let source = JsonlEventSource::new(file.path().to_path_buf());
        let mut rx = source.subscribe().await.unwrap();

        assert_eq!(rx.recv().await.unwrap().tx_signature, "s1");
        assert_eq!(rx.recv().await.unwrap().tx_signature, "s2");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_skips_malformed_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not json").unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"wallet":"W1","token_mint":"M1","tx_signature":"s1","amount_usd":10.0,"market_cap_at_buy":50000.0,"timestamp":1000}}"#
        )
        .unwrap();

        let source = JsonlEventSource::new(file.path().to_path_buf());
        let mut rx = source.subscribe().await.unwrap();

        assert_eq!(rx.recv().await.unwrap().tx_signature, "s1");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_subscription_error() {
        let source = JsonlEventSource::new(PathBuf::from("/nonexistent/feed.jsonl"));
        assert!(source.subscribe().await.is_err());
    }
}
