use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::BuyEvent;

/// Event source error type
#[derive(Error, Debug)]
pub enum EventSourceError {
    #[error("Subscription error: {0}")]
    SubscriptionError(String),

    #[error("Source exhausted")]
    Exhausted,
}

/// Normalized buy event feed.
///
/// The core is agnostic to how events are discovered - webhook push,
/// RPC polling, or replay all arrive through the same channel. The
/// source closes the channel when it is done or shutting down.
#[async_trait]
pub trait EventSourcePort: Send + Sync {
    /// Start the feed and return its receiving end
    async fn subscribe(&self) -> Result<mpsc::Receiver<BuyEvent>, EventSourceError>;
}
