use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// A message taken off a channel, awaiting acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Handle used to acknowledge (delete) this delivery
    pub receipt: String,
    /// Base64-encoded wire message
    pub body: String,
}

/// Transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The named channel does not exist
    ChannelNotFound(String),
    /// Temporary failure; callers retry after a pause
    Unavailable(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ChannelNotFound(channel) => write!(f, "channel not found: {channel}"),
            TransportError::Unavailable(reason) => write!(f, "transport unavailable: {reason}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Queue-style transport: no ordering and no request/response pairing guarantees.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Enqueue `body` on `channel`.
    async fn send(&self, channel: &str, body: String) -> Result<(), TransportError>;

    /// Long-poll `channel` for up to `max_messages`, waiting at most `wait`.
    /// An empty batch means the wait elapsed with nothing to deliver.
    async fn receive(
        &self,
        channel: &str,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<InboundMessage>, TransportError>;

    /// Acknowledge a delivery so it is not redelivered.
    async fn ack(&self, channel: &str, receipt: &str) -> Result<(), TransportError>;
}
