//! In-process [`QueueTransport`] used by tests and local wiring.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use super::transport::{InboundMessage, QueueTransport, TransportError};

#[derive(Default)]
struct Channel {
    ready: Mutex<VecDeque<String>>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    notify: Notify,
}

struct InFlight {
    seq: u64,
    body: String,
    redeliver_at: Option<Instant>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned queue still holds valid strings
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Named in-memory channels with long-poll receive and receipt acknowledgement.
///
/// Received messages move to an in-flight set until acknowledged. Without a
/// visibility timeout they stay there; with one, a message not acknowledged in
/// time goes back to the ready queue and is delivered again under a new receipt.
#[derive(Default)]
pub struct MemoryQueue {
    channels: DashMap<String, Arc<Channel>>,
    next_receipt: AtomicU64,
    injected_failures: AtomicUsize,
    visibility_timeout: Option<Duration>,
}

impl MemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue with the given channels already declared.
    #[must_use]
    pub fn with_channels(names: &[&str]) -> Self {
        let queue = Self::new();
        for name in names {
            queue.create_channel(name);
        }
        queue
    }

    /// Redeliver messages left unacknowledged for `timeout` after receipt.
    #[must_use]
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = Some(timeout);
        self
    }

    /// Declare a channel. Declaring an existing channel is a no-op.
    pub fn create_channel(&self, name: &str) {
        self.channels.entry(name.to_string()).or_default();
    }

    /// Messages waiting to be received
    #[must_use]
    pub fn depth(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|ch| lock(&ch.ready).len())
            .unwrap_or(0)
    }

    /// Messages received but not yet acknowledged
    #[must_use]
    pub fn in_flight(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|ch| lock(&ch.in_flight).len())
            .unwrap_or(0)
    }

    /// Make the next `count` receive calls fail with [`TransportError::Unavailable`].
    pub fn fail_next_receives(&self, count: usize) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Enqueue without going through the async trait.
    pub fn push(&self, channel: &str, body: String) -> Result<(), TransportError> {
        let ch = self.channel(channel)?;
        lock(&ch.ready).push_back(body);
        ch.notify.notify_waiters();
        Ok(())
    }

    fn channel(&self, name: &str) -> Result<Arc<Channel>, TransportError> {
        self.channels
            .get(name)
            .map(|ch| Arc::clone(ch.value()))
            .ok_or_else(|| TransportError::ChannelNotFound(name.to_string()))
    }

    fn take_injected_failure(&self) -> bool {
        self.injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Take up to `max_messages` ready messages, first returning expired
    /// in-flight ones to the queue. Also yields the next pending redelivery time.
    fn take_batch(
        &self,
        name: &str,
        ch: &Channel,
        max_messages: usize,
    ) -> (Vec<InboundMessage>, Option<Instant>) {
        let mut ready = lock(&ch.ready);
        let mut in_flight = lock(&ch.in_flight);

        let now = Instant::now();
        let mut expired: Vec<(Instant, u64, String)> = Vec::new();
        in_flight.retain(|_, msg| match msg.redeliver_at {
            Some(at) if at <= now => {
                expired.push((at, msg.seq, std::mem::take(&mut msg.body)));
                false
            }
            _ => true,
        });
        if !expired.is_empty() {
            debug!(channel = %name, messages = expired.len(), "Memory queue redelivering");
            // Original receive order
            expired.sort_by_key(|(at, seq, _)| (*at, *seq));
            ready.extend(expired.into_iter().map(|(_, _, body)| body));
        }

        let count = max_messages.min(ready.len());
        let redeliver_at = self.visibility_timeout.map(|timeout| now + timeout);
        let mut batch = Vec::with_capacity(count);
        for body in ready.drain(..count) {
            let n = self.next_receipt.fetch_add(1, Ordering::Relaxed);
            let receipt = format!("{name}-{n}");
            in_flight.insert(
                receipt.clone(),
                InFlight {
                    seq: n,
                    body: body.clone(),
                    redeliver_at,
                },
            );
            batch.push(InboundMessage { receipt, body });
        }
        let next_redelivery = in_flight.values().filter_map(|msg| msg.redeliver_at).min();
        (batch, next_redelivery)
    }
}

#[async_trait]
impl QueueTransport for MemoryQueue {
    async fn send(&self, channel: &str, body: String) -> Result<(), TransportError> {
        self.push(channel, body)
    }

    async fn receive(
        &self,
        channel: &str,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<InboundMessage>, TransportError> {
        if self.take_injected_failure() {
            return Err(TransportError::Unavailable("injected failure".to_string()));
        }
        let ch = self.channel(channel)?;
        let deadline = Instant::now() + wait;
        loop {
            // Register for wakeups before checking so a concurrent push is not missed
            let notified = ch.notify.notified();
            let (batch, next_redelivery) = self.take_batch(channel, &ch, max_messages.max(1));
            if !batch.is_empty() {
                debug!(channel = %channel, messages = batch.len(), "Memory queue delivered batch");
                return Ok(batch);
            }
            let wake = next_redelivery.map_or(deadline, |at| at.min(deadline));
            if tokio::time::timeout_at(wake, notified).await.is_err() && wake >= deadline {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, channel: &str, receipt: &str) -> Result<(), TransportError> {
        let ch = self.channel(channel)?;
        lock(&ch.in_flight).remove(receipt);
        Ok(())
    }
}
