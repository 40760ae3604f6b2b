use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::context::CallContext;
use super::transport::{InboundMessage, QueueTransport, TransportError};
use crate::ids::CorrelationId;
use crate::runtime_config::ClientConfig;
use crate::wire::{self, Request, Response};

type PendingTable = DashMap<CorrelationId, oneshot::Sender<Response>>;

/// Completion callback for [`CorrelationClient::call_async`].
pub type CallCallback = Box<dyn FnOnce(Result<Response, ClientError>) + Send + 'static>;

/// Correlation client error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No response arrived within the effective timeout
    Timeout(Duration),
    /// The caller cancelled the call
    Cancelled,
    /// The request could not be handed to the transport
    Send(TransportError),
    /// The client has no inbound channel and cannot wait for responses
    NoInboundChannel,
    /// The client was closed before a response arrived
    Closed,
}

impl ClientError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Timeout(after) => {
                write!(f, "timed out waiting for response after {}ms", after.as_millis())
            }
            ClientError::Cancelled => write!(f, "call cancelled"),
            ClientError::Send(e) => write!(f, "send request: {e}"),
            ClientError::NoInboundChannel => {
                write!(f, "client has no inbound channel configured")
            }
            ClientError::Closed => write!(f, "client is closed"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Send(e) => Some(e),
            _ => None,
        }
    }
}

/// Counters for the correlation client.
///
/// `unmatched` counts responses that found no waiting caller, typically late
/// arrivals after a timeout.
#[derive(Debug, Default)]
pub struct ClientMetrics {
    sent: AtomicU64,
    send_failures: AtomicU64,
    delivered: AtomicU64,
    timed_out: AtomicU64,
    cancelled: AtomicU64,
    unmatched: AtomicU64,
    decode_failures: AtomicU64,
    receive_errors: AtomicU64,
}

impl ClientMetrics {
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn unmatched(&self) -> u64 {
        self.unmatched.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn receive_errors(&self) -> u64 {
        self.receive_errors.load(Ordering::Relaxed)
    }
}

/// Removes the caller's slot from the pending table on every exit path,
/// including the call future being dropped.
struct PendingSlot<'a> {
    pending: &'a PendingTable,
    id: CorrelationId,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

struct Inner {
    config: ClientConfig,
    transport: Arc<dyn QueueTransport>,
    pending: Arc<PendingTable>,
    metrics: Arc<ClientMetrics>,
    stop_tx: watch::Sender<bool>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Sends requests over a queue and matches responses back by correlation id.
///
/// Cheap to clone; clones share the pending table and the listener.
#[derive(Clone)]
pub struct CorrelationClient {
    inner: Arc<Inner>,
}

impl CorrelationClient {
    /// Build a client. When `config.inbound_channel` is set, a background
    /// listener task is spawned on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime while an inbound channel is configured.
    #[must_use]
    pub fn new(config: ClientConfig, transport: Arc<dyn QueueTransport>) -> Self {
        let pending: Arc<PendingTable> = Arc::new(DashMap::new());
        let metrics = Arc::new(ClientMetrics::default());
        let (stop_tx, stop_rx) = watch::channel(false);

        let listener = config.inbound_channel.clone().map(|channel| {
            let listener = Listener {
                transport: Arc::clone(&transport),
                channel,
                batch_size: config.poll_batch_size,
                wait: config.poll_wait,
                backoff: config.retry_backoff,
                pending: Arc::clone(&pending),
                metrics: Arc::clone(&metrics),
            };
            tokio::spawn(listener.run(stop_rx))
        });

        info!(
            outbound_channel = %config.outbound_channel,
            inbound_channel = ?config.inbound_channel,
            default_timeout_ms = config.default_timeout.as_millis() as u64,
            listener = listener.is_some(),
            "Correlation client created"
        );

        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                pending,
                metrics,
                stop_tx,
                listener: Mutex::new(listener),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn metrics(&self) -> &ClientMetrics {
        &self.inner.metrics
    }

    /// Calls currently waiting for a response
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.pending.len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.inner.stop_tx.borrow()
    }

    /// Send a request without waiting for a response. Works on send-only clients.
    pub async fn send(&self, path: &str, payload: &str) -> Result<CorrelationId, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        let id = CorrelationId::new();
        self.send_request(id, path, payload).await?;
        Ok(id)
    }

    /// Send a request and wait for its response.
    ///
    /// Waits until the response arrives, the effective timeout elapses (the
    /// context's deadline, else the configured default), or the context is
    /// cancelled, whichever comes first.
    pub async fn call(
        &self,
        ctx: &CallContext,
        path: &str,
        payload: &str,
    ) -> Result<Response, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        if self.inner.config.inbound_channel.is_none() {
            return Err(ClientError::NoInboundChannel);
        }

        let started = Instant::now();
        let deadline = ctx
            .deadline()
            .unwrap_or_else(|| started + self.inner.config.default_timeout);

        let id = CorrelationId::new();
        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(id, tx);
        let _slot = PendingSlot {
            pending: self.inner.pending.as_ref(),
            id,
        };

        // A stalled transport is bounded by the same deadline and cancellation
        tokio::select! {
            sent = self.send_request(id, path, payload) => sent?,
            _ = tokio::time::sleep_until(deadline) => {
                return Err(self.timed_out(id, path, started, deadline));
            }
            _ = ctx.cancelled() => return Err(self.cancelled(id, path)),
            () = self.closed() => return Err(ClientError::Closed),
        }

        tokio::select! {
            delivered = rx => match delivered {
                Ok(response) => {
                    debug!(
                        correlation_id = %id,
                        path = %path,
                        latency_ms = started.elapsed().as_millis() as u64,
                        "Response matched"
                    );
                    Ok(response)
                }
                Err(_) => Err(ClientError::Closed),
            },
            _ = tokio::time::sleep_until(deadline) => {
                Err(self.timed_out(id, path, started, deadline))
            }
            _ = ctx.cancelled() => Err(self.cancelled(id, path)),
            // close() may have cleared the table before this slot was inserted
            () = self.closed() => Err(ClientError::Closed),
        }
    }

    fn timed_out(
        &self,
        id: CorrelationId,
        path: &str,
        started: Instant,
        deadline: Instant,
    ) -> ClientError {
        ClientMetrics::incr(&self.inner.metrics.timed_out);
        let waited = deadline.saturating_duration_since(started);
        warn!(
            correlation_id = %id,
            path = %path,
            timeout_ms = waited.as_millis() as u64,
            "Call timed out"
        );
        ClientError::Timeout(waited)
    }

    fn cancelled(&self, id: CorrelationId, path: &str) -> ClientError {
        ClientMetrics::incr(&self.inner.metrics.cancelled);
        debug!(correlation_id = %id, path = %path, "Call cancelled");
        ClientError::Cancelled
    }

    /// Resolves once [`close`](Self::close) has been called.
    async fn closed(&self) {
        let mut stop = self.inner.stop_tx.subscribe();
        let _closed = stop.wait_for(|closed| *closed).await;
    }

    /// Run [`call`](Self::call) on its own task and hand the result to `callback`.
    /// A `None` callback discards the result.
    pub fn call_async(
        &self,
        ctx: CallContext,
        path: impl Into<String>,
        payload: impl Into<String>,
        callback: Option<CallCallback>,
    ) -> JoinHandle<()> {
        let client = self.clone();
        let path = path.into();
        let payload = payload.into();
        tokio::spawn(async move {
            let result = client.call(&ctx, &path, &payload).await;
            if let Some(callback) = callback {
                callback(result);
            }
        })
    }

    /// Stop the listener and wait for it to exit. Calls still waiting fail with
    /// [`ClientError::Closed`]. Idempotent.
    pub async fn close(&self) {
        self.inner.stop_tx.send_replace(true);
        let handle = self.inner.listener.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Correlation listener exited abnormally");
            }
        }
        self.inner.pending.clear();
        info!(outbound_channel = %self.inner.config.outbound_channel, "Correlation client closed");
    }

    async fn send_request(
        &self,
        id: CorrelationId,
        path: &str,
        payload: &str,
    ) -> Result<(), ClientError> {
        let config = &self.inner.config;
        let mut request = Request::new(path, payload).with_correlation_id(id);
        request.source_channel_id = config.inbound_channel.clone().unwrap_or_default();
        request.destination_channel_id = config.outbound_channel.clone();

        match self
            .inner
            .transport
            .send(&config.outbound_channel, wire::encode_body(&request))
            .await
        {
            Ok(()) => {
                ClientMetrics::incr(&self.inner.metrics.sent);
                debug!(correlation_id = %id, path = %path, "Request sent");
                Ok(())
            }
            Err(e) => {
                ClientMetrics::incr(&self.inner.metrics.send_failures);
                warn!(
                    correlation_id = %id,
                    channel = %config.outbound_channel,
                    error = %e,
                    "Failed to send request"
                );
                Err(ClientError::Send(e))
            }
        }
    }
}

/// Background task draining the inbound channel into the pending table.
struct Listener {
    transport: Arc<dyn QueueTransport>,
    channel: String,
    batch_size: usize,
    wait: Duration,
    backoff: Duration,
    pending: Arc<PendingTable>,
    metrics: Arc<ClientMetrics>,
}

impl Listener {
    async fn run(self, mut stop: watch::Receiver<bool>) {
        info!(channel = %self.channel, "Correlation listener started");
        loop {
            if *stop.borrow() {
                break;
            }
            let received = tokio::select! {
                biased;
                // Fires on stop, or when the client is dropped
                _ = stop.changed() => break,
                received = self.transport.receive(&self.channel, self.batch_size, self.wait) => received,
            };

            match received {
                Ok(messages) => {
                    for message in messages {
                        self.handle(message).await;
                    }
                }
                Err(e) => {
                    ClientMetrics::incr(&self.metrics.receive_errors);
                    warn!(
                        channel = %self.channel,
                        error = %e,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "Receive failed, retrying"
                    );
                    tokio::select! {
                        _ = stop.changed() => break,
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                }
            }
        }
        info!(channel = %self.channel, "Correlation listener stopped");
    }

    async fn handle(&self, message: InboundMessage) {
        match wire::decode_body::<Response>(&message.body) {
            Ok(response) => self.deliver(response),
            Err(e) => {
                ClientMetrics::incr(&self.metrics.decode_failures);
                warn!(channel = %self.channel, error = %e, "Discarding undecodable response");
            }
        }

        if let Err(e) = self.transport.ack(&self.channel, &message.receipt).await {
            warn!(
                channel = %self.channel,
                receipt = %message.receipt,
                error = %e,
                "Failed to acknowledge response"
            );
        }
    }

    fn deliver(&self, response: Response) {
        let slot = CorrelationId::from_wire(&response.correlation_id)
            .and_then(|id| self.pending.remove(&id));

        match slot {
            Some((id, tx)) => {
                if tx.send(response).is_ok() {
                    ClientMetrics::incr(&self.metrics.delivered);
                    debug!(correlation_id = %id, "Response delivered");
                } else {
                    // Caller gave up between lookup and delivery
                    ClientMetrics::incr(&self.metrics.unmatched);
                    debug!(correlation_id = %id, "Caller no longer waiting");
                }
            }
            None => {
                ClientMetrics::incr(&self.metrics.unmatched);
                debug!(
                    correlation_id = %response.correlation_id,
                    "Discarding unmatched response"
                );
            }
        }
    }
}
