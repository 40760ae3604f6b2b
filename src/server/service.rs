use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::{InboundMessage, QueueTransport};
use crate::dispatcher::Engine;
use crate::runtime_config::ServerConfig;
use crate::wire::{self, Request};

/// Counters for the queue server loop.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    received: AtomicU64,
    decode_failures: AtomicU64,
    replied: AtomicU64,
    unprocessed: AtomicU64,
    receive_errors: AtomicU64,
}

impl ServerMetrics {
    fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    #[must_use]
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn replied(&self) -> u64 {
        self.replied.load(Ordering::Relaxed)
    }

    /// Items left unacknowledged because the batch halted before them or the
    /// engine stopped mid-batch
    #[must_use]
    pub fn unprocessed(&self) -> u64 {
        self.unprocessed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn receive_errors(&self) -> u64 {
        self.receive_errors.load(Ordering::Relaxed)
    }
}

/// Engine-side queue loop: receive requests, run them as one batch, reply.
pub struct QueueServer {
    engine: Arc<Engine>,
    transport: Arc<dyn QueueTransport>,
    config: ServerConfig,
    metrics: Arc<ServerMetrics>,
}

/// Handle to a running [`QueueServer`].
pub struct ServerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    metrics: Arc<ServerMetrics>,
}

impl ServerHandle {
    #[must_use]
    pub fn metrics(&self) -> &ServerMetrics {
        &self.metrics
    }

    /// Signal the loop to stop and wait until it has exited.
    pub async fn shutdown(self) {
        self.stop_tx.send_replace(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Queue server task failed");
        }
    }
}

impl QueueServer {
    #[must_use]
    pub fn new(
        engine: Arc<Engine>,
        transport: Arc<dyn QueueTransport>,
        config: ServerConfig,
    ) -> Self {
        Self {
            engine,
            transport,
            config,
            metrics: Arc::new(ServerMetrics::default()),
        }
    }

    /// Spawn the loop on the current tokio runtime.
    #[must_use]
    pub fn start(self) -> ServerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let metrics = Arc::clone(&self.metrics);
        let task = tokio::spawn(self.run(stop_rx));
        ServerHandle {
            stop_tx,
            task,
            metrics,
        }
    }

    async fn run(self, mut stop: watch::Receiver<bool>) {
        info!(
            request_channel = %self.config.request_channel,
            reply_channel = ?self.config.reply_channel,
            run_mode = %self.engine.run_mode(),
            "Queue server started"
        );
        let mut paused = false;
        loop {
            if *stop.borrow() {
                break;
            }
            // Leave requests on the queue while the engine rejects work
            if !self.engine.is_running() {
                if !paused {
                    info!(
                        request_channel = %self.config.request_channel,
                        "Engine stopped, pausing receive"
                    );
                    paused = true;
                }
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = tokio::time::sleep(self.config.retry_backoff) => {}
                }
                continue;
            }
            if paused {
                info!(
                    request_channel = %self.config.request_channel,
                    "Engine running, resuming receive"
                );
                paused = false;
            }
            let received = tokio::select! {
                biased;
                _ = stop.changed() => break,
                received = self.transport.receive(
                    &self.config.request_channel,
                    self.config.poll_batch_size,
                    self.config.poll_wait,
                ) => received,
            };

            match received {
                Ok(messages) if messages.is_empty() => {}
                Ok(messages) => self.process(messages).await,
                Err(e) => {
                    ServerMetrics::add(&self.metrics.receive_errors, 1);
                    warn!(
                        channel = %self.config.request_channel,
                        error = %e,
                        "Receive failed, retrying"
                    );
                    tokio::select! {
                        _ = stop.changed() => break,
                        _ = tokio::time::sleep(self.config.retry_backoff) => {}
                    }
                }
            }
        }
        info!(request_channel = %self.config.request_channel, "Queue server stopped");
    }

    async fn process(&self, messages: Vec<InboundMessage>) {
        ServerMetrics::add(&self.metrics.received, messages.len() as u64);

        let mut items: Vec<Request> = Vec::with_capacity(messages.len());
        let mut receipts: Vec<String> = Vec::with_capacity(messages.len());
        for message in messages {
            match wire::decode_body::<Request>(&message.body) {
                Ok(request) => {
                    items.push(request);
                    receipts.push(message.receipt);
                }
                Err(e) => {
                    // Nothing to reply to without a correlation id
                    ServerMetrics::add(&self.metrics.decode_failures, 1);
                    warn!(error = %e, receipt = %message.receipt, "Discarding undecodable request");
                    self.ack(&message.receipt).await;
                }
            }
        }
        if items.is_empty() {
            return;
        }

        let reply_to: Vec<Option<String>> = items
            .iter()
            .map(|r| {
                if r.source_channel_id.is_empty() {
                    self.config.reply_channel.clone()
                } else {
                    Some(r.source_channel_id.clone())
                }
            })
            .collect();

        // Handlers are synchronous; keep them off the async workers
        let engine = Arc::clone(&self.engine);
        let outcome = match tokio::task::spawn_blocking(move || engine.invoke_batch(items)).await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Batch task failed, leaving messages unacknowledged");
                return;
            }
        };

        if let Some(e) = &outcome.error {
            debug!(error = %e, processed = outcome.processed(), "Batch verdict");
        }

        let processed = outcome.processed();
        for ((response, reply), receipt) in outcome
            .responses
            .iter()
            .zip(&reply_to)
            .zip(&receipts)
        {
            match reply {
                Some(channel) => {
                    match self
                        .transport
                        .send(channel, wire::encode_body(response))
                        .await
                    {
                        Ok(()) => ServerMetrics::add(&self.metrics.replied, 1),
                        Err(e) => warn!(
                            channel = %channel,
                            correlation_id = %response.correlation_id,
                            error = %e,
                            "Failed to send reply"
                        ),
                    }
                }
                None => warn!(
                    correlation_id = %response.correlation_id,
                    "No reply channel for request, dropping response"
                ),
            }
            self.ack(receipt).await;
        }

        let unprocessed = receipts.len() - processed;
        if unprocessed > 0 {
            ServerMetrics::add(&self.metrics.unprocessed, unprocessed as u64);
            debug!(unprocessed = unprocessed, "Leaving unprocessed requests for redelivery");
        }
    }

    async fn ack(&self, receipt: &str) {
        if let Err(e) = self
            .transport
            .ack(&self.config.request_channel, receipt)
            .await
        {
            warn!(receipt = %receipt, error = %e, "Failed to acknowledge request");
        }
    }
}
