//! # Server Module
//!
//! [`QueueServer`] connects an [`Engine`](crate::dispatcher::Engine) to a
//! [`QueueTransport`](crate::client::QueueTransport): it long-polls the request
//! channel, runs each received batch through
//! [`Engine::invoke_batch`](crate::dispatcher::Engine::invoke_batch) and sends
//! every processed item's response to the channel named in the request's
//! `source_channel_id`, falling back to the configured reply channel.
//!
//! Acknowledgement follows processing: items the engine processed are
//! acknowledged, items skipped after a Strict/Batch halt are not. Getting those
//! back relies on the transport redelivering unacknowledged messages, as
//! [`MemoryQueue::with_visibility_timeout`](crate::client::MemoryQueue::with_visibility_timeout)
//! does. Undecodable messages are acknowledged and dropped.
//!
//! While the engine is stopped the server does not receive at all, so pending
//! requests stay ready on the queue until [`Engine::start`](crate::dispatcher::Engine::start).

mod service;

pub use service::{QueueServer, ServerHandle, ServerMetrics};
