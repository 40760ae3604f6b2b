//! # Client Module
//!
//! The [`CorrelationClient`] is the asynchronous caller side of the engine. It
//! sends requests over a queue and pairs each response that comes back with
//! the call that is waiting for it.
//!
//! ## Call flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller
//!     participant Client as CorrelationClient
//!     participant Pending as Pending table
//!     participant Queue as QueueTransport
//!     participant Listener
//!
//!     Caller->>Client: call(ctx, path, payload)
//!     Client->>Pending: insert(correlation_id, slot)
//!     Client->>Queue: send(outbound, Request)
//!     Listener->>Queue: receive(inbound, batch, long poll)
//!     Queue-->>Listener: Response{correlation_id}
//!     Listener->>Pending: remove(correlation_id)
//!     Listener->>Client: deliver on slot
//!     Listener->>Queue: ack(receipt)
//!     Client-->>Caller: Response
//! ```
//!
//! Queue transports give no ordering and no request/response pairing. The
//! correlation id is what makes concurrent calls independent: a response is
//! matched by id, never by arrival order.
//!
//! ## Guarantees
//!
//! - The pending entry is removed when `call` returns, whatever the outcome,
//!   and also when the call future is dropped. The table cannot grow unbounded.
//! - The deadline, cancellation and `close` bound the whole call, including a
//!   transport send that never completes.
//! - Responses with no waiting caller (late arrivals after a timeout) are
//!   acknowledged, discarded and counted in [`ClientMetrics::unmatched`].
//! - [`CorrelationClient::close`] returns only after the listener task has
//!   exited, so no message is mid-processing afterwards.
//!
//! A client without an inbound channel runs no listener and is send-only:
//! [`CorrelationClient::send`] works, [`CorrelationClient::call`] returns
//! [`ClientError::NoInboundChannel`].

mod context;
mod core;
mod memory;
mod transport;

pub use context::{CallContext, CancelHandle};
pub use core::{CallCallback, ClientError, ClientMetrics, CorrelationClient};
pub use memory::MemoryQueue;
pub use transport::{InboundMessage, QueueTransport, TransportError};
