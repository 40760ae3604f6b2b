//! # Switchyard
//!
//! **Switchyard** is a dispatch-and-correlation engine. It routes work items to
//! ordered handler chains by path, processes batches under a configurable
//! failure policy, and pairs requests and responses that travel over message
//! queues with no ordering guarantees.
//!
//! ## Architecture
//!
//! - **[`router`]** - Exact and wildcard path patterns, global pre-middleware,
//!   NoRoute / NoMethod fallbacks
//! - **[`middleware`]** - Static and prefix path rewrites, tracing
//! - **[`dispatcher`]** - The [`Engine`]: lifecycle, panic recovery, [`RunMode`] batches
//! - **[`resolver`]** - Name@version handler lookup mounted as a route handler
//! - **[`wire`]** - Protobuf request/response envelopes and their base64 queue bodies
//! - **[`client`]** - [`CorrelationClient`]: async calls with timeout and cancellation
//! - **[`server`]** - [`QueueServer`]: the engine side of a queue
//! - **[`runtime_config`]** / **[`logging`]** - Environment-driven configuration
//!
//! ### Request flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Caller
//!     participant Client as CorrelationClient
//!     participant Q as QueueTransport
//!     participant Server as QueueServer
//!     participant Engine
//!     participant Router
//!
//!     Caller->>Client: call(ctx, path, payload)
//!     Client->>Q: send(requests, Request{correlation_id})
//!     Server->>Q: receive(requests)
//!     Server->>Engine: invoke_batch(items)
//!     Engine->>Router: dispatch(Context) per item
//!     Router-->>Engine: response / error
//!     Engine-->>Server: BatchOutcome
//!     Server->>Q: send(source_channel_id, Response)
//!     Client->>Q: receive(replies)
//!     Client-->>Caller: Response matched by correlation_id
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use switchyard::context::Context;
//! use switchyard::{Engine, EngineConfig, RouteHandler, Router, RunMode};
//!
//! let mut router = Router::new();
//! let upper: Arc<dyn RouteHandler> = Arc::new(|ctx: &mut Context| {
//!     ctx.response = ctx.request.to_uppercase();
//! });
//! router.handle("/v2/upper", [upper]);
//!
//! let config = EngineConfig::builder()
//!     .run_mode(RunMode::Partial)
//!     .prefix_link("/v1/", "/v2/")
//!     .build();
//! let engine = Engine::new(router, &config);
//! engine.start();
//!
//! assert_eq!(engine.call("/v1/upper", "abc").unwrap(), "ABC");
//! ```
//!
//! ## Logging
//!
//! All components log through `tracing`. Install a subscriber with
//! [`logging::init_logging`]; see that module for the `SWITCHYARD_LOG_*` variables.

pub mod client;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod resolver;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod wire;

pub use client::{CallContext, ClientError, CorrelationClient, MemoryQueue, QueueTransport};
pub use dispatcher::{BatchOutcome, Engine, RunMode};
pub use error::{ConfigError, EngineError};
pub use ids::CorrelationId;
pub use router::{RouteHandler, Router};
pub use runtime_config::{ClientConfig, EngineConfig, ServerConfig};
pub use server::{QueueServer, ServerHandle};
pub use wire::{Request, Response};
