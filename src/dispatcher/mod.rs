//! # Dispatcher Module
//!
//! The [`Engine`] wraps a [`Router`](crate::router::Router) with a lifecycle, a
//! panic-recovery boundary, the wire decode/encode step and the batch processor.
//!
//! ## Item processing
//!
//! Every item becomes a fresh [`Context`](crate::context::Context) that is run
//! through the router inside `catch_unwind`. A panicking handler turns into the
//! item error `"panic: <message>"`; nothing unwinds past the engine.
//!
//! ## Batches
//!
//! [`Engine::invoke_batch`] walks the items sequentially, in index order, and
//! applies the engine's [`RunMode`] when one fails:
//!
//! ```text
//! Strict / Batch : stop at the failure, return its error
//! Partial        : process everything, return success (failures stay in the responses)
//! Reentrant      : process everything, return the last failure's error
//! ```
//!
//! ## Lifecycle
//!
//! Engines start stopped. [`Engine::start`] and [`Engine::stop`] flip an atomic
//! flag that every `invoke*` call checks once on entry; a stop racing with an
//! in-flight call does not interrupt it.
//!
//! ```rust
//! use std::sync::Arc;
//! use switchyard::context::Context;
//! use switchyard::dispatcher::Engine;
//! use switchyard::router::{RouteHandler, Router};
//! use switchyard::runtime_config::EngineConfig;
//!
//! let mut router = Router::new();
//! let ping: Arc<dyn RouteHandler> = Arc::new(|ctx: &mut Context| ctx.response = "pong".into());
//! router.handle("/ping", [ping]);
//!
//! let engine = Engine::new(router, &EngineConfig::default());
//! assert!(engine.call("/ping", "").is_err());
//! engine.start();
//! assert_eq!(engine.call("/ping", "").unwrap(), "pong");
//! ```

mod core;
mod run_mode;

pub use core::{BatchOutcome, Diagnostic, Engine};
pub use run_mode::RunMode;
