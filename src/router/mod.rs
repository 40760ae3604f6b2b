//! # Router Module
//!
//! Path matching and ordered handler chains for the dispatch engine.
//!
//! ## Overview
//!
//! The router owns four things:
//! - a global pre-middleware list, run in registration order before matching
//! - an ordered route table (pattern + handler chain), first match wins
//! - a NoRoute fallback chain, used when no pattern matches
//! - a NoMethod fallback chain, used when the matched route has no handlers
//!
//! ## Patterns
//!
//! - **Exact**: `"/orders"` matches only `"/orders"`; the captured parameter is empty.
//! - **Wildcard**: `"/orders/*"` matches any path starting with `"/orders/"`. The
//!   remainder is captured into [`Context::param_path`](crate::context::Context)
//!   with a leading slash (`"/orders/"` captures `"/"`).
//!
//! Registration order is significant: register `"/orders/archive/*"` before
//! `"/orders/*"` or the broader route shadows it.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use switchyard::context::Context;
//! use switchyard::router::{RouteHandler, Router};
//!
//! let mut router = Router::new();
//! let echo: Arc<dyn RouteHandler> = Arc::new(|ctx: &mut Context| {
//!     ctx.response = format!("{} {}", ctx.param_path, ctx.request);
//! });
//! router.handle("/echo/*", [echo]);
//!
//! let mut ctx = Context::new("/echo/a/b", "hi");
//! router.dispatch(&mut ctx);
//! assert_eq!(ctx.response, "/a/b hi");
//! ```
//!
//! ## Abort semantics
//!
//! Any handler may stop the chain with [`Context::abort`](crate::context::Context::abort)
//! or by recording an error. The router checks before every handler, so nothing
//! after the halting handler runs, including the route chain when a
//! pre-middleware halts.

mod core;
mod pattern;
#[cfg(test)]
mod tests;

pub use core::{HandlerChain, RouteHandler, Router, MAX_INLINE_HANDLERS};
pub use pattern::{match_pattern, RoutePattern, WILDCARD_SUFFIX};
