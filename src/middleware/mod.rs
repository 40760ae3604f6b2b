//! Pre-middleware shipped with the engine.
//!
//! - [`StaticLink`] / [`PrefixLink`]: path rewrites applied before matching.
//!   The engine installs them ahead of user middleware from [`EngineConfig`](crate::runtime_config::EngineConfig).
//! - [`TracingMiddleware`]: logs each item entering the router.

mod links;
mod tracing;

pub use links::{LinkRule, PrefixLink, StaticLink};
pub use tracing::TracingMiddleware;
