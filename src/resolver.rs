//! # Resolver Module
//!
//! Business handlers are resolved by `(name, version)` through an injected
//! [`Resolver`] rather than a process-wide registry, so engines can be built
//! against fakes in tests.
//!
//! [`ResolveHandler`] is the route handler that bridges the router to a
//! resolver: mount it on a wildcard route and it reads
//! `/<name>/<version>/<route...>` from the captured parameter path.
//!
//! ```rust
//! use std::sync::Arc;
//! use switchyard::resolver::{BusinessHandler, HandlerError, HandlerRegistry, ResolveHandler};
//! use switchyard::router::Router;
//!
//! struct Upper;
//! impl BusinessHandler for Upper {
//!     fn invoke(&self, _route: &str, payload: &str) -> Result<String, HandlerError> {
//!         Ok(payload.to_uppercase())
//!     }
//! }
//!
//! let registry = Arc::new(HandlerRegistry::new());
//! registry.register("text", "v1", Arc::new(Upper));
//!
//! let mut router = Router::new();
//! router.handle("/svc/*", [ResolveHandler::shared(registry)]);
//! ```

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::context::Context;
use crate::router::RouteHandler;

/// Error returned by business logic. Its message becomes the item error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for HandlerError {}

/// A unit of business logic, invoked with `(route, payload) -> payload`.
pub trait BusinessHandler: Send + Sync {
    fn invoke(&self, route: &str, payload: &str) -> Result<String, HandlerError>;
}

/// Resolution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    NotFound { name: String, version: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound { name, version } => {
                write!(f, "handler not found: {name}@{version}")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Capability to look up a business handler by name and version.
pub trait Resolver: Send + Sync {
    fn resolve(&self, name: &str, version: &str) -> Result<Arc<dyn BusinessHandler>, ResolveError>;
}

/// Concurrent in-memory [`Resolver`].
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<(String, String), Arc<dyn BusinessHandler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same name and version.
    pub fn register(&self, name: &str, version: &str, handler: Arc<dyn BusinessHandler>) {
        let key = (name.to_string(), version.to_string());
        if self.handlers.insert(key, handler).is_some() {
            warn!(name = %name, version = %version, "Replaced existing business handler");
        } else {
            debug!(
                name = %name,
                version = %version,
                total_handlers = self.handlers.len(),
                "Business handler registered"
            );
        }
    }

    /// Remove a handler. Returns true if one was registered.
    pub fn unregister(&self, name: &str, version: &str) -> bool {
        self.handlers
            .remove(&(name.to_string(), version.to_string()))
            .is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Resolver for HandlerRegistry {
    fn resolve(&self, name: &str, version: &str) -> Result<Arc<dyn BusinessHandler>, ResolveError> {
        self.handlers
            .get(&(name.to_string(), version.to_string()))
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ResolveError::NotFound {
                name: name.to_string(),
                version: version.to_string(),
            })
    }
}

/// Route handler that resolves and invokes a business handler from the
/// wildcard capture `/<name>/<version>/<route...>`.
pub struct ResolveHandler {
    resolver: Arc<dyn Resolver>,
}

impl ResolveHandler {
    #[must_use]
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    /// Convenience for registering directly on a router.
    #[must_use]
    pub fn shared(resolver: Arc<dyn Resolver>) -> Arc<dyn RouteHandler> {
        Arc::new(Self::new(resolver))
    }
}

/// Split `/<name>/<version>/<route...>` into its parts. The route keeps its
/// leading slash and defaults to `"/"`.
fn split_target(param_path: &str) -> Option<(&str, &str, &str)> {
    let rest = param_path.strip_prefix('/')?;
    let (name, rest) = rest.split_once('/')?;
    let (version, route) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, "/"),
    };
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some((name, version, route))
}

impl RouteHandler for ResolveHandler {
    fn handle(&self, ctx: &mut Context) {
        let Some((name, version, route)) = split_target(&ctx.param_path) else {
            let message = format!("invalid handler path: {}", ctx.param_path);
            ctx.fail(message);
            return;
        };

        let handler = match self.resolver.resolve(name, version) {
            Ok(handler) => handler,
            Err(e) => {
                ctx.fail(e.to_string());
                return;
            }
        };

        debug!(name = %name, version = %version, route = %route, "Invoking business handler");
        match handler.invoke(route, &ctx.request) {
            Ok(payload) => ctx.response = payload,
            Err(e) => ctx.fail(e.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl BusinessHandler for Echo {
        fn invoke(&self, route: &str, payload: &str) -> Result<String, HandlerError> {
            if payload == "fail" {
                return Err(HandlerError::new("rejected"));
            }
            Ok(format!("{route}:{payload}"))
        }
    }

    fn ctx_with_param(param: &str, request: &str) -> Context {
        let mut ctx = Context::new(format!("/svc{param}"), request);
        ctx.param_path = param.to_string();
        ctx
    }

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("/orders/v1/create"), Some(("orders", "v1", "/create")));
        assert_eq!(split_target("/orders/v1"), Some(("orders", "v1", "/")));
        assert_eq!(split_target("/orders/v1/a/b"), Some(("orders", "v1", "/a/b")));
        assert_eq!(split_target("/orders"), None);
        assert_eq!(split_target("/"), None);
        assert_eq!(split_target("//v1"), None);
    }

    #[test]
    fn test_resolve_and_invoke() {
        let registry = Arc::new(HandlerRegistry::new());
        registry.register("orders", "v1", Arc::new(Echo));
        let handler = ResolveHandler::new(registry);

        let mut ctx = ctx_with_param("/orders/v1/create", "x");
        handler.handle(&mut ctx);
        assert_eq!(ctx.err(), None);
        assert_eq!(ctx.response, "/create:x");

        let mut ctx = ctx_with_param("/orders/v1/create", "fail");
        handler.handle(&mut ctx);
        assert_eq!(ctx.err(), Some("rejected"));
    }

    #[test]
    fn test_not_found_is_descriptive() {
        let handler = ResolveHandler::new(Arc::new(HandlerRegistry::new()));
        let mut ctx = ctx_with_param("/orders/v9/create", "x");
        handler.handle(&mut ctx);
        assert_eq!(ctx.err(), Some("handler not found: orders@v9"));

        let mut ctx = ctx_with_param("/orders", "x");
        handler.handle(&mut ctx);
        assert_eq!(ctx.err(), Some("invalid handler path: /orders"));
    }

    #[test]
    fn test_register_replace_and_unregister() {
        let registry = HandlerRegistry::new();
        registry.register("a", "1", Arc::new(Echo));
        registry.register("a", "1", Arc::new(Echo));
        assert_eq!(registry.len(), 1);
        assert!(registry.unregister("a", "1"));
        assert!(!registry.unregister("a", "1"));
        assert!(registry.is_empty());
    }
}
