//! Router core module - hot path for item dispatch.
//!
//! Pre-middleware, pattern matching and the selected handler chain all run on the
//! calling thread, start to finish, against one [`Context`].

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, info, warn};

use super::pattern::RoutePattern;
use crate::context::Context;

/// Maximum number of handlers in a chain before heap allocation.
pub const MAX_INLINE_HANDLERS: usize = 8;

/// A unit of work in a router chain: pre-middleware, route handler or fallback.
///
/// Handlers signal failure by recording an error on the context
/// ([`Context::fail`]) or stop the chain with [`Context::abort`].
pub trait RouteHandler: Send + Sync {
    fn handle(&self, ctx: &mut Context);
}

impl<F> RouteHandler for F
where
    F: Fn(&mut Context) + Send + Sync,
{
    fn handle(&self, ctx: &mut Context) {
        self(ctx)
    }
}

/// Ordered handler list. Inline for the common short chain.
pub type HandlerChain = SmallVec<[Arc<dyn RouteHandler>; MAX_INLINE_HANDLERS]>;

#[derive(Clone)]
struct Route {
    pattern: RoutePattern,
    handlers: HandlerChain,
}

/// Pattern table plus ordered middleware and fallback chains.
///
/// Routes are tried in registration order and the first match wins, so more
/// specific patterns must be registered before broader ones.
#[derive(Clone, Default)]
pub struct Router {
    middlewares: HandlerChain,
    routes: Vec<Route>,
    no_route: HandlerChain,
    no_method: HandlerChain,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a global pre-middleware. Runs before matching, in registration order.
    pub fn add_middleware(&mut self, handler: Arc<dyn RouteHandler>) -> &mut Self {
        self.middlewares.push(handler);
        self
    }

    /// Insert a pre-middleware ahead of everything registered so far.
    pub(crate) fn prepend_middleware(&mut self, handler: Arc<dyn RouteHandler>) {
        self.middlewares.insert(0, handler);
    }

    /// Register a route. `pattern` is either exact or ends with `*` (wildcard).
    pub fn handle<I>(&mut self, pattern: &str, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn RouteHandler>>,
    {
        let route = Route {
            pattern: RoutePattern::parse(pattern),
            handlers: handlers.into_iter().collect(),
        };
        debug!(
            pattern = %pattern,
            wildcard = route.pattern.is_wildcard(),
            handlers = route.handlers.len(),
            position = self.routes.len(),
            "Route registered"
        );
        self.routes.push(route);
        self
    }

    /// Chain run when no pattern matches the path.
    pub fn no_route<I>(&mut self, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn RouteHandler>>,
    {
        self.no_route = handlers.into_iter().collect();
        self
    }

    /// Chain run when a pattern matches but the route carries no handlers.
    pub fn no_method<I>(&mut self, handlers: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn RouteHandler>>,
    {
        self.no_method = handlers.into_iter().collect();
        self
    }

    /// Number of registered routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered patterns in match order.
    #[must_use]
    pub fn route_patterns(&self) -> Vec<String> {
        self.routes
            .iter()
            .map(|r| r.pattern.as_str().to_owned())
            .collect()
    }

    /// Log the routing table at startup.
    pub fn dump_routes(&self) {
        info!(
            routes_count = self.routes.len(),
            middleware_count = self.middlewares.len(),
            routes = ?self.route_patterns(),
            "Routing table loaded"
        );
    }

    /// Find the first route matching `path`, returning its index and the wildcard capture.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(usize, String)> {
        self.routes
            .iter()
            .enumerate()
            .find_map(|(idx, route)| route.pattern.matches(path).map(|param| (idx, param)))
    }

    /// Run `ctx` through pre-middleware, matching and the selected chain.
    ///
    /// Does not recover panics; the engine's item wrapper does.
    pub fn dispatch(&self, ctx: &mut Context) {
        if !run_chain(&self.middlewares, ctx) {
            debug!(
                raw_path = %ctx.raw_path(),
                path = %ctx.path,
                "Pre-middleware halted dispatch"
            );
            return;
        }

        let Some((idx, param)) = self.match_path(&ctx.path) else {
            if self.no_route.is_empty() {
                warn!(path = %ctx.path, "No route matched");
                let message = format!("no route for path: {}", ctx.path);
                ctx.fail(message);
            } else {
                debug!(path = %ctx.path, "No route matched, running fallback chain");
                run_chain(&self.no_route, ctx);
            }
            return;
        };

        let route = &self.routes[idx];
        if route.pattern.is_wildcard() {
            ctx.param_path = param;
        }
        debug!(
            path = %ctx.path,
            route_pattern = %route.pattern.as_str(),
            param_path = %ctx.param_path,
            "Route matched"
        );

        if route.handlers.is_empty() {
            if self.no_method.is_empty() {
                let message = format!("no handler for path: {}", ctx.path);
                ctx.fail(message);
            } else {
                run_chain(&self.no_method, ctx);
            }
            return;
        }

        run_chain(&route.handlers, ctx);
    }
}

/// Run handlers in order until one halts the context. Returns false if halted.
fn run_chain(chain: &[Arc<dyn RouteHandler>], ctx: &mut Context) -> bool {
    for handler in chain {
        if ctx.is_halted() {
            return false;
        }
        handler.handle(ctx);
    }
    !ctx.is_halted()
}
