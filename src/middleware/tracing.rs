use tracing::info;

use crate::context::Context;
use crate::router::RouteHandler;

/// Pre-middleware that logs every item entering the router.
pub struct TracingMiddleware;

impl RouteHandler for TracingMiddleware {
    fn handle(&self, ctx: &mut Context) {
        info!(
            raw_path = %ctx.raw_path(),
            path = %ctx.path,
            request_bytes = ctx.request.len(),
            debug = ctx.debug,
            "Item entering router"
        );
    }
}
