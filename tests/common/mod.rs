#![allow(dead_code)]

pub mod handlers {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use switchyard::context::Context;
    use switchyard::ids::CorrelationId;
    use switchyard::wire::Request;
    use switchyard::{RouteHandler, Router};

    /// Wrap a closure as a shareable route handler
    pub fn handler<F>(f: F) -> Arc<dyn RouteHandler>
    where
        F: Fn(&mut Context) + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    /// Router with a single `/item` route. The payload is the item index; items
    /// whose index is in `fail_at` fail with `"item <i> failed"`, the rest
    /// answer `"ok <i>"`. The counter records every item the handler saw.
    pub fn counting_router(fail_at: &[usize]) -> (Router, Arc<AtomicUsize>) {
        let seen = Arc::new(AtomicUsize::new(0));
        let fail_at = fail_at.to_vec();
        let counter = Arc::clone(&seen);
        let mut router = Router::new();
        router.handle(
            "/item",
            [handler(move |ctx: &mut Context| {
                counter.fetch_add(1, Ordering::SeqCst);
                let index: usize = ctx.request.parse().unwrap_or(usize::MAX);
                if fail_at.contains(&index) {
                    ctx.fail(format!("item {index} failed"));
                } else {
                    ctx.response = format!("ok {index}");
                }
            })],
        );
        (router, seen)
    }

    /// `count` requests to `/item` with payloads `"0".."count-1"`
    pub fn batch(count: usize) -> Vec<Request> {
        (0..count)
            .map(|i| Request::new("/item", i.to_string()).with_correlation_id(CorrelationId::new()))
            .collect()
    }

    pub fn seen(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}
