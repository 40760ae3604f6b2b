use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use super::{match_pattern, RouteHandler, RoutePattern, Router};
use crate::context::Context;

fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &str) -> Arc<dyn RouteHandler> {
    let log = Arc::clone(log);
    let name = name.to_string();
    Arc::new(move |_ctx: &mut Context| {
        log.lock().unwrap().push(name.clone());
    })
}

#[test]
fn test_exact_match() {
    assert_eq!(match_pattern("/orders", "/orders"), Some(String::new()));
    assert_eq!(match_pattern("/orders", "/orders/1"), None);
    assert_eq!(match_pattern("/", "/"), Some(String::new()));
}

#[test]
fn test_wildcard_match() {
    assert_eq!(match_pattern("/orders/*", "/orders/1"), Some("/1".into()));
    assert_eq!(match_pattern("/orders/*", "/orders/"), Some("/".into()));
    assert_eq!(match_pattern("/orders/*", "/orders"), None);
    assert_eq!(match_pattern("/orders/*", "/ordersx/1"), None);
}

#[test]
fn test_wildcard_prefix_normalized() {
    // A marker without a separator still matches on segment boundary
    let pattern = RoutePattern::parse("/orders*");
    assert_eq!(pattern.matches("/orders/a/b"), Some("/a/b".into()));
    assert_eq!(pattern.matches("/ordersx"), None);
    assert_eq!(match_pattern("/*", "/anything"), Some("/anything".into()));
}

#[test]
fn test_first_match_wins() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::new();
    router.handle("/a/b/*", [recorder(&log, "specific")]);
    router.handle("/a/*", [recorder(&log, "broad")]);

    let mut ctx = Context::new("/a/b/c", "");
    router.dispatch(&mut ctx);
    assert_eq!(*log.lock().unwrap(), vec!["specific"]);
    assert_eq!(ctx.param_path, "/c");

    let mut ctx = Context::new("/a/x", "");
    router.dispatch(&mut ctx);
    assert_eq!(*log.lock().unwrap(), vec!["specific", "broad"]);
    assert_eq!(ctx.param_path, "/x");
}

#[test]
fn test_exact_route_leaves_param_empty() {
    let mut router = Router::new();
    let h: Arc<dyn RouteHandler> = Arc::new(|_ctx: &mut Context| {});
    router.handle("/ping", [h]);
    let mut ctx = Context::new("/ping", "");
    router.dispatch(&mut ctx);
    assert!(ctx.err().is_none());
    assert_eq!(ctx.param_path, "");
}

#[test]
fn test_no_route_error() {
    let router = Router::new();
    let mut ctx = Context::new("/missing", "");
    router.dispatch(&mut ctx);
    assert_eq!(ctx.err(), Some("no route for path: /missing"));
}

#[test]
fn test_no_route_fallback_chain() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::new();
    router.no_route([recorder(&log, "fallback")]);
    let mut ctx = Context::new("/missing", "");
    router.dispatch(&mut ctx);
    assert!(ctx.err().is_none());
    assert_eq!(*log.lock().unwrap(), vec!["fallback"]);
}

#[test]
fn test_no_method_for_empty_route() {
    let mut router = Router::new();
    router.handle("/empty", Vec::<Arc<dyn RouteHandler>>::new());
    let mut ctx = Context::new("/empty", "");
    router.dispatch(&mut ctx);
    assert_eq!(ctx.err(), Some("no handler for path: /empty"));

    let log = Arc::new(Mutex::new(Vec::new()));
    router.no_method([recorder(&log, "no_method")]);
    let mut ctx = Context::new("/empty", "");
    router.dispatch(&mut ctx);
    assert!(ctx.err().is_none());
    assert_eq!(*log.lock().unwrap(), vec!["no_method"]);
}

#[test]
fn test_middleware_abort_stops_everything_after() {
    for abort_at in 0..4 {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut router = Router::new();
        for i in 0..4 {
            let log = Arc::clone(&log);
            router.add_middleware(Arc::new(move |ctx: &mut Context| {
                log.lock().unwrap().push(format!("mw{i}"));
                if i == abort_at {
                    ctx.abort();
                }
            }));
        }
        router.handle("/x", [recorder(&log, "route")]);

        let mut ctx = Context::new("/x", "");
        router.dispatch(&mut ctx);

        let expected: Vec<String> = (0..=abort_at).map(|i| format!("mw{i}")).collect();
        assert_eq!(*log.lock().unwrap(), expected, "abort at {abort_at}");
        assert!(ctx.err().is_none());
    }
}

#[test]
fn test_route_handler_error_stops_chain() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::new();
    let failing: Arc<dyn RouteHandler> = Arc::new(|ctx: &mut Context| ctx.fail("bad input"));
    router.handle(
        "/x",
        [recorder(&log, "first"), failing, recorder(&log, "never")],
    );
    let mut ctx = Context::new("/x", "");
    router.dispatch(&mut ctx);
    assert_eq!(*log.lock().unwrap(), vec!["first"]);
    assert_eq!(ctx.err(), Some("bad input"));
}

#[test]
fn test_middleware_rewrite_drives_matching() {
    let mut router = Router::new();
    router.add_middleware(Arc::new(|ctx: &mut Context| {
        ctx.path = "/v2/orders".to_string();
    }));
    let h: Arc<dyn RouteHandler> = Arc::new(|ctx: &mut Context| ctx.response = "v2".into());
    router.handle("/v2/orders", [h]);
    let mut ctx = Context::new("/orders", "");
    router.dispatch(&mut ctx);
    assert_eq!(ctx.response, "v2");
    assert_eq!(ctx.raw_path(), "/orders");
}

#[test]
fn test_route_patterns_in_order() {
    let mut router = Router::new();
    let h: Arc<dyn RouteHandler> = Arc::new(|_ctx: &mut Context| {});
    router.handle("/b", [Arc::clone(&h)]);
    router.handle("/a/*", [h]);
    assert_eq!(router.route_patterns(), vec!["/b", "/a/*"]);
    assert_eq!(router.len(), 2);
}

proptest! {
    #[test]
    fn prop_exact_pattern_matches_itself(p in "/[a-z0-9/]{0,24}") {
        prop_assert_eq!(match_pattern(&p, &p), Some(String::new()));
    }

    #[test]
    fn prop_wildcard_captures_remainder(p in "(/[a-z0-9]{1,6}){0,4}", s in "[a-z0-9/]{0,16}") {
        let pattern = format!("{p}/*");
        prop_assert_eq!(match_pattern(&pattern, &format!("{p}/{s}")), Some(format!("/{s}")));
        prop_assert_eq!(match_pattern(&pattern, &format!("{p}/")), Some("/".to_string()));
    }
}
