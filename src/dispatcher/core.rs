//! Dispatcher core module - item processing and the RunMode batch loop.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::run_mode::RunMode;
use crate::context::Context;
use crate::error::EngineError;
use crate::middleware::{PrefixLink, StaticLink};
use crate::router::Router;
use crate::runtime_config::EngineConfig;
use crate::wire::{self, Request, Response};

/// Snapshot attached to item errors when debug mode is on.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic<'a> {
    pub raw_path: &'a str,
    pub path: &'a str,
    pub param_path: &'a str,
    pub request: &'a str,
    pub response: &'a str,
    pub error: &'a str,
}

/// Result of a batch invocation.
///
/// `responses` holds one entry per processed item, in item order. Items after a
/// Strict/Batch halt are absent. `error` is the RunMode verdict.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub responses: Vec<Response>,
    pub error: Option<EngineError>,
}

impl BatchOutcome {
    fn stopped() -> Self {
        Self {
            responses: Vec::new(),
            error: Some(EngineError::Stopped),
        }
    }

    /// Number of items that went through the router
    #[must_use]
    pub fn processed(&self) -> usize {
        self.responses.len()
    }

    /// Indices and responses of failed items, including those Partial mode does not surface.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &Response)> {
        self.responses
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_error())
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Vec<Response>, EngineError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.responses),
        }
    }
}

/// Dispatch engine: a [`Router`] plus lifecycle, panic recovery and the wire boundary.
///
/// The engine is created stopped. `invoke*` calls made while stopped return
/// [`EngineError::Stopped`] without touching the router.
pub struct Engine {
    router: Router,
    run_mode: RunMode,
    debug: bool,
    running: AtomicBool,
}

impl Engine {
    /// Build an engine. Link rewrites from `config` are installed ahead of the
    /// router's own middleware: static links first, then prefix links.
    #[must_use]
    pub fn new(mut router: Router, config: &EngineConfig) -> Self {
        let prefix = PrefixLink::new(&config.prefix_links);
        if !prefix.is_empty() {
            router.prepend_middleware(Arc::new(prefix));
        }
        let static_links = StaticLink::new(&config.static_links);
        if !static_links.is_empty() {
            router.prepend_middleware(Arc::new(static_links));
        }

        info!(
            run_mode = %config.run_mode,
            debug = config.debug,
            routes_count = router.len(),
            static_links = config.static_links.len(),
            prefix_links = config.prefix_links.len(),
            "Engine created"
        );

        Self {
            router,
            run_mode: config.run_mode,
            debug: config.debug,
            running: AtomicBool::new(false),
        }
    }

    pub fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            info!(run_mode = %self.run_mode, "Engine started");
        }
    }

    /// Stop accepting work. Calls already past the running check complete normally.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Engine stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Direct invocation: route `payload` to `path` and return the response payload.
    pub fn call(&self, path: &str, payload: &str) -> Result<String, EngineError> {
        if !self.is_running() {
            return Err(EngineError::Stopped);
        }
        let mut ctx = self.process(path, payload);
        match self.item_error(&mut ctx) {
            Some(message) => Err(EngineError::Item { index: 0, message }),
            None => Ok(ctx.response),
        }
    }

    /// Process one wire request. Always yields a response carrying the request's
    /// correlation id; failures are reported in `Response::error`.
    #[must_use]
    pub fn invoke(&self, request: &Request) -> Response {
        if !self.is_running() {
            return Response::failed(
                request.correlation_id.as_str(),
                EngineError::Stopped.to_string(),
            );
        }
        self.process_request(request)
    }

    /// Decode, process and encode a single serialized request.
    ///
    /// Malformed input produces an encoded error response; it is never fatal.
    #[must_use]
    pub fn invoke_bytes(&self, bytes: &[u8]) -> Vec<u8> {
        let response = match wire::decode::<Request>(bytes) {
            Ok(request) => self.invoke(&request),
            Err(e) => {
                warn!(error = %e, bytes = bytes.len(), "Failed to decode request");
                Response::failed("", EngineError::Decode(e).to_string())
            }
        };
        wire::encode(&response)
    }

    /// Process `items` in order under the engine's [`RunMode`].
    pub fn invoke_batch(&self, items: Vec<Request>) -> BatchOutcome {
        if !self.is_running() {
            warn!(items = items.len(), "Batch rejected - engine is stopped");
            return BatchOutcome::stopped();
        }

        let total = items.len();
        let batch_start = Instant::now();
        let mut outcome = BatchOutcome {
            responses: Vec::with_capacity(total),
            error: None,
        };

        for (index, item) in items.iter().enumerate() {
            let response = self.process_request(item);
            let failed = response.is_error();
            if failed {
                warn!(
                    index = index,
                    path = %item.path,
                    correlation_id = %item.correlation_id,
                    run_mode = %self.run_mode,
                    error = %response.error,
                    "Batch item failed"
                );
                if self.run_mode.surfaces_failure() {
                    outcome.error = Some(EngineError::Item {
                        index,
                        message: response.error.clone(),
                    });
                }
            }
            outcome.responses.push(response);

            if failed && !self.run_mode.continues_after_failure() {
                debug!(
                    index = index,
                    skipped = total - index - 1,
                    run_mode = %self.run_mode,
                    "Batch halted at first failure"
                );
                break;
            }
        }

        info!(
            items = total,
            processed = outcome.processed(),
            failed = outcome.failures().count(),
            run_mode = %self.run_mode,
            latency_ms = batch_start.elapsed().as_millis() as u64,
            "Batch complete"
        );
        outcome
    }

    fn process_request(&self, request: &Request) -> Response {
        let mut ctx = self.process(&request.path, &request.payload);
        match self.item_error(&mut ctx) {
            Some(message) => Response::failed(request.correlation_id.as_str(), message),
            None => Response::ok(request.correlation_id.as_str(), ctx.response),
        }
    }

    /// The single recovery boundary: one fresh context per item, panics become item errors.
    fn process(&self, path: &str, payload: &str) -> Context {
        let mut ctx = Context::new(path, payload).with_debug(self.debug);
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.router.dispatch(&mut ctx)));
        if let Err(panic) = result {
            let panic_message = panic_message(panic.as_ref());
            let backtrace = std::backtrace::Backtrace::capture();
            error!(
                raw_path = %ctx.raw_path(),
                path = %ctx.path,
                panic_message = %panic_message,
                backtrace = %backtrace,
                "Handler panicked - CRITICAL"
            );
            ctx.fail(format!("panic: {panic_message}"));
        }
        ctx
    }

    /// Take the item error, augmented with a diagnostic snapshot in debug mode.
    fn item_error(&self, ctx: &mut Context) -> Option<String> {
        let err = ctx.take_err()?;
        if !ctx.debug {
            return Some(err);
        }
        let diagnostic = Diagnostic {
            raw_path: ctx.raw_path(),
            path: &ctx.path,
            param_path: &ctx.param_path,
            request: &ctx.request,
            response: &ctx.response,
            error: &err,
        };
        match serde_json::to_string(&diagnostic) {
            Ok(snapshot) => {
                warn!(diagnostic = %snapshot, "Item failed (debug)");
                Some(format!("{err} [debug: {snapshot}]"))
            }
            Err(e) => {
                warn!(error = %e, "Failed to serialize diagnostic snapshot");
                Some(err)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        format!("{panic:?}")
    }
}
