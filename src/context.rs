//! Per-item dispatch state.
//!
//! A [`Context`] is created fresh for every item the engine processes, handed by
//! `&mut` to each handler in the chain, and dropped once the item's response has
//! been read out of it. Nothing else holds a reference to it while it is live.

/// Mutable request state threaded through the router.
///
/// Once [`Context::abort`] has been called or an error has been recorded, the
/// router runs no further handler for this item.
#[derive(Debug, Clone, Default)]
pub struct Context {
    raw_path: String,
    /// Routing path. Rewrite middleware replaces it before matching.
    pub path: String,
    /// Wildcard capture of the matched route (`"/"` + remainder), empty for exact routes.
    pub param_path: String,
    pub request: String,
    pub response: String,
    err: Option<String>,
    pub debug: bool,
    aborted: bool,
}

impl Context {
    #[must_use]
    pub fn new(path: impl Into<String>, request: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            raw_path: path.clone(),
            path,
            request: request.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The path the item arrived with, before any rewrite.
    #[inline]
    #[must_use]
    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    /// Stop the chain without recording an error.
    #[inline]
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    #[inline]
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Record a failure. An empty message is ignored so that "no error" keeps a
    /// single representation.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !message.is_empty() {
            self.err = Some(message);
        }
    }

    #[inline]
    #[must_use]
    pub fn err(&self) -> Option<&str> {
        self.err.as_deref()
    }

    pub fn take_err(&mut self) -> Option<String> {
        self.err.take()
    }

    /// True when no further handler may run.
    #[inline]
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.aborted || self.err.is_some()
    }
}
