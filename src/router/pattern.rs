/// Marker that turns a pattern into a wildcard route.
pub const WILDCARD_SUFFIX: char = '*';

/// A compiled route pattern.
///
/// `"/orders"` matches only `"/orders"`. `"/orders/*"` matches every path under
/// `"/orders/"` and captures the remainder with a leading slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    Exact(String),
    Wildcard {
        pattern: String,
        /// Pattern without the wildcard marker, always ending in `/`
        prefix: String,
    },
}

impl RoutePattern {
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix(WILDCARD_SUFFIX) {
            Some(stem) => {
                let mut prefix = stem.to_owned();
                if !prefix.ends_with('/') {
                    prefix.push('/');
                }
                RoutePattern::Wildcard {
                    pattern: pattern.to_owned(),
                    prefix,
                }
            }
            None => RoutePattern::Exact(pattern.to_owned()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            RoutePattern::Exact(p) => p,
            RoutePattern::Wildcard { pattern, .. } => pattern,
        }
    }

    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, RoutePattern::Wildcard { .. })
    }

    /// Match `path`, returning the captured parameter on success.
    ///
    /// Exact patterns capture `""`; wildcard patterns capture `"/" + remainder`.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<String> {
        match self {
            RoutePattern::Exact(p) => (p == path).then(String::new),
            RoutePattern::Wildcard { prefix, .. } => {
                let rest = path.strip_prefix(prefix.as_str())?;
                let mut param = String::with_capacity(rest.len() + 1);
                param.push('/');
                param.push_str(rest);
                Some(param)
            }
        }
    }
}

/// Match `path` against a pattern string without registering it.
#[must_use]
pub fn match_pattern(pattern: &str, path: &str) -> Option<String> {
    RoutePattern::parse(pattern).matches(path)
}
