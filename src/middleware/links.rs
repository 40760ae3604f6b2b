use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::context::Context;
use crate::error::ConfigError;
use crate::router::RouteHandler;

/// A `src -> dst` path rewrite rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LinkRule {
    pub src: String,
    pub dst: String,
}

impl LinkRule {
    #[must_use]
    pub fn new(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
        }
    }

    /// Parse a comma-separated `src=dst` list, keeping the written order.
    pub fn parse_list(value: &str) -> Result<Vec<LinkRule>, ConfigError> {
        value
            .split(',')
            .map(str::trim)
            .filter(|rule| !rule.is_empty())
            .map(|rule| match rule.split_once('=') {
                Some((src, dst)) if !src.trim().is_empty() => {
                    Ok(LinkRule::new(src.trim(), dst.trim()))
                }
                _ => Err(ConfigError::InvalidLink(rule.to_string())),
            })
            .collect()
    }
}

/// Replaces `ctx.path` wholesale when it is an exact key of the table.
#[derive(Debug, Clone, Default)]
pub struct StaticLink {
    links: HashMap<String, String>,
}

impl StaticLink {
    /// Build from rules. A later rule for the same `src` replaces an earlier one.
    #[must_use]
    pub fn new(rules: &[LinkRule]) -> Self {
        let links = rules
            .iter()
            .map(|r| (r.src.clone(), r.dst.clone()))
            .collect();
        Self { links }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    #[must_use]
    pub fn rewrite(&self, path: &str) -> Option<&str> {
        self.links.get(path).map(String::as_str)
    }
}

impl RouteHandler for StaticLink {
    fn handle(&self, ctx: &mut Context) {
        if let Some(dst) = self.rewrite(&ctx.path) {
            debug!(from = %ctx.path, to = %dst, "Static link rewrite");
            ctx.path = dst.to_owned();
        }
    }
}

/// Replaces the leading `src` segment of `ctx.path` with `dst`, keeping the rest.
///
/// Matching is by whole segments: `/api` matches `/api` and `/api/x` but not
/// `/apiary`. A `src` ending in `/` already carries its boundary.
/// Rules are tried in registration order and only the first match applies.
#[derive(Debug, Clone, Default)]
pub struct PrefixLink {
    rules: Vec<LinkRule>,
}

impl PrefixLink {
    #[must_use]
    pub fn new(rules: &[LinkRule]) -> Self {
        Self {
            rules: rules.to_vec(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    #[must_use]
    pub fn rewrite(&self, path: &str) -> Option<String> {
        self.rules.iter().find_map(|rule| {
            path.strip_prefix(rule.src.as_str())
                .filter(|rest| {
                    rest.is_empty() || rest.starts_with('/') || rule.src.ends_with('/')
                })
                .map(|rest| format!("{}{}", rule.dst, rest))
        })
    }
}

impl RouteHandler for PrefixLink {
    fn handle(&self, ctx: &mut Context) {
        if let Some(rewritten) = self.rewrite(&ctx.path) {
            debug!(from = %ctx.path, to = %rewritten, "Prefix link rewrite");
            ctx.path = rewritten;
        }
    }
}
