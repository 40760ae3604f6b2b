//! # Runtime Configuration Module
//!
//! Immutable configuration values for the engine, the correlation client and
//! the queue server. Each is built with a builder, loaded from environment
//! variables, or deserialized by whatever loader the host application uses.
//!
//! ## Environment Variables
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `SWITCHYARD_RUN_MODE` | `strict`, `partial`, `batch` or `reentrant` | `strict` |
//! | `SWITCHYARD_DEBUG` | attach diagnostic snapshots to item errors | `false` |
//! | `SWITCHYARD_STATIC_LINKS` | exact rewrites, `src=dst,src=dst` | none |
//! | `SWITCHYARD_PREFIX_LINKS` | prefix rewrites, first match wins | none |
//!
//! An unknown run mode is a startup error:
//!
//! ```rust
//! use switchyard::runtime_config::EngineConfig;
//! use switchyard::dispatcher::RunMode;
//!
//! let config = EngineConfig::builder()
//!     .run_mode(RunMode::Reentrant)
//!     .prefix_link("/v1", "/legacy")
//!     .build();
//! assert_eq!(config.run_mode, RunMode::Reentrant);
//! assert!("lenient".parse::<RunMode>().is_err());
//! ```

use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::dispatcher::RunMode;
use crate::error::ConfigError;
use crate::middleware::LinkRule;

/// Default wait for a single call when the caller sets no deadline.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
/// Default long-poll wait for a queue receive.
pub const DEFAULT_POLL_WAIT: Duration = Duration::from_secs(20);
/// Default number of messages fetched per receive.
pub const DEFAULT_POLL_BATCH_SIZE: usize = 10;
/// Pause after a failed receive before polling again.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub run_mode: RunMode,
    pub debug: bool,
    /// Exact path rewrites
    pub static_links: Vec<LinkRule>,
    /// Prefix rewrites, tried in order
    pub prefix_links: Vec<LinkRule>,
}

impl EngineConfig {
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = match env::var("SWITCHYARD_RUN_MODE") {
            Ok(value) => value.parse()?,
            Err(_) => RunMode::default(),
        };
        let debug = match env::var("SWITCHYARD_DEBUG") {
            Ok(value) => parse_bool("SWITCHYARD_DEBUG", &value)?,
            Err(_) => false,
        };
        let static_links = match env::var("SWITCHYARD_STATIC_LINKS") {
            Ok(value) => LinkRule::parse_list(&value)?,
            Err(_) => Vec::new(),
        };
        let prefix_links = match env::var("SWITCHYARD_PREFIX_LINKS") {
            Ok(value) => LinkRule::parse_list(&value)?,
            Err(_) => Vec::new(),
        };
        Ok(Self {
            run_mode,
            debug,
            static_links,
            prefix_links,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    #[must_use]
    pub fn run_mode(mut self, mode: RunMode) -> Self {
        self.config.run_mode = mode;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    #[must_use]
    pub fn static_link(mut self, src: impl Into<String>, dst: impl Into<String>) -> Self {
        self.config.static_links.push(LinkRule::new(src, dst));
        self
    }

    #[must_use]
    pub fn prefix_link(mut self, src: impl Into<String>, dst: impl Into<String>) -> Self {
        self.config.prefix_links.push(LinkRule::new(src, dst));
        self
    }

    #[must_use]
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

/// Correlation client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Channel requests are sent to
    pub outbound_channel: String,
    /// Channel responses arrive on. `None` makes the client send-only.
    pub inbound_channel: Option<String>,
    pub default_timeout: Duration,
    pub poll_batch_size: usize,
    pub poll_wait: Duration,
    pub retry_backoff: Duration,
}

impl ClientConfig {
    #[must_use]
    pub fn builder(outbound_channel: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig {
                outbound_channel: outbound_channel.into(),
                inbound_channel: None,
                default_timeout: DEFAULT_CALL_TIMEOUT,
                poll_batch_size: DEFAULT_POLL_BATCH_SIZE,
                poll_wait: DEFAULT_POLL_WAIT,
                retry_backoff: DEFAULT_RETRY_BACKOFF,
            },
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    #[must_use]
    pub fn inbound_channel(mut self, channel: impl Into<String>) -> Self {
        self.config.inbound_channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    #[must_use]
    pub fn poll_batch_size(mut self, size: usize) -> Self {
        self.config.poll_batch_size = size.max(1);
        self
    }

    #[must_use]
    pub fn poll_wait(mut self, wait: Duration) -> Self {
        self.config.poll_wait = wait;
        self
    }

    #[must_use]
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Queue server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Channel requests are consumed from
    pub request_channel: String,
    /// Reply channel for requests that carry no source channel
    pub reply_channel: Option<String>,
    pub poll_batch_size: usize,
    pub poll_wait: Duration,
    pub retry_backoff: Duration,
}

impl ServerConfig {
    #[must_use]
    pub fn builder(request_channel: impl Into<String>) -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: ServerConfig {
                request_channel: request_channel.into(),
                reply_channel: None,
                poll_batch_size: DEFAULT_POLL_BATCH_SIZE,
                poll_wait: DEFAULT_POLL_WAIT,
                retry_backoff: DEFAULT_RETRY_BACKOFF,
            },
        }
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    #[must_use]
    pub fn reply_channel(mut self, channel: impl Into<String>) -> Self {
        self.config.reply_channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn poll_batch_size(mut self, size: usize) -> Self {
        self.config.poll_batch_size = size.max(1);
        self
    }

    #[must_use]
    pub fn poll_wait(mut self, wait: Duration) -> Self {
        self.config.poll_wait = wait;
        self
    }

    #[must_use]
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    #[must_use]
    pub fn build(self) -> ServerConfig {
        self.config
    }
}
