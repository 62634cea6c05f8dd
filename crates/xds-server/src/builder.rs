//! Server builder for configuring and creating the xDS server.

use std::sync::Arc;
use std::time::Duration;

use xds_cache::ShardedCache;
use xds_core::{ResourceType, XdsError, XdsResult};

use crate::auth::{AllowAll, Authorizer};
use crate::config::{ServerConfig, MIN_RESPONSE_BUFFER};
use crate::services::ServiceState;
use crate::shutdown::ShutdownController;
use crate::XdsServer;

/// Builder for creating an [`XdsServer`].
///
/// # Example
///
/// ```rust,ignore
/// use xds_server::XdsServerBuilder;
/// use xds_cache::ShardedCache;
/// use std::sync::Arc;
///
/// let cache = Arc::new(ShardedCache::new());
/// let server = XdsServerBuilder::new()
///     .cache(cache)
///     .max_sessions(1000)
///     .control_plane_id("cp-1")
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct XdsServerBuilder {
    cache: Option<Arc<ShardedCache>>,
    authorizer: Option<Arc<dyn Authorizer>>,
    shutdown: Option<ShutdownController>,
    config: ServerConfig,
}

impl XdsServerBuilder {
    /// Create a new server builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache to use.
    ///
    /// This is required.
    pub fn cache(mut self, cache: Arc<ShardedCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the authorizer. Defaults to [`AllowAll`].
    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = Some(authorizer);
        self
    }

    /// Share an existing shutdown controller.
    pub fn shutdown_controller(mut self, shutdown: ShutdownController) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the outbound response buffer per session.
    pub fn response_buffer_size(mut self, size: usize) -> Self {
        self.config.response_buffer_size = size;
        self
    }

    /// Set the inbound request queue per session.
    pub fn inbound_queue_size(mut self, size: usize) -> Self {
        self.config.inbound_queue_size = size;
        self
    }

    /// Set how often idle sessions re-check authorization.
    pub fn reauth_interval(mut self, interval: Duration) -> Self {
        self.config.reauth_interval = interval;
        self
    }

    /// Enable or disable resending children after a parent update.
    pub fn child_resend(mut self, enabled: bool) -> Self {
        self.config.child_resend = enabled;
        self
    }

    /// Choose whether `resource_type` gets a confirmed-empty response.
    pub fn allow_empty(mut self, resource_type: ResourceType, allowed: bool) -> Self {
        self.config.allow_empty[resource_type] = allowed;
        self
    }

    /// Cap concurrent sessions.
    pub fn max_sessions(mut self, max: usize) -> Self {
        self.config.max_sessions = Some(max);
        self
    }

    /// Set how long shutdown waits for sessions.
    pub fn grace_period(mut self, period: Duration) -> Self {
        self.config.grace_period = period;
        self
    }

    /// Set the identifier stamped on every response.
    pub fn control_plane_id(mut self, id: impl Into<String>) -> Self {
        self.config.control_plane_id = Some(id.into());
        self
    }

    /// Build the server.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No cache was provided
    /// - The response buffer cannot hold one response per type plus the
    ///   final status
    /// - The inbound queue size is zero
    /// - The re-authorization interval is zero
    pub fn build(self) -> XdsResult<XdsServer> {
        let cache = self
            .cache
            .ok_or_else(|| XdsError::Configuration("cache is required".into()))?;

        if self.config.response_buffer_size < MIN_RESPONSE_BUFFER {
            return Err(XdsError::Configuration(format!(
                "response buffer size must be at least {MIN_RESPONSE_BUFFER}"
            )));
        }
        if self.config.inbound_queue_size == 0 {
            return Err(XdsError::Configuration(
                "inbound queue size must be positive".into(),
            ));
        }
        if self.config.reauth_interval.is_zero() {
            return Err(XdsError::Configuration(
                "reauthorization interval must be positive".into(),
            ));
        }

        let authorizer = self.authorizer.unwrap_or_else(|| Arc::new(AllowAll));
        let shutdown = self.shutdown.unwrap_or_default();

        Ok(XdsServer {
            state: ServiceState::new(cache, self.config, authorizer, shutdown),
        })
    }
}
