//! gRPC service implementations for xDS.
//!
//! Only the Aggregated Discovery Service is served, and only its delta
//! (incremental) stream.

pub mod ads;

use std::sync::Arc;

use xds_cache::ShardedCache;

use crate::auth::Authorizer;
use crate::config::ServerConfig;
use crate::limiter::SessionLimiter;
use crate::metrics::XdsMetrics;
use crate::shutdown::ShutdownController;

pub use ads::{AdsService, AggregatedDiscoveryService};

/// Shared state handed to every session.
#[derive(Debug, Clone)]
pub struct ServiceState {
    /// Snapshot source.
    pub cache: Arc<ShardedCache>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Session authorization.
    pub authorizer: Arc<dyn Authorizer>,
    /// Session admission.
    pub limiter: SessionLimiter,
    /// Shutdown coordination.
    pub shutdown: ShutdownController,
    /// Metrics collector.
    pub metrics: XdsMetrics,
}

impl ServiceState {
    /// Create new service state.
    pub fn new(
        cache: Arc<ShardedCache>,
        config: ServerConfig,
        authorizer: Arc<dyn Authorizer>,
        shutdown: ShutdownController,
    ) -> Self {
        let limiter = SessionLimiter::new(config.max_sessions);
        Self {
            cache,
            config: Arc::new(config),
            authorizer,
            limiter,
            shutdown,
            metrics: XdsMetrics::new(),
        }
    }
}
