//! Prometheus metrics for delta sessions.
//!
//! This module provides the metrics for monitoring the xDS server:
//!
//! - Request, ACK, NACK and response counters per resource type
//! - Resources and removals per response
//! - Session gauge, outcome counters and duration histogram
//!
//! Metrics are recorded through the `metrics` facade; install any recorder
//! (for example a Prometheus exporter) to collect them.
//!
//! # Example
//!
//! ```rust,ignore
//! use xds_server::metrics::XdsMetrics;
//! use xds_core::ResourceType;
//!
//! let metrics = XdsMetrics::new();
//! metrics.record_request(ResourceType::Cluster);
//! metrics.record_response(ResourceType::Cluster, 3, 0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use xds_core::ResourceType;

/// Metrics for the xDS server.
///
/// Cheap to clone; clones share the session gauge.
#[derive(Debug, Clone)]
pub struct XdsMetrics {
    inner: Arc<XdsMetricsInner>,
}

#[derive(Debug)]
struct XdsMetricsInner {
    /// Sessions currently running.
    active_sessions: AtomicU64,
}

impl Default for XdsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl XdsMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(XdsMetricsInner {
                active_sessions: AtomicU64::new(0),
            }),
        }
    }

    /// Record an incoming request.
    pub fn record_request(&self, resource_type: ResourceType) {
        counter!("xds_delta_requests_total", "type" => resource_type.short_name()).increment(1);
    }

    /// Record an ACK.
    pub fn record_ack(&self, resource_type: ResourceType) {
        counter!("xds_delta_acks_total", "type" => resource_type.short_name()).increment(1);
    }

    /// Record a NACK.
    pub fn record_nack(&self, resource_type: ResourceType) {
        counter!("xds_delta_nacks_total", "type" => resource_type.short_name()).increment(1);
    }

    /// Record a response sent.
    pub fn record_response(&self, resource_type: ResourceType, resources: usize, removals: usize) {
        let kind = resource_type.short_name();
        counter!("xds_delta_responses_total", "type" => kind).increment(1);
        histogram!("xds_delta_response_resources", "type" => kind).record(resources as f64);
        histogram!("xds_delta_response_removals", "type" => kind).record(removals as f64);
    }

    /// Record children scheduled for resend after a parent update.
    pub fn record_child_resends(&self, child: ResourceType, count: usize) {
        counter!("xds_delta_child_resends_total", "type" => child.short_name())
            .increment(count as u64);
    }

    /// Record a session refused before it started.
    pub fn session_rejected(&self, reason: &'static str) {
        counter!("xds_delta_sessions_rejected_total", "reason" => reason).increment(1);
    }

    /// Record how a session ended, by gRPC status code name.
    pub fn session_ended(&self, status: &'static str) {
        counter!("xds_delta_sessions_ended_total", "status" => status).increment(1);
    }

    /// Record a session opened.
    pub fn session_opened(&self) {
        let count = self.inner.active_sessions.fetch_add(1, Ordering::Relaxed) + 1;
        counter!("xds_delta_sessions_opened_total").increment(1);
        gauge!("xds_delta_active_sessions").set(count as f64);
    }

    /// Record a session closed.
    pub fn session_closed(&self, duration: Duration) {
        let count = self.inner.active_sessions.fetch_sub(1, Ordering::Relaxed) - 1;
        gauge!("xds_delta_active_sessions").set(count as f64);
        histogram!("xds_delta_session_duration_seconds").record(duration.as_secs_f64());
    }

    /// Get the current number of active sessions.
    pub fn active_sessions(&self) -> u64 {
        self.inner.active_sessions.load(Ordering::Relaxed)
    }
}

/// Session duration tracker.
///
/// Counts the session as active until dropped, then records its duration.
#[derive(Debug)]
pub struct SessionTracker {
    start: Instant,
    metrics: XdsMetrics,
}

impl SessionTracker {
    /// Start tracking a session.
    pub fn new(metrics: XdsMetrics) -> Self {
        metrics.session_opened();
        Self {
            start: Instant::now(),
            metrics,
        }
    }
}

impl Drop for SessionTracker {
    fn drop(&mut self) {
        self.metrics.session_closed(self.start.elapsed());
    }
}
