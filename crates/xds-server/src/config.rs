//! Server configuration.

use std::time::Duration;

use xds_core::{ResourceType, TypeMap};

/// Smallest outbound channel a session runs with: one unacknowledged
/// response per type plus the final status.
pub const MIN_RESPONSE_BUFFER: usize = ResourceType::COUNT + 1;

/// Configuration for the xDS server.
///
/// Every session gets its own copy of the relevant settings at start; none
/// of them are process globals.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Capacity of each session's outbound response channel, at least
    /// [`MIN_RESPONSE_BUFFER`].
    pub response_buffer_size: usize,
    /// Capacity of each session's inbound request queue.
    pub inbound_queue_size: usize,
    /// How often an idle session re-checks authorization.
    pub reauth_interval: Duration,
    /// Resend children after their parent update is acknowledged.
    pub child_resend: bool,
    /// Types that get one empty response when the client subscribes and
    /// there is nothing to send.
    pub allow_empty: TypeMap<bool>,
    /// Maximum concurrent sessions, unlimited if `None`.
    pub max_sessions: Option<usize>,
    /// How long shutdown waits for sessions to finish.
    pub grace_period: Duration,
    /// Identifier reported in every response's `control_plane` field.
    pub control_plane_id: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            response_buffer_size: 16,
            inbound_queue_size: 16,
            reauth_interval: Duration::from_secs(5 * 60),
            child_resend: true,
            allow_empty: default_allow_empty(),
            max_sessions: None,
            grace_period: Duration::from_secs(30),
            control_plane_id: None,
        }
    }
}

/// Listeners and clusters are confirmed empty; Envoy waits for both during
/// initialization.
pub fn default_allow_empty() -> TypeMap<bool> {
    TypeMap::from_fn(|kind| matches!(kind, ResourceType::Listener | ResourceType::Cluster))
}
