//! Type URL handling for xDS resources.
//!
//! This module provides type URL constants and the raw wire identifier
//! carried by every delta request and response.

use std::fmt;

use crate::{ResourceType, XdsError, XdsResult};

/// Type URL wrapper for xDS resource types.
///
/// Type URLs identify the protobuf message type of xDS resources. Requests
/// may carry any string here; [`TypeUrl::resource_type`] resolves it to one
/// of the kinds the engine serves.
///
/// # Example
///
/// ```rust
/// use xds_core::{ResourceType, TypeUrl};
///
/// let cluster_type = TypeUrl::new(TypeUrl::CLUSTER);
/// assert_eq!(cluster_type.short_name(), "Cluster");
/// assert_eq!(cluster_type.resource_type().unwrap(), ResourceType::Cluster);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeUrl(String);

impl TypeUrl {
    /// Type URL for Cluster (CDS).
    pub const CLUSTER: &'static str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";

    /// Type URL for ClusterLoadAssignment (EDS).
    pub const ENDPOINT: &'static str =
        "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";

    /// Type URL for Listener (LDS).
    pub const LISTENER: &'static str = "type.googleapis.com/envoy.config.listener.v3.Listener";

    /// Type URL for RouteConfiguration (RDS).
    pub const ROUTE: &'static str =
        "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";

    /// Type URL for Secret (SDS).
    pub const SECRET: &'static str =
        "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.Secret";

    /// Type URL for the HTTP connection manager network filter.
    pub const HTTP_CONNECTION_MANAGER: &'static str = "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager";

    /// Create a new type URL from a string.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Get the type URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the short name from the type URL.
    ///
    /// For example, `type.googleapis.com/envoy.config.cluster.v3.Cluster`
    /// returns `Cluster`.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.0.rsplit('/').next().and_then(|s| s.rsplit('.').next()).unwrap_or(&self.0)
    }

    /// Check if this is a well-formed xDS type URL.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.0.starts_with("type.googleapis.com/")
    }

    /// Resolve this type URL to a served resource kind.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::InvalidTypeUrl`] if the URL is malformed or names
    /// a type the engine does not serve.
    pub fn resource_type(&self) -> XdsResult<ResourceType> {
        if !self.is_valid() {
            return Err(XdsError::InvalidTypeUrl {
                type_url: self.0.clone(),
                reason: "missing type.googleapis.com/ prefix".to_string(),
            });
        }
        ResourceType::from_type_url(&self.0).ok_or_else(|| XdsError::InvalidTypeUrl {
            type_url: self.0.clone(),
            reason: "unsupported resource type".to_string(),
        })
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TypeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TypeUrl {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TypeUrl {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<ResourceType> for TypeUrl {
    fn from(t: ResourceType) -> Self {
        Self(t.type_url().to_string())
    }
}

impl AsRef<str> for TypeUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
