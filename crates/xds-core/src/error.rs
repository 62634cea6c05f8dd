//! Error types for xDS operations.
//!
//! This module provides [`XdsError`], the error type for every fallible
//! operation in the engine, and its conversion to the gRPC status a
//! session ends with.

/// Comprehensive error type for xDS operations.
///
/// Every variant except the informational ones is fatal to the session that
/// produced it. The [`tonic::Status`] conversion decides which exit status
/// the data plane observes.
///
/// # Example
///
/// ```rust
/// use xds_core::XdsError;
///
/// fn require_node(node_id: &str) -> Result<(), XdsError> {
///     if node_id.is_empty() {
///         return Err(XdsError::InvalidRequest {
///             reason: "first request must carry node.id".to_string(),
///         });
///     }
///     Ok(())
/// }
///
/// assert!(require_node("").is_err());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum XdsError {
    /// Malformed or unsupported type URL.
    #[error("invalid type URL: {type_url} - {reason}")]
    InvalidTypeUrl {
        /// The invalid type URL.
        type_url: String,
        /// Reason why the type URL is invalid.
        reason: String,
    },

    /// Malformed inbound request.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What was wrong with the request.
        reason: String,
    },

    /// A resource could not be marshaled.
    #[error("encoding error for {type_url}/{name}: {message}")]
    EncodingError {
        /// The type URL being encoded.
        type_url: String,
        /// The resource name.
        name: String,
        /// Error message.
        message: String,
    },

    /// A resource payload could not be unmarshaled for inspection.
    #[error("decoding error for {type_url}/{name}: {message}")]
    DecodingError {
        /// The type URL being decoded.
        type_url: String,
        /// The resource name.
        name: String,
        /// Error message.
        message: String,
    },

    /// The session identity is not (or no longer) allowed to stream.
    #[error("unauthorized node {node_id}: {reason}")]
    Unauthorized {
        /// The node that was refused.
        node_id: String,
        /// Reason given by the authorizer.
        reason: String,
    },

    /// The server is shedding sessions; the client should try another server.
    #[error("overloaded: {reason}")]
    Overloaded {
        /// Why the session was refused or drained.
        reason: String,
    },

    /// The snapshot source stopped delivering snapshots for the node.
    #[error("snapshot source closed for node {node_id}")]
    UpstreamClosed {
        /// The node whose snapshot source went away.
        node_id: String,
    },

    /// The inbound stream failed.
    #[error("transport error: {message}")]
    TransportError {
        /// Error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Unexpected internal error.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl XdsError {
    /// Create an internal error from any error type.
    pub fn internal<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a transport error from any error type.
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::TransportError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error was caused by the client rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            XdsError::InvalidTypeUrl { .. }
                | XdsError::InvalidRequest { .. }
                | XdsError::Unauthorized { .. }
        )
    }
}

impl XdsError {
    /// The status a session ends with when it fails with this error.
    pub fn to_status(&self) -> tonic::Status {
        match self {
            XdsError::InvalidTypeUrl { .. } | XdsError::InvalidRequest { .. } => {
                tonic::Status::invalid_argument(self.to_string())
            }
            XdsError::EncodingError { .. } | XdsError::DecodingError { .. } => {
                tonic::Status::unavailable(self.to_string())
            }
            XdsError::Unauthorized { .. } => tonic::Status::permission_denied(self.to_string()),
            XdsError::Overloaded { .. } => tonic::Status::resource_exhausted(format!(
                "{self}, please try another server"
            )),
            XdsError::UpstreamClosed { .. } => {
                tonic::Status::aborted(format!(
                    "{self}: stream terminated due to an irrecoverable error, please try again"
                ))
            }
            XdsError::TransportError { .. } => tonic::Status::unavailable(self.to_string()),
            XdsError::Internal { .. } => tonic::Status::internal(self.to_string()),
            XdsError::Configuration(_) => tonic::Status::invalid_argument(self.to_string()),
        }
    }
}

/// Convert to tonic::Status for gRPC responses.
impl From<XdsError> for tonic::Status {
    fn from(err: XdsError) -> Self {
        err.to_status()
    }
}
