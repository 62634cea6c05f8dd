//! Session authorization.
//!
//! Every session is authorized when it starts and again on every loop
//! iteration, so revoking a token ends streams that were already open.

use std::fmt;

use async_trait::async_trait;
use dashmap::DashSet;
use xds_core::{NodeHash, XdsError, XdsResult};

/// Who is on the other end of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Node ID from the first request.
    pub node_id: String,
    /// Hash of the node ID, the cache key.
    pub node_hash: NodeHash,
    /// Token from the `x-xds-token` metadata key, if any.
    pub token: Option<String>,
}

impl SessionIdentity {
    /// Build an identity for `node_id`.
    pub fn new(node_id: impl Into<String>, token: Option<String>) -> Self {
        let node_id = node_id.into();
        let node_hash = NodeHash::from_id(&node_id);
        Self {
            node_id,
            node_hash,
            token,
        }
    }
}

/// Decides whether a session may keep streaming.
#[async_trait]
pub trait Authorizer: Send + Sync + fmt::Debug + 'static {
    /// Check `identity`.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::Unauthorized`] to end the session.
    async fn authorize(&self, identity: &SessionIdentity) -> XdsResult<()>;
}

/// Lets every session through.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _identity: &SessionIdentity) -> XdsResult<()> {
        Ok(())
    }
}

/// Accepts sessions whose token is in a revocable set.
#[derive(Debug, Default)]
pub struct TokenAuthorizer {
    tokens: DashSet<String>,
}

impl TokenAuthorizer {
    /// Create an authorizer that accepts no token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` from now on.
    pub fn grant(&self, token: impl Into<String>) {
        self.tokens.insert(token.into());
    }

    /// Stop accepting `token`. Sessions using it end on their next check.
    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }
}

#[async_trait]
impl Authorizer for TokenAuthorizer {
    async fn authorize(&self, identity: &SessionIdentity) -> XdsResult<()> {
        let unauthorized = |reason: &str| XdsError::Unauthorized {
            node_id: identity.node_id.clone(),
            reason: reason.to_string(),
        };
        match identity.token.as_deref() {
            None => Err(unauthorized("missing token")),
            Some(token) if self.tokens.contains(token) => Ok(()),
            Some(_) => Err(unauthorized("token not recognized")),
        }
    }
}
