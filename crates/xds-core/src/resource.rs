//! Resource trait for xDS resources.
//!
//! This module provides the [`Resource`] trait implemented by every payload
//! stored in a snapshot, and [`AnyResource`] for payloads that are already
//! marshaled.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::ResourceType;

/// Trait for xDS resources.
///
/// Implementations must marshal deterministically: the engine derives each
/// resource's version from the bytes returned by [`Resource::encode`], so two
/// values that encode identically are the same version.
///
/// # Example
///
/// ```rust
/// use xds_core::{Resource, ResourceType};
/// use prost_types::Any;
/// use std::any::Any as StdAny;
///
/// #[derive(Debug)]
/// struct MyCluster {
///     name: String,
/// }
///
/// impl Resource for MyCluster {
///     fn resource_type(&self) -> ResourceType {
///         ResourceType::Cluster
///     }
///
///     fn name(&self) -> &str {
///         &self.name
///     }
///
///     fn encode(&self) -> Result<Any, Box<dyn std::error::Error + Send + Sync>> {
///         Ok(Any {
///             type_url: self.resource_type().type_url().to_string(),
///             value: self.name.as_bytes().to_vec(),
///         })
///     }
///
///     fn as_any(&self) -> &dyn StdAny {
///         self
///     }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// The kind of this resource.
    fn resource_type(&self) -> ResourceType;

    /// Get the resource name.
    fn name(&self) -> &str;

    /// Encode the resource to a protobuf Any message.
    fn encode(&self) -> Result<prost_types::Any, Box<dyn std::error::Error + Send + Sync>>;

    /// Convert to Any for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Type alias for a boxed resource.
/// Uses Arc for efficient cloning and sharing across snapshots.
pub type BoxResource = Arc<dyn Resource>;

/// A wrapped Any message that implements Resource.
///
/// This allows storing already-marshaled protobuf Any messages as resources
/// without needing to decode them.
#[derive(Debug, Clone)]
pub struct AnyResource {
    resource_type: ResourceType,
    name: String,
    any: prost_types::Any,
}

impl AnyResource {
    /// Create a new AnyResource.
    #[must_use]
    pub fn new(resource_type: ResourceType, name: impl Into<String>, any: prost_types::Any) -> Self {
        Self {
            resource_type,
            name: name.into(),
            any,
        }
    }

    /// Create an AnyResource from raw message bytes, using the kind's type URL.
    #[must_use]
    pub fn from_bytes(resource_type: ResourceType, name: impl Into<String>, value: Vec<u8>) -> Self {
        Self::new(
            resource_type,
            name,
            prost_types::Any {
                type_url: resource_type.type_url().to_string(),
                value,
            },
        )
    }

    /// Get the inner Any message.
    #[must_use]
    pub fn inner(&self) -> &prost_types::Any {
        &self.any
    }

    /// Wrap into a shareable [`BoxResource`].
    #[must_use]
    pub fn boxed(self) -> BoxResource {
        Arc::new(self)
    }
}

impl Resource for AnyResource {
    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self) -> Result<prost_types::Any, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.any.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
