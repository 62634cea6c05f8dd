//! Content versions for snapshot resources.
//!
//! [`ResourceIndexer`] turns a [`Snapshot`] into a [`VersionMap`]: one
//! version per named resource, derived from the marshaled bytes. Two
//! resources that marshal identically get the same version no matter
//! which objects produced them, so change detection is purely content based.

use std::collections::HashMap;

use prost_types::Any;
use sha2::{Digest, Sha256};
use xds_core::{ResourceType, ResourceVersion, TypeMap, XdsError, XdsResult};

use crate::dependency::{ChildIndex, DependencyIndexer};
use crate::snapshot::{SharedSnapshot, Snapshot};

/// Per kind, resource name to content version.
pub type VersionMap = TypeMap<HashMap<String, ResourceVersion>>;

/// A snapshot together with everything derived from it.
///
/// Built once per snapshot and only read afterwards.
#[derive(Debug, Clone)]
pub struct IndexedSnapshot {
    snapshot: SharedSnapshot,
    versions: VersionMap,
    children: ChildIndex,
}

impl IndexedSnapshot {
    /// Index `snapshot`.
    ///
    /// # Errors
    ///
    /// Fails if any resource cannot be marshaled or any parent resource
    /// cannot be inspected for children.
    pub fn build(snapshot: SharedSnapshot) -> XdsResult<Self> {
        let versions = ResourceIndexer::compute(&snapshot)?;
        let children = DependencyIndexer::compute(&snapshot)?;
        Ok(Self {
            snapshot,
            versions,
            children,
        })
    }

    /// The indexed snapshot.
    #[inline]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Current versions of one kind.
    #[inline]
    pub fn versions(&self, resource_type: ResourceType) -> &HashMap<String, ResourceVersion> {
        &self.versions[resource_type]
    }

    /// Parent/child links of the snapshot.
    #[inline]
    pub fn children(&self) -> &ChildIndex {
        &self.children
    }
}

/// Computes content versions for every resource in a snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceIndexer;

impl ResourceIndexer {
    /// Compute the version of every resource in `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::EncodingError`] for the first resource that fails
    /// to marshal or marshals under a foreign type URL. No partial map is
    /// ever returned.
    pub fn compute(snapshot: &Snapshot) -> XdsResult<VersionMap> {
        let mut versions = VersionMap::default();

        for (resource_type, resources) in snapshot.iter() {
            let slot = &mut versions[resource_type];
            slot.reserve(resources.len());
            for (name, resource) in resources.iter() {
                let any = encode(resource_type, name, resource.encode())?;
                slot.insert(name.clone(), Self::version_of(&any));
            }
        }

        Ok(versions)
    }

    /// Version of one marshaled resource: hex SHA-256 over type URL and value.
    pub fn version_of(any: &Any) -> ResourceVersion {
        let mut hasher = Sha256::new();
        hasher.update(any.type_url.as_bytes());
        hasher.update(&any.value);
        ResourceVersion::new(hex::encode(hasher.finalize()))
    }
}

/// Check the result of [`xds_core::Resource::encode`] and attach context.
pub fn encode(
    resource_type: ResourceType,
    name: &str,
    encoded: Result<Any, Box<dyn std::error::Error + Send + Sync>>,
) -> XdsResult<Any> {
    let any = encoded.map_err(|e| XdsError::EncodingError {
        type_url: resource_type.type_url().to_string(),
        name: name.to_string(),
        message: e.to_string(),
    })?;
    if any.type_url != resource_type.type_url() {
        return Err(XdsError::EncodingError {
            type_url: resource_type.type_url().to_string(),
            name: name.to_string(),
            message: format!("resource marshaled as {}", any.type_url),
        });
    }
    Ok(any)
}
