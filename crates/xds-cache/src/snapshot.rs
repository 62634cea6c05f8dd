//! Snapshot: immutable collection of xDS resources.
//!
//! A snapshot represents a consistent view of all resources for a node
//! at a specific version. Snapshots are:
//!
//! - **Immutable**: once built, a snapshot is never modified; the source
//!   replaces it wholesale
//! - **Versioned**: the global version is echoed as `system_version_info`
//! - **Kind-organized**: resources are grouped by [`ResourceType`]

use std::collections::HashMap;
use std::sync::Arc;

use xds_core::{BoxResource, ResourceType, TypeMap};

/// Resources of one kind within a snapshot, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct SnapshotResources {
    resources: HashMap<String, BoxResource>,
}

impl SnapshotResources {
    /// Get the number of resources.
    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if there are no resources.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Get a resource by name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&BoxResource> {
        self.resources.get(name)
    }

    /// Check if a resource with this name exists.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Iterate over all resources.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BoxResource)> {
        self.resources.iter()
    }

    /// Get all resource names.
    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.resources.keys()
    }
}

/// An immutable snapshot of xDS resources for a node.
///
/// Snapshots are the primary unit of cache storage and are shared between
/// every session of a node as `Arc<Snapshot>`.
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: String,
    resources: TypeMap<SnapshotResources>,
    created_at: std::time::Instant,
}

impl Snapshot {
    /// Create a new snapshot builder.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }

    /// Get the global version of this snapshot.
    #[inline]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get the creation timestamp.
    #[inline]
    pub fn created_at(&self) -> std::time::Instant {
        self.created_at
    }

    /// Get resources of one kind.
    #[inline]
    pub fn resources(&self, resource_type: ResourceType) -> &SnapshotResources {
        &self.resources[resource_type]
    }

    /// Look up a single resource.
    #[inline]
    pub fn get(&self, resource_type: ResourceType, name: &str) -> Option<&BoxResource> {
        self.resources[resource_type].get(name)
    }

    /// Iterate over every kind with its resources.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceType, &SnapshotResources)> {
        self.resources.iter()
    }

    /// Get the total number of resources across all kinds.
    pub fn total_resources(&self) -> usize {
        self.resources.iter().map(|(_, r)| r.len()).sum()
    }

    /// Check if this snapshot holds no resources at all.
    pub fn is_empty(&self) -> bool {
        self.resources.iter().all(|(_, r)| r.is_empty())
    }
}

/// Builder for creating snapshots.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    version: String,
    resources: TypeMap<SnapshotResources>,
}

impl SnapshotBuilder {
    /// Create a new snapshot builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global version for this snapshot.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add a single resource under its own kind.
    ///
    /// A later resource with the same kind and name replaces the earlier one.
    pub fn resource(mut self, resource: BoxResource) -> Self {
        let kind = resource.resource_type();
        self.resources[kind]
            .resources
            .insert(resource.name().to_string(), resource);
        self
    }

    /// Add many resources, each under its own kind.
    pub fn resources(self, resources: impl IntoIterator<Item = BoxResource>) -> Self {
        resources.into_iter().fold(self, Self::resource)
    }

    /// Build the snapshot.
    pub fn build(self) -> Snapshot {
        Snapshot {
            version: self.version,
            resources: self.resources,
            created_at: std::time::Instant::now(),
        }
    }
}

/// Shared, immutable snapshot handle.
pub type SharedSnapshot = Arc<Snapshot>;
