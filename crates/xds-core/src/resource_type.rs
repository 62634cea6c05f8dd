//! The closed set of resource kinds synchronized by the delta protocol.

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::TypeUrl;

/// A resource kind served over the delta protocol.
///
/// The set is closed: every per-type table in the engine is a [`TypeMap`]
/// indexed by this enum, so adding a kind is a compile error everywhere the
/// kind must be handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    /// Listener (LDS).
    Listener,
    /// RouteConfiguration (RDS).
    Route,
    /// Cluster (CDS).
    Cluster,
    /// ClusterLoadAssignment (EDS).
    Endpoint,
    /// Secret (SDS).
    Secret,
}

impl ResourceType {
    /// Number of resource kinds.
    pub const COUNT: usize = 5;

    /// All resource kinds, in declaration order.
    pub const ALL: [ResourceType; Self::COUNT] = [
        ResourceType::Listener,
        ResourceType::Route,
        ResourceType::Cluster,
        ResourceType::Endpoint,
        ResourceType::Secret,
    ];

    /// The Envoy v3 type URL for this kind.
    #[must_use]
    pub const fn type_url(self) -> &'static str {
        match self {
            ResourceType::Listener => TypeUrl::LISTENER,
            ResourceType::Route => TypeUrl::ROUTE,
            ResourceType::Cluster => TypeUrl::CLUSTER,
            ResourceType::Endpoint => TypeUrl::ENDPOINT,
            ResourceType::Secret => TypeUrl::SECRET,
        }
    }

    /// Short name used in logs and metric labels.
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            ResourceType::Listener => "Listener",
            ResourceType::Route => "RouteConfiguration",
            ResourceType::Cluster => "Cluster",
            ResourceType::Endpoint => "ClusterLoadAssignment",
            ResourceType::Secret => "Secret",
        }
    }

    /// Look up the kind for a type URL.
    #[must_use]
    pub fn from_type_url(type_url: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_url() == type_url)
    }

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// A fixed-size map with one slot per [`ResourceType`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeMap<T>([T; ResourceType::COUNT]);

impl<T> TypeMap<T> {
    /// Build a map by calling `f` for every kind.
    pub fn from_fn(mut f: impl FnMut(ResourceType) -> T) -> Self {
        Self(ResourceType::ALL.map(&mut f))
    }

    /// Iterate over `(kind, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceType, &T)> {
        ResourceType::ALL.into_iter().zip(self.0.iter())
    }

    /// Iterate mutably over `(kind, value)` pairs in declaration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ResourceType, &mut T)> {
        ResourceType::ALL.into_iter().zip(self.0.iter_mut())
    }
}

impl<T: Default> Default for TypeMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<ResourceType> for TypeMap<T> {
    type Output = T;

    #[inline]
    fn index(&self, resource_type: ResourceType) -> &T {
        &self.0[resource_type.index()]
    }
}

impl<T> IndexMut<ResourceType> for TypeMap<T> {
    #[inline]
    fn index_mut(&mut self, resource_type: ResourceType) -> &mut T {
        &mut self.0[resource_type.index()]
    }
}
