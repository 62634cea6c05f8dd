//! Cross-type delivery order.
//!
//! Envoy warms clusters before their endpoints and listeners before their
//! routes, and drops a resource whose dependencies are missing. Upserts
//! therefore flow from leaves to roots and removals from roots to leaves.

use xds_core::{ResourceType, TypeMap};

use super::tracker::SubscriptionTracker;

/// One step of an emission pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateStep {
    /// Type handled by this step.
    pub resource_type: ResourceType,
    /// Whether upserts may be sent.
    pub upsert: bool,
    /// Whether removals may be sent.
    pub remove: bool,
}

impl UpdateStep {
    const fn new(resource_type: ResourceType, upsert: bool, remove: bool) -> Self {
        Self {
            resource_type,
            upsert,
            remove,
        }
    }

    /// The first type with pending updates that this step must wait for.
    pub fn blocked_by(&self, trackers: &TypeMap<SubscriptionTracker>) -> Option<ResourceType> {
        gated_by(self.resource_type)
            .iter()
            .copied()
            .find(|blocker| trackers[*blocker].has_pending())
    }
}

/// Order in which each emission pass visits the types.
pub const UPDATE_ORDER: [UpdateStep; 8] = [
    UpdateStep::new(ResourceType::Secret, true, false),
    UpdateStep::new(ResourceType::Cluster, true, false),
    UpdateStep::new(ResourceType::Endpoint, true, false),
    UpdateStep::new(ResourceType::Listener, true, true),
    UpdateStep::new(ResourceType::Route, true, true),
    UpdateStep::new(ResourceType::Cluster, false, true),
    UpdateStep::new(ResourceType::Endpoint, false, true),
    UpdateStep::new(ResourceType::Secret, false, true),
];

/// Types whose in-flight updates hold back `resource_type`.
pub fn gated_by(resource_type: ResourceType) -> &'static [ResourceType] {
    match resource_type {
        ResourceType::Endpoint => &[ResourceType::Cluster],
        ResourceType::Listener | ResourceType::Route => {
            &[ResourceType::Cluster, ResourceType::Endpoint]
        }
        ResourceType::Cluster | ResourceType::Secret => &[],
    }
}
