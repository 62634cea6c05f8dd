//! Child resends after parent updates.
//!
//! When Envoy applies an updated Cluster it discards the cluster's endpoints,
//! and an updated Listener discards its routes, without asking for them
//! again. Once the parent update is acknowledged the session has to forget
//! what the client held for those children so the next pass resends them.

use tracing::debug;
use xds_cache::dependency::relation_for;
use xds_core::{ResourceType, TypeMap};

use super::tracker::{AppliedUpdate, SubscriptionTracker};

/// Applies the relation table to acknowledged parent updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildInvalidator;

impl ChildInvalidator {
    /// Forget `child_name` in `child` if the client subscribes to it.
    ///
    /// Returns whether anything was invalidated.
    pub fn on_parent_updated(
        child: &mut SubscriptionTracker,
        parent_name: &str,
        child_name: &str,
    ) -> bool {
        if !child.is_subscribed(child_name) {
            return false;
        }
        child.forget(child_name);
        debug!(
            type_url = child.resource_type().type_url(),
            parent = parent_name,
            child = child_name,
            "parent updated, child will be resent"
        );
        true
    }

    /// Invalidate the children of every update in `applied`.
    ///
    /// Returns the number of invalidated children.
    pub fn apply(
        trackers: &mut TypeMap<SubscriptionTracker>,
        parent: ResourceType,
        applied: &[AppliedUpdate],
    ) -> usize {
        let Some(relation) = relation_for(parent) else {
            return 0;
        };
        let child = &mut trackers[relation.child];

        let mut invalidated = 0;
        for update in applied {
            for child_name in &update.children {
                if Self::on_parent_updated(child, &update.name, child_name) {
                    invalidated += 1;
                }
            }
        }
        invalidated
    }
}
