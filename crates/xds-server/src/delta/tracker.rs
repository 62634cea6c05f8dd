//! Per-type delta state of one session.
//!
//! A [`SubscriptionTracker`] remembers what the client asked for, what it has
//! acknowledged, and what is in flight. Everything here is owned by the
//! session loop; nothing is shared.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, trace};
use xds_cache::{index, IndexedSnapshot};
use xds_core::{ResourceType, ResourceVersion, XdsError, XdsResult};
use xds_types::envoy::service::discovery::v3::{
    DeltaDiscoveryRequest, DeltaDiscoveryResponse, Resource,
};

use crate::utils::NonceGenerator;

/// One entry of an unacknowledged response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    /// Version sent; empty for removals.
    pub version: ResourceVersion,
    /// Whether the entry was a removal.
    pub removed: bool,
    /// Children of the resource at send time.
    pub children: Vec<String>,
}

impl PendingUpdate {
    fn upsert(version: ResourceVersion, children: Vec<String>) -> Self {
        Self {
            version,
            removed: false,
            children,
        }
    }

    fn removal() -> Self {
        Self {
            version: ResourceVersion::empty(),
            removed: true,
            children: Vec::new(),
        }
    }
}

/// An upsert the client has just acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedUpdate {
    /// Resource name.
    pub name: String,
    /// Version now held by the client.
    pub version: ResourceVersion,
    /// Children recorded when the update was sent.
    pub children: Vec<String>,
}

/// What a request meant for its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvOutcome {
    /// The type was registered or names were subscribed.
    NewSubscription,
    /// A pending response was acknowledged.
    Ack(Vec<AppliedUpdate>),
    /// A pending response was rejected.
    Nack,
    /// Nothing of note.
    Ignore,
}

/// Difference between what the client holds and the current snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Names to send, with their current version.
    pub upserts: BTreeMap<String, ResourceVersion>,
    /// Names the client must drop.
    pub removals: BTreeSet<String>,
    /// Whether any change falls into an allowed category.
    pub has_relevant_change: bool,
}

impl Diff {
    /// No upserts and no removals, allowed or not.
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// Subscription, acknowledgement and in-flight state for one resource type.
///
/// Registration happens on the first request for the type and fixes the
/// mode: wildcard when that request subscribes to no names.
#[derive(Debug)]
pub struct SubscriptionTracker {
    resource_type: ResourceType,
    allow_empty: bool,
    registered: bool,
    wildcard: bool,
    subscriptions: HashSet<String>,
    acked: HashMap<String, ResourceVersion>,
    pending: HashMap<String, HashMap<String, PendingUpdate>>,
    sent_once: bool,
}

impl SubscriptionTracker {
    /// Create an unregistered tracker.
    pub fn new(resource_type: ResourceType, allow_empty: bool) -> Self {
        Self {
            resource_type,
            allow_empty,
            registered: false,
            wildcard: false,
            subscriptions: HashSet::new(),
            acked: HashMap::new(),
            pending: HashMap::new(),
            sent_once: false,
        }
    }

    /// The tracked type.
    #[inline]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Whether the client has sent a request for this type.
    #[inline]
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Whether the client subscribed to every resource of the type.
    #[inline]
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Whether a response is waiting for its ACK or NACK.
    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether a response was ever sent for this type.
    #[inline]
    pub fn sent_once(&self) -> bool {
        self.sent_once
    }

    /// Version the client has acknowledged for `name`.
    pub fn acked_version(&self, name: &str) -> Option<&ResourceVersion> {
        self.acked.get(name)
    }

    /// Whether `name` is wanted by the client.
    pub fn is_subscribed(&self, name: &str) -> bool {
        self.registered && (self.wildcard || self.subscriptions.contains(name))
    }

    /// Apply one request for this type.
    ///
    /// On a NACK the caller must not emit anything for this iteration.
    pub fn recv(&mut self, request: &DeltaDiscoveryRequest) -> RecvOutcome {
        let mut outcome = RecvOutcome::Ignore;
        let mut seeded: HashSet<&str> = HashSet::new();

        if !self.registered {
            self.registered = true;
            self.wildcard = request.resource_names_subscribe.is_empty();
            for (name, version) in &request.initial_resource_versions {
                self.acked
                    .insert(name.clone(), ResourceVersion::new(version.as_str()));
                seeded.insert(name.as_str());
            }
            debug!(
                type_url = self.resource_type.type_url(),
                wildcard = self.wildcard,
                seeded = seeded.len(),
                "registered resource type"
            );
            outcome = RecvOutcome::NewSubscription;
        }

        if !self.wildcard {
            for name in &request.resource_names_subscribe {
                self.subscriptions.insert(name.clone());
                // A fresh subscribe forces a resend unless the client just
                // told us which version it already holds.
                if !seeded.contains(name.as_str()) {
                    self.acked.remove(name);
                }
                outcome = RecvOutcome::NewSubscription;
            }
            for name in &request.resource_names_unsubscribe {
                self.subscriptions.remove(name);
            }
        }

        let nonce = request.response_nonce.as_str();
        if nonce.is_empty() {
            return outcome;
        }
        if request.error_detail.is_some() {
            self.nack(nonce);
            return RecvOutcome::Nack;
        }
        RecvOutcome::Ack(self.ack(nonce))
    }

    /// Commit the response sent with `nonce`.
    ///
    /// Unknown nonces are ignored, so a repeated ACK is harmless. Returns the
    /// upserts that were applied, sorted by name.
    pub fn ack(&mut self, nonce: &str) -> Vec<AppliedUpdate> {
        let Some(updates) = self.pending.remove(nonce) else {
            trace!(
                type_url = self.resource_type.type_url(),
                nonce,
                "ignoring ACK for unknown nonce"
            );
            return Vec::new();
        };

        let mut applied = Vec::with_capacity(updates.len());
        for (name, update) in updates {
            if update.removed {
                self.acked.remove(&name);
                continue;
            }
            self.acked.insert(name.clone(), update.version.clone());
            applied.push(AppliedUpdate {
                name,
                version: update.version,
                children: update.children,
            });
        }
        applied.sort_by(|a, b| a.name.cmp(&b.name));
        applied
    }

    /// Drop the response sent with `nonce` without touching acknowledged
    /// state. The same content goes out again on the next send.
    pub fn nack(&mut self, nonce: &str) {
        self.pending.remove(nonce);
    }

    /// Forget what the client holds for `name`, including anything in
    /// flight, so the next send upserts it again.
    pub fn forget(&mut self, name: &str) {
        self.acked.remove(name);
        for updates in self.pending.values_mut() {
            updates.remove(name);
        }
    }

    /// Compare acknowledged state with `current`.
    ///
    /// In explicit mode only subscribed names are considered.
    pub fn compute_diff(
        &self,
        current: &HashMap<String, ResourceVersion>,
        allow_upsert: bool,
        allow_remove: bool,
    ) -> Diff {
        let mut diff = Diff::default();

        if self.wildcard {
            for (name, acked) in &self.acked {
                match current.get(name) {
                    None => {
                        diff.removals.insert(name.clone());
                    }
                    Some(version) if version != acked => {
                        diff.upserts.insert(name.clone(), version.clone());
                    }
                    Some(_) => {}
                }
            }
            for (name, version) in current {
                if !self.acked.contains_key(name) {
                    diff.upserts.insert(name.clone(), version.clone());
                }
            }
        } else {
            for name in &self.subscriptions {
                match (current.get(name), self.acked.get(name)) {
                    (Some(version), Some(acked)) if version == acked => {}
                    (Some(version), _) => {
                        diff.upserts.insert(name.clone(), version.clone());
                    }
                    (None, Some(_)) => {
                        diff.removals.insert(name.clone());
                    }
                    (None, None) => {}
                }
            }
        }

        diff.has_relevant_change = (allow_upsert && !diff.upserts.is_empty())
            || (allow_remove && !diff.removals.is_empty());
        diff
    }

    /// Build the next response for this type, if one is due.
    ///
    /// Returns `None` while unregistered, while a response is in flight, or
    /// when nothing relevant changed. A type that allows empty responses gets
    /// one empty response if its first diff is empty, so the client knows
    /// the set is confirmed empty.
    ///
    /// # Errors
    ///
    /// Fails if a resource cannot be marshaled.
    pub fn send(
        &mut self,
        indexed: &IndexedSnapshot,
        nonces: &mut NonceGenerator,
        allow_upsert: bool,
        allow_remove: bool,
    ) -> XdsResult<Option<DeltaDiscoveryResponse>> {
        if !self.registered || self.has_pending() {
            return Ok(None);
        }

        if !self.wildcard {
            // The client discards unsubscribed resources on its own.
            let subscriptions = &self.subscriptions;
            self.acked.retain(|name, _| subscriptions.contains(name));
        }

        let diff = self.compute_diff(
            indexed.versions(self.resource_type),
            allow_upsert,
            allow_remove,
        );
        if !diff.has_relevant_change {
            let confirm_empty = self.allow_empty && diff.is_empty() && !self.sent_once;
            if !confirm_empty {
                return Ok(None);
            }
        }

        let snapshot = indexed.snapshot();
        let mut pending = HashMap::new();
        let mut resources = Vec::new();
        let mut removed_resources = Vec::new();

        if allow_upsert {
            resources.reserve(diff.upserts.len());
            for (name, version) in diff.upserts {
                let resource = snapshot.get(self.resource_type, &name).ok_or_else(|| {
                    XdsError::Internal {
                        message: format!(
                            "{} {name} is indexed but missing from snapshot {}",
                            self.resource_type,
                            snapshot.version()
                        ),
                        source: None,
                    }
                })?;
                let any = index::encode(self.resource_type, &name, resource.encode())?;
                let children = indexed
                    .children()
                    .children(self.resource_type, &name)
                    .to_vec();
                resources.push(Resource {
                    version: version.to_string(),
                    resource: Some(any),
                    name: name.clone(),
                    aliases: Vec::new(),
                });
                pending.insert(name, PendingUpdate::upsert(version, children));
            }
        }

        if allow_remove {
            for name in diff.removals {
                pending.insert(name.clone(), PendingUpdate::removal());
                removed_resources.push(name);
            }
        }

        let nonce = nonces.next_nonce();
        self.pending.insert(nonce.clone(), pending);
        self.sent_once = true;

        Ok(Some(DeltaDiscoveryResponse {
            system_version_info: snapshot.version().to_string(),
            resources,
            type_url: self.resource_type.type_url().to_string(),
            nonce,
            removed_resources,
            control_plane: None,
        }))
    }
}
