//! Parent/child links between resource kinds.
//!
//! Envoy drops a child resource from its cache whenever the parent that
//! owns it changes, without asking for the child again. The relations are
//! declared once in [`CHILD_RELATIONS`]; [`DependencyIndexer`] evaluates
//! them against a snapshot to build a [`ChildIndex`].

use std::collections::HashMap;

use prost::Message;
use prost_types::Any;
use xds_core::{ResourceType, TypeMap, TypeUrl, XdsError, XdsResult};
use xds_types::envoy::config::listener::v3::{FilterChain, Listener};
use xds_types::envoy::extensions::filters::network::http_connection_manager::v3::HttpConnectionManager;
use xds_types::HTTP_CONNECTION_MANAGER_FILTER;

use crate::index;
use crate::snapshot::Snapshot;

/// Extracts child names from a parent's name and marshaled payload.
pub type ChildExtractor = fn(&str, &Any) -> XdsResult<Vec<String>>;

/// One parent kind owning resources of one child kind.
#[derive(Debug, Clone, Copy)]
pub struct ChildRelation {
    /// The owning kind.
    pub parent: ResourceType,
    /// The owned kind.
    pub child: ResourceType,
    extract: ChildExtractor,
}

impl ChildRelation {
    /// Names of the children owned by one parent resource.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::DecodingError`] if the parent payload cannot be
    /// inspected.
    pub fn children(&self, parent_name: &str, parent: &Any) -> XdsResult<Vec<String>> {
        (self.extract)(parent_name, parent)
    }
}

/// Every parent/child relation Envoy enforces. Each parent kind appears at
/// most once.
pub const CHILD_RELATIONS: &[ChildRelation] = &[
    ChildRelation {
        parent: ResourceType::Listener,
        child: ResourceType::Route,
        extract: listener_routes,
    },
    ChildRelation {
        parent: ResourceType::Cluster,
        child: ResourceType::Endpoint,
        extract: same_name,
    },
];

/// The relation whose parent is `parent`, if any.
pub fn relation_for(parent: ResourceType) -> Option<&'static ChildRelation> {
    CHILD_RELATIONS.iter().find(|r| r.parent == parent)
}

fn same_name(parent_name: &str, _: &Any) -> XdsResult<Vec<String>> {
    Ok(vec![parent_name.to_string()])
}

fn listener_routes(parent_name: &str, parent: &Any) -> XdsResult<Vec<String>> {
    let decode_error = |type_url: &str, e: prost::DecodeError| XdsError::DecodingError {
        type_url: type_url.to_string(),
        name: parent_name.to_string(),
        message: e.to_string(),
    };

    let listener =
        Listener::decode(parent.value.as_slice()).map_err(|e| decode_error(TypeUrl::LISTENER, e))?;

    let chains: Vec<&FilterChain> = listener
        .filter_chains
        .iter()
        .chain(listener.default_filter_chain.as_ref())
        .collect();

    let mut routes: Vec<String> = Vec::new();
    for filter in chains.iter().flat_map(|c| c.filters.iter()) {
        if filter.name != HTTP_CONNECTION_MANAGER_FILTER {
            continue;
        }
        let Some(config) = filter
            .typed_config
            .as_ref()
            .filter(|c| c.type_url == TypeUrl::HTTP_CONNECTION_MANAGER)
        else {
            continue;
        };
        let hcm = HttpConnectionManager::decode(config.value.as_slice())
            .map_err(|e| decode_error(TypeUrl::HTTP_CONNECTION_MANAGER, e))?;
        if let Some(rds) = hcm.rds.filter(|r| !r.route_config_name.is_empty()) {
            if !routes.contains(&rds.route_config_name) {
                routes.push(rds.route_config_name);
            }
        }
    }

    Ok(routes)
}

/// Per parent kind, parent name to the ordered names of its children.
///
/// Children need not exist in the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildIndex {
    by_parent: TypeMap<HashMap<String, Vec<String>>>,
}

impl ChildIndex {
    /// Children recorded for one parent resource.
    pub fn children(&self, parent: ResourceType, name: &str) -> &[String] {
        self.by_parent[parent].get(name).map_or(&[], Vec::as_slice)
    }

    /// Record the children of one parent resource.
    pub fn insert(&mut self, parent: ResourceType, name: impl Into<String>, children: Vec<String>) {
        self.by_parent[parent].insert(name.into(), children);
    }
}

/// Builds a [`ChildIndex`] from a snapshot using [`CHILD_RELATIONS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencyIndexer;

impl DependencyIndexer {
    /// Evaluate every relation against `snapshot`.
    ///
    /// # Errors
    ///
    /// Fails if any parent resource cannot be marshaled or inspected.
    pub fn compute(snapshot: &Snapshot) -> XdsResult<ChildIndex> {
        let mut index = ChildIndex::default();

        for relation in CHILD_RELATIONS {
            for (name, resource) in snapshot.resources(relation.parent).iter() {
                let any = index::encode(relation.parent, name, resource.encode())?;
                let children = relation.children(name, &any)?;
                index.insert(relation.parent, name.clone(), children);
            }
        }

        Ok(index)
    }
}
