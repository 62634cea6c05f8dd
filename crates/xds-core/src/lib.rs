//! # xds-core
//!
//! Core types, traits, and error handling for the delta xDS engine.
//!
//! This crate provides the foundational types used across all other xDS crates:
//!
//! - [`XdsError`] - Error type with gRPC status code mapping
//! - [`ResourceType`] - The closed set of resource kinds the engine synchronizes
//! - [`TypeMap`] - Fixed-size map indexed by [`ResourceType`]
//! - [`ResourceVersion`] - Content version of a single resource
//! - [`NodeHash`] - Efficient node identification using FNV-1a hashing
//! - [`Resource`] - Trait for resource payloads stored in snapshots
//! - [`TypeUrl`] - Raw wire type identifiers and their constants
//!
//! ## Example
//!
//! ```rust
//! use xds_core::{NodeHash, ResourceType, ResourceVersion, TypeMap};
//!
//! let node = NodeHash::from_id("my-envoy-node");
//! assert_eq!(node, NodeHash::from_id("my-envoy-node"));
//!
//! let mut counts: TypeMap<usize> = TypeMap::default();
//! counts[ResourceType::Cluster] += 1;
//! assert_eq!(counts[ResourceType::Cluster], 1);
//!
//! let version = ResourceVersion::new("v1");
//! assert!(!version.is_empty());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod node;
mod resource;
mod resource_type;
mod type_url;
mod version;

pub use error::XdsError;
pub use node::NodeHash;
pub use resource::{AnyResource, BoxResource, Resource};
pub use resource_type::{ResourceType, TypeMap};
pub use type_url::TypeUrl;
pub use version::ResourceVersion;

/// Result type alias using [`XdsError`].
pub type Result<T> = std::result::Result<T, XdsError>;

/// Alias for Result to maintain backward compatibility.
pub type XdsResult<T> = Result<T>;
