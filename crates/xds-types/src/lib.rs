//! # xds-types
//!
//! Protobuf messages for the delta xDS wire contract.
//!
//! This crate provides hand-maintained [`prost`] messages for the subset of
//! the Envoy v3 API the delta engine touches:
//!
//! - Delta discovery types (`DeltaDiscoveryRequest`, `DeltaDiscoveryResponse`, `Resource`)
//! - Node identity (`Node`, `ControlPlane`)
//! - The listener fields needed to find route references (`Listener`,
//!   `FilterChain`, `Filter`, `HttpConnectionManager`, `Rds`)
//! - Name-only stand-ins for `Cluster`, `ClusterLoadAssignment`,
//!   `RouteConfiguration` and `Secret`
//!
//! Field tags match the upstream `.proto` definitions, so every message here
//! decodes bytes produced by a full Envoy build and unknown fields are skipped.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub use prost::Message;
pub use prost_types::Any;

/// Well-known name of the HTTP connection manager network filter.
pub const HTTP_CONNECTION_MANAGER_FILTER: &str = "envoy.filters.network.http_connection_manager";

/// Marshal `message` into an [`Any`] tagged with `type_url`.
pub fn pack<M: Message>(type_url: impl Into<String>, message: &M) -> Any {
    Any {
        type_url: type_url.into(),
        value: message.encode_to_vec(),
    }
}

pub mod envoy {
    //! Envoy xDS types.

    pub mod service {
        //! Envoy discovery service definitions.

        pub mod discovery {
            //! Core discovery service types.

            pub mod v3 {
                //! Discovery service v3 API.

                use std::collections::HashMap;

                use crate::envoy::config::core::v3::{ControlPlane, Node};

                /// Delta discovery request.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct DeltaDiscoveryRequest {
                    /// Node information. Only required on the first request of a stream.
                    #[prost(message, optional, tag = "1")]
                    pub node: Option<Node>,
                    /// Type URL of requested resources.
                    #[prost(string, tag = "2")]
                    pub type_url: String,
                    /// Resources to subscribe to.
                    #[prost(string, repeated, tag = "3")]
                    pub resource_names_subscribe: Vec<String>,
                    /// Resources to unsubscribe from.
                    #[prost(string, repeated, tag = "4")]
                    pub resource_names_unsubscribe: Vec<String>,
                    /// Versions the client already holds, sent on reconnect.
                    #[prost(map = "string, string", tag = "5")]
                    pub initial_resource_versions: HashMap<String, String>,
                    /// Nonce of the response being acknowledged.
                    #[prost(string, tag = "6")]
                    pub response_nonce: String,
                    /// Set when the client rejects the response named by `response_nonce`.
                    #[prost(message, optional, tag = "7")]
                    pub error_detail: Option<crate::google::rpc::Status>,
                }

                /// Delta discovery response.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct DeltaDiscoveryResponse {
                    #[prost(string, tag = "1")]
                    pub system_version_info: String,
                    /// Added or updated resources.
                    #[prost(message, repeated, tag = "2")]
                    pub resources: Vec<Resource>,
                    #[prost(string, tag = "4")]
                    pub type_url: String,
                    /// Unique nonce for this response.
                    #[prost(string, tag = "5")]
                    pub nonce: String,
                    /// Names the client should forget.
                    #[prost(string, repeated, tag = "6")]
                    pub removed_resources: Vec<String>,
                    #[prost(message, optional, tag = "7")]
                    pub control_plane: Option<ControlPlane>,
                }

                /// A named, versioned resource in a delta response.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct Resource {
                    #[prost(string, tag = "1")]
                    pub version: String,
                    #[prost(message, optional, tag = "2")]
                    pub resource: Option<::prost_types::Any>,
                    #[prost(string, tag = "3")]
                    pub name: String,
                    #[prost(string, repeated, tag = "4")]
                    pub aliases: Vec<String>,
                }
            }
        }
    }

    pub mod config {
        //! Envoy configuration types.

        pub mod core {
            //! Core configuration types.

            pub mod v3 {
                //! Core v3 API.

                /// Node information.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct Node {
                    /// Node identifier.
                    #[prost(string, tag = "1")]
                    pub id: String,
                    /// Cluster the node belongs to.
                    #[prost(string, tag = "2")]
                    pub cluster: String,
                }

                /// Control plane identifier.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct ControlPlane {
                    #[prost(string, tag = "1")]
                    pub identifier: String,
                }
            }
        }

        pub mod cluster {
            //! Cluster configuration.

            pub mod v3 {
                //! Cluster v3 API.

                /// Cluster configuration. Only the name is modeled.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct Cluster {
                    #[prost(string, tag = "1")]
                    pub name: String,
                }
            }
        }

        pub mod listener {
            //! Listener configuration.

            pub mod v3 {
                //! Listener v3 API.

                /// Listener configuration.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct Listener {
                    #[prost(string, tag = "1")]
                    pub name: String,
                    #[prost(message, repeated, tag = "3")]
                    pub filter_chains: Vec<FilterChain>,
                    /// Chain used when no other chain matches.
                    #[prost(message, optional, tag = "25")]
                    pub default_filter_chain: Option<FilterChain>,
                }

                /// An ordered list of network filters.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct FilterChain {
                    #[prost(message, repeated, tag = "3")]
                    pub filters: Vec<Filter>,
                    #[prost(string, tag = "7")]
                    pub name: String,
                }

                /// A network filter with its typed configuration.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct Filter {
                    #[prost(string, tag = "1")]
                    pub name: String,
                    #[prost(message, optional, tag = "4")]
                    pub typed_config: Option<::prost_types::Any>,
                }
            }
        }

        pub mod route {
            //! Route configuration.

            pub mod v3 {
                //! Route v3 API.

                /// Route configuration. Only the name is modeled.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct RouteConfiguration {
                    #[prost(string, tag = "1")]
                    pub name: String,
                }
            }
        }

        pub mod endpoint {
            //! Endpoint configuration.

            pub mod v3 {
                //! Endpoint v3 API.

                /// Cluster load assignment. Only the cluster name is modeled.
                #[derive(Clone, PartialEq, ::prost::Message)]
                pub struct ClusterLoadAssignment {
                    #[prost(string, tag = "1")]
                    pub cluster_name: String,
                }
            }
        }
    }

    pub mod extensions {
        //! Envoy extension configuration.

        pub mod filters {
            //! Filter extensions.

            pub mod network {
                //! Network filter extensions.

                pub mod http_connection_manager {
                    //! HTTP connection manager.

                    pub mod v3 {
                        //! HTTP connection manager v3 API.

                        /// HTTP connection manager filter configuration.
                        #[derive(Clone, PartialEq, ::prost::Message)]
                        pub struct HttpConnectionManager {
                            #[prost(string, tag = "2")]
                            pub stat_prefix: String,
                            /// Dynamic route configuration, if routes come over RDS.
                            #[prost(message, optional, tag = "3")]
                            pub rds: Option<Rds>,
                        }

                        /// Reference to a route configuration served over RDS.
                        #[derive(Clone, PartialEq, ::prost::Message)]
                        pub struct Rds {
                            #[prost(string, tag = "2")]
                            pub route_config_name: String,
                        }
                    }
                }
            }
        }

        pub mod transport_sockets {
            //! Transport socket extensions.

            pub mod tls {
                //! TLS transport socket.

                pub mod v3 {
                    //! TLS v3 API.

                    /// Secret served over SDS. Only the name is modeled.
                    #[derive(Clone, PartialEq, ::prost::Message)]
                    pub struct Secret {
                        #[prost(string, tag = "1")]
                        pub name: String,
                    }
                }
            }
        }
    }
}

pub mod google {
    //! Google API types.

    pub mod rpc {
        //! gRPC status types.

        /// Status carried by a NACK.
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Status {
            #[prost(int32, tag = "1")]
            pub code: i32,
            #[prost(string, tag = "2")]
            pub message: String,
            #[prost(message, repeated, tag = "3")]
            pub details: Vec<::prost_types::Any>,
        }
    }
}
