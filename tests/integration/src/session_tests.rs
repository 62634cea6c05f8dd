//! End-to-end delta session tests through the public API.

use std::time::Duration;

use mesh_xds::prelude::*;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tonic::{Code, Status};
use xds_server::services::ads::DeltaResponseStream;
use xds_types::envoy::config::core::v3::Node;
use xds_types::envoy::config::listener::v3::{Filter, FilterChain, Listener};
use xds_types::envoy::extensions::filters::network::http_connection_manager::v3::{
    HttpConnectionManager, Rds,
};
use xds_types::{pack, HTTP_CONNECTION_MANAGER_FILTER};

const WAIT: Duration = Duration::from_secs(2);

struct Client {
    requests: mpsc::Sender<Result<DeltaDiscoveryRequest, Status>>,
    responses: DeltaResponseStream,
    node: String,
}

impl Client {
    fn connect(server: &XdsServer, node: &str) -> Self {
        let (requests, rx) = mpsc::channel(16);
        let responses = server
            .ads_service()
            .open_session(ReceiverStream::new(rx), None)
            .unwrap();
        Self {
            requests,
            responses,
            node: node.to_string(),
        }
    }

    async fn subscribe(&self, kind: ResourceType, names: &[&str]) {
        let request = DeltaDiscoveryRequest {
            node: Some(Node {
                id: self.node.clone(),
                cluster: "integration".into(),
            }),
            type_url: kind.type_url().into(),
            resource_names_subscribe: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        };
        self.requests.send(Ok(request)).await.unwrap();
    }

    async fn ack(&self, response: &DeltaDiscoveryResponse) {
        let request = DeltaDiscoveryRequest {
            type_url: response.type_url.clone(),
            response_nonce: response.nonce.clone(),
            ..Default::default()
        };
        self.requests.send(Ok(request)).await.unwrap();
    }

    async fn recv(&mut self) -> DeltaDiscoveryResponse {
        match timeout(WAIT, self.responses.next()).await {
            Ok(Some(Ok(response))) => response,
            other => panic!("expected a response, got {other:?}"),
        }
    }

    async fn recv_status(&mut self) -> Status {
        match timeout(WAIT, self.responses.next()).await {
            Ok(Some(Err(status))) => status,
            other => panic!("expected a status, got {other:?}"),
        }
    }
}

fn names(response: &DeltaDiscoveryResponse) -> Vec<&str> {
    response.resources.iter().map(|r| r.name.as_str()).collect()
}

fn cluster(name: &str, payload: &str) -> BoxResource {
    AnyResource::from_bytes(ResourceType::Cluster, name, payload.as_bytes().to_vec()).boxed()
}

fn route(name: &str, payload: &str) -> BoxResource {
    AnyResource::from_bytes(ResourceType::Route, name, payload.as_bytes().to_vec()).boxed()
}

/// A listener whose single HTTP filter points at route `route`.
fn listener(name: &str, route: &str, stat_prefix: &str) -> BoxResource {
    let hcm = HttpConnectionManager {
        stat_prefix: stat_prefix.into(),
        rds: Some(Rds {
            route_config_name: route.into(),
        }),
    };
    let listener = Listener {
        name: name.into(),
        filter_chains: vec![FilterChain {
            filters: vec![Filter {
                name: HTTP_CONNECTION_MANAGER_FILTER.into(),
                typed_config: Some(pack(TypeUrl::HTTP_CONNECTION_MANAGER, &hcm)),
            }],
            name: String::new(),
        }],
        default_filter_chain: None,
    };
    AnyResource::new(ResourceType::Listener, name, pack(TypeUrl::LISTENER, &listener)).boxed()
}

fn server() -> XdsServer {
    XdsServer::builder()
        .cache(Arc::new(ShardedCache::new()))
        .grace_period(WAIT)
        .build()
        .unwrap()
}

fn publish(server: &XdsServer, node: &str, version: &str, resources: Vec<BoxResource>) {
    let snapshot = Snapshot::builder()
        .version(version)
        .resources(resources)
        .build();
    server.cache().set_snapshot(NodeHash::from_id(node), snapshot);
}

#[tokio::test]
async fn nodes_receive_their_own_snapshots() {
    let server = server();
    publish(&server, "node-a", "a1", vec![cluster("only-a", "x")]);
    publish(&server, "node-b", "b1", vec![cluster("only-b", "y")]);

    let mut a = Client::connect(&server, "node-a");
    let mut b = Client::connect(&server, "node-b");
    a.subscribe(ResourceType::Cluster, &[]).await;
    b.subscribe(ResourceType::Cluster, &[]).await;

    let from_a = a.recv().await;
    let from_b = b.recv().await;
    assert_eq!(names(&from_a), vec!["only-a"]);
    assert_eq!(from_a.system_version_info, "a1");
    assert_eq!(names(&from_b), vec!["only-b"]);
    assert_eq!(from_b.system_version_info, "b1");

    // Both sessions number their own nonces.
    assert_eq!(from_a.nonce, from_b.nonce);
}

#[tokio::test]
async fn listener_update_resends_route_after_ack() {
    let server = server();
    publish(
        &server,
        "node-1",
        "v1",
        vec![listener("l1", "r1", "ingress"), route("r1", "route-a")],
    );
    let mut client = Client::connect(&server, "node-1");

    client.subscribe(ResourceType::Listener, &[]).await;
    let listeners = client.recv().await;
    assert_eq!(listeners.type_url, TypeUrl::LISTENER);
    assert_eq!(names(&listeners), vec!["l1"]);
    client.ack(&listeners).await;

    // Envoy asks for the routes its listeners name.
    client.subscribe(ResourceType::Route, &["r1"]).await;
    let routes = client.recv().await;
    assert_eq!(routes.type_url, TypeUrl::ROUTE);
    assert_eq!(names(&routes), vec!["r1"]);
    client.ack(&routes).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    publish(
        &server,
        "node-1",
        "v2",
        vec![listener("l1", "r1", "ingress-v2"), route("r1", "route-a")],
    );
    let updated = client.recv().await;
    assert_eq!(updated.type_url, TypeUrl::LISTENER);
    assert_eq!(names(&updated), vec!["l1"]);

    client.ack(&updated).await;
    let resent = client.recv().await;
    assert_eq!(resent.type_url, TypeUrl::ROUTE);
    assert_eq!(names(&resent), vec!["r1"]);
    assert_eq!(resent.resources[0].version, routes.resources[0].version);
}

#[tokio::test]
async fn server_shutdown_ends_sessions_and_refuses_new_ones() {
    let server = server();
    publish(&server, "node-1", "v1", vec![cluster("c1", "x")]);

    let mut client = Client::connect(&server, "node-1");
    client.subscribe(ResourceType::Cluster, &[]).await;
    client.recv().await;

    assert!(server.shutdown().await);
    assert_eq!(client.recv_status().await.code(), Code::ResourceExhausted);
    assert_eq!(server.limiter().active_sessions(), 0);

    let (_requests, rx) = mpsc::channel::<Result<DeltaDiscoveryRequest, Status>>(1);
    let refused = server
        .ads_service()
        .open_session(ReceiverStream::new(rx), None)
        .unwrap_err();
    assert_eq!(refused.code(), Code::ResourceExhausted);
}

#[tokio::test]
async fn session_limit_sheds_newest() {
    let server = XdsServer::builder()
        .cache(Arc::new(ShardedCache::new()))
        .max_sessions(2)
        .build()
        .unwrap();
    publish(&server, "node-1", "v1", vec![cluster("c1", "x")]);

    let mut first = Client::connect(&server, "node-1");
    let mut second = Client::connect(&server, "node-1");
    for client in [&first, &second] {
        client.subscribe(ResourceType::Cluster, &[]).await;
    }
    first.recv().await;
    second.recv().await;

    let (_requests, rx) = mpsc::channel::<Result<DeltaDiscoveryRequest, Status>>(1);
    assert!(server
        .ads_service()
        .open_session(ReceiverStream::new(rx), None)
        .is_err());

    assert_eq!(server.limiter().set_max_sessions(Some(1)), 1);
    assert_eq!(second.recv_status().await.code(), Code::ResourceExhausted);
    assert_eq!(server.limiter().active_sessions(), 1);
}
