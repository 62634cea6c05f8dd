//! In-process delta xDS example
//!
//! This example demonstrates the engine without a network:
//! - Publishes a snapshot with clusters and endpoints for one node
//! - Opens a delta session and plays the proxy side, acknowledging
//!   every response
//! - Rolls one cluster every few seconds so endpoint resends show up
//! - Shuts down gracefully on Ctrl+C
//!
//! Run with:
//! ```bash
//! RUST_LOG=info,xds_server=debug cargo run -p in-process
//! ```

use std::time::Duration;

use anyhow::Context;
use mesh_xds::prelude::*;
use mesh_xds::server::shutdown;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tonic::Status;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xds_types::envoy::config::core::v3::Node;

const NODE_ID: &str = "edge-proxy";

/// Configuration for the example.
#[derive(Debug, Clone, Copy)]
struct Config {
    /// Number of sample clusters.
    num_clusters: usize,
    /// Time between snapshot updates.
    update_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_clusters: 3,
            update_interval: Duration::from_secs(5),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("{}", mesh_xds::version::version_string());
    let config = Config::default();

    let server = XdsServer::builder()
        .cache(Arc::new(ShardedCache::new()))
        .control_plane_id("in-process-demo")
        .grace_period(Duration::from_secs(5))
        .build()
        .context("building xDS server")?;

    server
        .cache()
        .set_snapshot(NodeHash::from_id(NODE_ID), sample_snapshot(&config, 1));
    info!(node = NODE_ID, "published initial snapshot");

    let proxy = tokio::spawn(run_proxy(server.ads_service()));

    let cache = Arc::clone(server.cache());
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.update_interval);
        ticker.tick().await;
        for generation in 2u64.. {
            ticker.tick().await;
            cache.set_snapshot(
                NodeHash::from_id(NODE_ID),
                sample_snapshot(&config, generation),
            );
            info!(generation, "published snapshot");
        }
    });

    info!("Press Ctrl+C to shutdown");
    shutdown::wait_for_signal()
        .await
        .context("installing signal handlers")?;

    if !server.shutdown().await {
        warn!("sessions did not finish within the grace period");
    }
    match proxy.await? {
        Ok(()) => info!("proxy finished"),
        Err(status) => info!(
            code = ?status.code(),
            message = status.message(),
            "proxy disconnected"
        ),
    }
    Ok(())
}

/// Clusters `cluster-0..n` with same-named endpoints. Cluster 0 changes
/// every generation; the others stay put.
fn sample_snapshot(config: &Config, generation: u64) -> Snapshot {
    let mut builder = Snapshot::builder().version(format!("v{generation}"));
    for i in 0..config.num_clusters {
        let name = format!("cluster-{i}");
        let cluster_payload = if i == 0 {
            format!("{name}:timeout={generation}s")
        } else {
            format!("{name}:timeout=1s")
        };
        let endpoint_payload = format!("{name}:10.0.0.{i}:8080");
        builder = builder
            .resource(
                AnyResource::from_bytes(
                    ResourceType::Cluster,
                    name.clone(),
                    cluster_payload.into_bytes(),
                )
                .boxed(),
            )
            .resource(
                AnyResource::from_bytes(ResourceType::Endpoint, name, endpoint_payload.into_bytes())
                    .boxed(),
            );
    }
    builder.build()
}

/// Act like an Envoy: wildcard CDS, then EDS for every cluster received,
/// acknowledging everything.
async fn run_proxy(ads: AdsService) -> Result<(), Status> {
    let (requests, rx) = mpsc::channel::<Result<DeltaDiscoveryRequest, Status>>(16);
    let mut responses = ads.open_session(ReceiverStream::new(rx), None)?;

    let send = |request: DeltaDiscoveryRequest| {
        let requests = requests.clone();
        async move {
            requests
                .send(Ok(request))
                .await
                .map_err(|_| Status::cancelled("session closed"))
        }
    };

    send(DeltaDiscoveryRequest {
        node: Some(Node {
            id: NODE_ID.into(),
            cluster: "demo".into(),
        }),
        type_url: ResourceType::Cluster.type_url().into(),
        ..Default::default()
    })
    .await?;

    while let Some(response) = responses.next().await {
        let response = response?;
        info!(
            type_url = %response.type_url,
            nonce = %response.nonce,
            resources = ?response.resources.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            removed = ?response.removed_resources,
            "proxy received update"
        );

        send(DeltaDiscoveryRequest {
            type_url: response.type_url.clone(),
            response_nonce: response.nonce.clone(),
            ..Default::default()
        })
        .await?;

        if response.type_url == TypeUrl::CLUSTER {
            let fresh: Vec<String> = response.resources.iter().map(|r| r.name.clone()).collect();
            if !fresh.is_empty() {
                send(DeltaDiscoveryRequest {
                    type_url: ResourceType::Endpoint.type_url().into(),
                    resource_names_subscribe: fresh,
                    ..Default::default()
                })
                .await?;
            }
        }
    }
    Ok(())
}
