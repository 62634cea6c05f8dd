//! Load tests with many nodes and sessions.
//!
//! These tests verify the system holds up under load:
//! - 1000 nodes with concurrent snapshot updates
//! - Hundreds of concurrent delta sessions
//! - Snapshot fan-out to every session
//!
//! Run with: `cargo test --package integration-tests --test load_tests -- --nocapture`

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::future::join_all;
use mesh_xds::prelude::*;
use tokio::sync::{mpsc, Barrier};
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tonic::Status;
use xds_types::envoy::config::core::v3::Node;

fn node_id(i: usize) -> String {
    format!("envoy-sidecar-{i}")
}

/// A snapshot with `clusters` clusters whose payloads depend on `generation`.
fn create_snapshot(version: &str, clusters: usize, generation: u8) -> Snapshot {
    let resources = (0..clusters).map(|i| {
        AnyResource::from_bytes(
            ResourceType::Cluster,
            format!("cluster-{i}"),
            vec![generation, (i % 251) as u8],
        )
        .boxed()
    });
    Snapshot::builder().version(version).resources(resources).build()
}

/// Concurrent snapshot writes for 1000 nodes across 10 tasks.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_1000_nodes() {
    let cache = Arc::new(ShardedCache::new());
    let num_nodes = 1000;
    let num_tasks = 10;
    let nodes_per_task = num_nodes / num_tasks;

    let barrier = Arc::new(Barrier::new(num_tasks));
    let total_ops = Arc::new(AtomicU64::new(0));
    let start = Instant::now();

    let mut handles = Vec::new();
    for task_id in 0..num_tasks {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        let total_ops = Arc::clone(&total_ops);

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            for i in task_id * nodes_per_task..(task_id + 1) * nodes_per_task {
                let node = NodeHash::from_id(&node_id(i));
                cache.set_snapshot(node, create_snapshot(&format!("v{i}"), 5, 0));
                total_ops.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    for handle in handles {
        handle.await.expect("Task panicked");
    }

    let duration = start.elapsed();
    let ops = total_ops.load(Ordering::Relaxed);
    println!(
        "Concurrent set: {} ops in {:?} ({:.0} ops/sec)",
        ops,
        duration,
        ops as f64 / duration.as_secs_f64()
    );

    assert_eq!(cache.snapshot_count(), num_nodes);
    assert_eq!(cache.stats().snapshots_set(), num_nodes as u64);
}

/// Indexing cost as snapshots grow.
#[test]
fn test_index_large_snapshot() {
    for clusters in [100, 1000, 5000] {
        let snapshot = Arc::new(create_snapshot("v1", clusters, 0));
        let start = Instant::now();
        let indexed = IndexedSnapshot::build(snapshot).unwrap();
        println!("Indexed {} clusters in {:?}", clusters, start.elapsed());

        assert_eq!(indexed.versions(ResourceType::Cluster).len(), clusters);
    }
}

/// Run one wildcard cluster session for `node`, acknowledging every
/// response. Meets `ready` after the first response and returns how many
/// clusters it received in two responses.
async fn run_client(ads: AdsService, node: String, ready: Arc<Barrier>) -> usize {
    let (requests, rx) = mpsc::channel::<Result<DeltaDiscoveryRequest, Status>>(8);
    let mut responses = ads.open_session(ReceiverStream::new(rx), None).unwrap();

    requests
        .send(Ok(DeltaDiscoveryRequest {
            node: Some(Node {
                id: node,
                cluster: "load".into(),
            }),
            type_url: ResourceType::Cluster.type_url().into(),
            ..Default::default()
        }))
        .await
        .unwrap();

    let mut received = 0;
    for round in 0..2 {
        let response = match timeout(Duration::from_secs(10), responses.next()).await {
            Ok(Some(Ok(response))) => response,
            other => panic!("session stalled: {other:?}"),
        };
        received += response.resources.len();
        requests
            .send(Ok(DeltaDiscoveryRequest {
                type_url: response.type_url,
                response_nonce: response.nonce,
                ..Default::default()
            }))
            .await
            .unwrap();
        if round == 0 {
            ready.wait().await;
        }
    }
    received
}

/// Hundreds of sessions each get their full snapshot, then only the
/// changed half after an update.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_500_sessions_fan_out() {
    let num_sessions = 500;
    let clusters = 20;

    let server = XdsServer::builder()
        .cache(Arc::new(ShardedCache::new()))
        .build()
        .unwrap();
    for i in 0..num_sessions {
        let node = NodeHash::from_id(&node_id(i));
        server
            .cache()
            .set_snapshot(node, create_snapshot("v1", clusters, 0));
    }

    let start = Instant::now();
    let ready = Arc::new(Barrier::new(num_sessions + 1));
    let clients: Vec<_> = (0..num_sessions)
        .map(|i| {
            tokio::spawn(run_client(
                server.ads_service(),
                node_id(i),
                Arc::clone(&ready),
            ))
        })
        .collect();

    timeout(Duration::from_secs(10), ready.wait())
        .await
        .expect("every session should get its first snapshot");
    println!(
        "{} sessions received their first snapshot in {:?}",
        num_sessions,
        start.elapsed()
    );

    for i in 0..num_sessions {
        let node = NodeHash::from_id(&node_id(i));
        let mut builder = Snapshot::builder().version("v2");
        for c in 0..clusters {
            // Only even clusters change.
            let generation = u8::from(c % 2 == 0);
            builder = builder.resource(
                AnyResource::from_bytes(
                    ResourceType::Cluster,
                    format!("cluster-{c}"),
                    vec![generation, (c % 251) as u8],
                )
                .boxed(),
            );
        }
        server.cache().set_snapshot(node, builder.build());
    }

    let results = join_all(clients).await;
    println!(
        "{} sessions completed both rounds in {:?}",
        num_sessions,
        start.elapsed()
    );

    for result in results {
        let received = result.expect("client panicked");
        assert_eq!(received, clusters + clusters / 2);
    }
}

/// Admission stays within the limit when sessions race for slots.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_session_limit_under_contention() {
    let limit = 50;
    let server = XdsServer::builder()
        .cache(Arc::new(ShardedCache::new()))
        .max_sessions(limit)
        .build()
        .unwrap();

    let barrier = Arc::new(Barrier::new(100));
    let attempts: Vec<_> = (0..100)
        .map(|_| {
            let ads = server.ads_service();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                let (requests, rx) = mpsc::channel::<Result<DeltaDiscoveryRequest, Status>>(1);
                barrier.wait().await;
                ads.open_session(ReceiverStream::new(rx), None)
                    .ok()
                    .map(|responses| (requests, responses))
            })
        })
        .collect();

    let admitted: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .filter_map(|r| r.expect("attempt panicked"))
        .collect();

    assert_eq!(admitted.len(), limit);
    assert_eq!(server.limiter().active_sessions(), limit);
}
