//! Cache integration tests.

use std::sync::Arc;
use std::time::Duration;

use mesh_xds::prelude::*;

fn cluster(name: &str, payload: &[u8]) -> BoxResource {
    AnyResource::from_bytes(ResourceType::Cluster, name, payload.to_vec()).boxed()
}

#[test]
fn cache_basic_operations() {
    let cache = ShardedCache::new();
    let node = NodeHash::from_id("test-node");

    let snapshot = Snapshot::builder()
        .version("v1")
        .resource(cluster("c1", b"a"))
        .build();
    cache.set_snapshot(node, snapshot);

    let retrieved = cache.get_snapshot(node).expect("snapshot should exist");
    assert_eq!(retrieved.version(), "v1");
    assert!(retrieved.resources(ResourceType::Cluster).contains("c1"));
    assert!(retrieved.resources(ResourceType::Listener).is_empty());
}

#[test]
fn cache_multiple_nodes() {
    let cache = ShardedCache::new();

    let nodes = ["node-1", "node-2", "node-3"];
    for (i, node_id) in nodes.iter().enumerate() {
        let node = NodeHash::from_id(node_id);
        cache.set_snapshot(node, Snapshot::builder().version(format!("v{}", i + 1)).build());
    }

    assert_eq!(cache.snapshot_count(), 3);

    for (i, node_id) in nodes.iter().enumerate() {
        let node = NodeHash::from_id(node_id);
        let snapshot = cache.get_snapshot(node).unwrap();
        assert_eq!(snapshot.version(), format!("v{}", i + 1));
    }
}

#[test]
fn cache_stats_tracking() {
    let cache = ShardedCache::new();
    let node = NodeHash::from_id("test-node");

    cache.get_snapshot(node);
    assert_eq!(cache.stats().snapshot_misses(), 1);
    assert_eq!(cache.stats().snapshot_hits(), 0);

    cache.set_snapshot(node, Snapshot::builder().version("v1").build());
    cache.get_snapshot(node);

    assert_eq!(cache.stats().snapshots_set(), 1);
    assert_eq!(cache.stats().snapshot_hits(), 1);
    assert!((cache.stats().hit_rate() - 0.5).abs() < 0.01);
}

#[tokio::test]
async fn watch_sees_latest_snapshot_on_creation() {
    let cache = ShardedCache::new();
    let node = NodeHash::from_id("test-node");
    cache.set_snapshot(node, Snapshot::builder().version("v1").build());

    let mut watch = cache.create_watch(node);
    let snapshot = tokio::time::timeout(Duration::from_secs(1), watch.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.version(), "v1");
}

#[tokio::test]
async fn watches_coalesce_to_latest() {
    let cache = ShardedCache::new();
    let node = NodeHash::from_id("test-node");
    let mut watch = cache.create_watch(node);

    cache.set_snapshot(node, Snapshot::builder().version("v1").build());
    cache.set_snapshot(node, Snapshot::builder().version("v2").build());

    let snapshot = watch.recv().await.unwrap();
    assert_eq!(snapshot.version(), "v2");
}

#[tokio::test]
async fn remove_node_closes_watches() {
    let cache = ShardedCache::new();
    let node = NodeHash::from_id("test-node");
    let mut watch1 = cache.create_watch(node);
    let mut watch2 = cache.create_watch(node);
    assert_eq!(cache.watches().watch_count(node), 2);

    cache.remove_node(node);

    assert!(watch1.recv().await.is_none());
    assert!(watch2.recv().await.is_none());
    assert!(!cache.has_snapshot(node));
    assert_eq!(cache.stats().watches_closed(), 2);
}

#[test]
fn identical_content_gets_identical_versions() {
    let a = Snapshot::builder()
        .version("v1")
        .resource(cluster("c1", b"same"))
        .resource(cluster("c2", b"other"))
        .build();
    let b = Snapshot::builder()
        .version("v2")
        .resource(cluster("c1", b"same"))
        .resource(cluster("c2", b"changed"))
        .build();

    let a = IndexedSnapshot::build(Arc::new(a)).unwrap();
    let b = IndexedSnapshot::build(Arc::new(b)).unwrap();

    let va = a.versions(ResourceType::Cluster);
    let vb = b.versions(ResourceType::Cluster);
    assert_eq!(va["c1"], vb["c1"]);
    assert_ne!(va["c2"], vb["c2"]);
    assert_eq!(va["c1"].as_str().len(), 64);
}

#[test]
fn cluster_children_are_same_named_endpoints() {
    let snapshot = Snapshot::builder()
        .version("v1")
        .resource(cluster("backend", b"a"))
        .build();
    let indexed = IndexedSnapshot::build(Arc::new(snapshot)).unwrap();
    assert_eq!(
        indexed.children().children(ResourceType::Cluster, "backend"),
        ["backend".to_string()]
    );
}

#[test]
fn cache_concurrent_access() {
    use std::thread;

    let cache = Arc::new(ShardedCache::new());
    let mut handles = vec![];

    for i in 0..10 {
        let cache_clone = Arc::clone(&cache);
        let handle = thread::spawn(move || {
            let node = NodeHash::from_id(&format!("node-{}", i));

            for j in 0..100 {
                let snapshot = Snapshot::builder()
                    .version(format!("v{}", j))
                    .resource(cluster("c1", format!("{j}").as_bytes()))
                    .build();
                cache_clone.set_snapshot(node, snapshot);
                cache_clone.get_snapshot(node);
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.snapshot_count(), 10);
}
