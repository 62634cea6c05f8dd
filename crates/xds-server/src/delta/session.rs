//! The delta session loop.
//!
//! One [`DeltaSession`] serves one ADS delta stream. A reader task pulls
//! requests off the inbound stream into a bounded queue; the session task
//! owns every tracker and reacts to four things: requests, snapshots, the
//! re-authorization tick, and being told to stop (server shutdown or the
//! limiter draining it).
//!
//! ```text
//! Init ──first request──▶ PendingInitialSnapshot ──first snapshot──▶ Running
//! ```
//!
//! Nothing is emitted before `Running`. In `Running`, every iteration that
//! is not a NACK re-checks authorization and walks [`UPDATE_ORDER`].
//!
//! Waiting for room on the outbound channel still watches for shutdown and
//! drain, so a client that stops reading cannot pin the session.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tonic::{Code, Status};
use tracing::{debug, error, info, trace, warn};
use xds_cache::dependency::relation_for;
use xds_cache::{Cache, IndexedSnapshot, ShardedCache, SharedSnapshot, Watch};
use xds_core::{TypeMap, TypeUrl, XdsError, XdsResult};
use xds_types::envoy::config::core::v3::ControlPlane;
use xds_types::envoy::service::discovery::v3::{DeltaDiscoveryRequest, DeltaDiscoveryResponse};

use super::child::ChildInvalidator;
use super::order::UPDATE_ORDER;
use super::tracker::{RecvOutcome, SubscriptionTracker};
use crate::auth::{Authorizer, SessionIdentity};
use crate::config::ServerConfig;
use crate::limiter::SessionGuard;
use crate::metrics::{SessionTracker, XdsMetrics};
use crate::services::ServiceState;
use crate::shutdown::{OperationGuard, ShutdownSignal};
use crate::stream::{StreamContext, StreamId};
use crate::utils::NonceGenerator;

/// Outbound half of a session.
pub type ResponseSender = mpsc::Sender<Result<DeltaDiscoveryResponse, Status>>;

type Inbound = XdsResult<DeltaDiscoveryRequest>;

/// How long a failed session waits to hand its final status to the client.
const FINAL_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the first request.
    Init,
    /// Identified and watching, no snapshot yet.
    PendingInitialSnapshot,
    /// Emitting responses.
    Running,
}

enum Event {
    Request(DeltaDiscoveryRequest),
    Snapshot(SharedSnapshot),
    Reauth,
    InboundFailed(XdsError),
    PeerClosed,
    WatchClosed,
    Shutdown,
    Drained,
}

/// State of one delta stream.
#[derive(Debug)]
pub struct DeltaSession {
    ctx: StreamContext,
    config: Arc<ServerConfig>,
    cache: Arc<ShardedCache>,
    authorizer: Arc<dyn Authorizer>,
    metrics: XdsMetrics,
    responses: ResponseSender,
    control_plane: Option<ControlPlane>,
    token: Option<String>,

    state: SessionState,
    identity: Option<SessionIdentity>,
    watch: Option<Watch>,
    indexed: Option<IndexedSnapshot>,
    trackers: TypeMap<SubscriptionTracker>,
    nonces: NonceGenerator,

    limiter: SessionGuard,
    shutdown: ShutdownSignal,
    _operation: OperationGuard,
    _tracker: SessionTracker,
}

impl DeltaSession {
    /// Create a session holding an admitted limiter slot.
    pub fn new(
        state: &ServiceState,
        limiter: SessionGuard,
        token: Option<String>,
        responses: ResponseSender,
    ) -> Self {
        let config = Arc::clone(&state.config);
        let trackers = TypeMap::from_fn(|kind| SubscriptionTracker::new(kind, config.allow_empty[kind]));
        let control_plane = config
            .control_plane_id
            .clone()
            .map(|identifier| ControlPlane { identifier });

        Self {
            ctx: StreamContext::new(),
            cache: Arc::clone(&state.cache),
            authorizer: Arc::clone(&state.authorizer),
            metrics: state.metrics.clone(),
            responses,
            control_plane,
            token,
            state: SessionState::Init,
            identity: None,
            watch: None,
            indexed: None,
            trackers,
            nonces: NonceGenerator::new(),
            limiter,
            shutdown: state.shutdown.shutdown_signal(),
            _operation: state.shutdown.register_operation(),
            _tracker: SessionTracker::new(state.metrics.clone()),
            config,
        }
    }

    /// The session's stream ID.
    #[inline]
    pub fn id(&self) -> StreamId {
        self.ctx.id()
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serve `inbound` until the peer goes away or the session fails.
    ///
    /// On failure the matching status is also sent to the client before the
    /// response stream closes.
    pub async fn run<S>(mut self, inbound: S) -> XdsResult<()>
    where
        S: Stream<Item = Result<DeltaDiscoveryRequest, Status>> + Send + Unpin + 'static,
    {
        info!(stream = %self.ctx.id(), "delta session started");

        let (stop_tx, stop_rx) = watch::channel(false);
        let (queue_tx, mut queue) = mpsc::channel(self.config.inbound_queue_size);
        let reader = tokio::spawn(read_inbound(inbound, queue_tx, stop_rx, self.ctx.id()));

        let result = self.drive(&mut queue).await;

        let _ = stop_tx.send(true);
        drop(queue);
        if let Err(e) = reader.await {
            debug!(stream = %self.ctx.id(), error = %e, "inbound reader did not finish cleanly");
        }
        if let Some(watch) = self.watch.take() {
            self.cache.cancel_watch(watch.id());
        }

        self.finish(result).await
    }

    async fn drive(&mut self, queue: &mut mpsc::Receiver<Inbound>) -> XdsResult<()> {
        // interval_at panics on a zero period.
        let period = self.config.reauth_interval.max(Duration::from_millis(1));
        let mut reauth = interval_at(Instant::now() + period, period);
        reauth.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                biased;
                _ = self.shutdown.wait() => Event::Shutdown,
                _ = self.limiter.drained() => Event::Drained,
                snapshot = next_snapshot(&mut self.watch) => match snapshot {
                    Some(snapshot) => Event::Snapshot(snapshot),
                    None => Event::WatchClosed,
                },
                item = queue.recv() => match item {
                    Some(Ok(request)) => Event::Request(request),
                    Some(Err(e)) => Event::InboundFailed(e),
                    None => Event::PeerClosed,
                },
                _ = reauth.tick() => Event::Reauth,
            };

            let emit = match event {
                Event::Request(request) => self.handle_request(request).await?,
                Event::Snapshot(snapshot) => {
                    self.handle_snapshot(snapshot)?;
                    true
                }
                Event::Reauth => true,
                Event::PeerClosed => return Ok(()),
                Event::InboundFailed(e) => return Err(e),
                Event::WatchClosed => {
                    return Err(XdsError::UpstreamClosed {
                        node_id: self.node_label().to_string(),
                    })
                }
                Event::Shutdown => return Err(shutting_down()),
                Event::Drained => return Err(drained()),
            };

            if !emit || self.state != SessionState::Running {
                continue;
            }
            self.reauthorize().await?;
            if !self.emit().await? {
                return Ok(());
            }
        }
    }

    /// Apply one request. Returns whether this iteration may emit.
    async fn handle_request(&mut self, request: DeltaDiscoveryRequest) -> XdsResult<bool> {
        if self.state == SessionState::Init {
            self.start(&request).await?;
        }

        let resource_type = TypeUrl::new(request.type_url.as_str()).resource_type()?;
        self.ctx.on_request(resource_type);
        self.metrics.record_request(resource_type);

        trace!(
            stream = %self.ctx.id(),
            type_url = %request.type_url,
            subscribe = ?request.resource_names_subscribe,
            unsubscribe = ?request.resource_names_unsubscribe,
            nonce = %request.response_nonce,
            "received Delta request"
        );

        match self.trackers[resource_type].recv(&request) {
            RecvOutcome::Nack => {
                self.ctx.on_nack(resource_type);
                self.metrics.record_nack(resource_type);
                warn!(
                    stream = %self.ctx.id(),
                    type_url = %request.type_url,
                    nonce = %request.response_nonce,
                    error = request.error_detail.as_ref().map_or("", |e| e.message.as_str()),
                    "received NACK for Delta response"
                );
                Ok(false)
            }
            RecvOutcome::Ack(applied) => {
                self.ctx.on_ack(resource_type);
                self.metrics.record_ack(resource_type);
                debug!(
                    stream = %self.ctx.id(),
                    type_url = %request.type_url,
                    nonce = %request.response_nonce,
                    applied = applied.len(),
                    "received ACK for Delta response"
                );
                if self.config.child_resend && !applied.is_empty() {
                    let resent =
                        ChildInvalidator::apply(&mut self.trackers, resource_type, &applied);
                    if let Some(relation) = relation_for(resource_type).filter(|_| resent > 0) {
                        self.metrics.record_child_resends(relation.child, resent);
                    }
                }
                Ok(true)
            }
            RecvOutcome::NewSubscription | RecvOutcome::Ignore => Ok(true),
        }
    }

    /// Identify, authorize and start watching on the first request.
    async fn start(&mut self, request: &DeltaDiscoveryRequest) -> XdsResult<()> {
        let node_id = request
            .node
            .as_ref()
            .map(|node| node.id.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| XdsError::InvalidRequest {
                reason: "first request must carry node.id".into(),
            })?;

        let identity = SessionIdentity::new(node_id, self.token.take());
        self.authorizer.authorize(&identity).await?;

        self.watch = Some(self.cache.create_watch(identity.node_hash));
        self.identity = Some(identity);
        self.state = SessionState::PendingInitialSnapshot;

        info!(
            stream = %self.ctx.id(),
            node = self.node_label(),
            "session identified, waiting for snapshot"
        );
        Ok(())
    }

    fn handle_snapshot(&mut self, snapshot: SharedSnapshot) -> XdsResult<()> {
        let indexed = IndexedSnapshot::build(snapshot)?;
        debug!(
            stream = %self.ctx.id(),
            version = indexed.snapshot().version(),
            resources = indexed.snapshot().total_resources(),
            "indexed snapshot"
        );
        self.indexed = Some(indexed);

        if self.state == SessionState::PendingInitialSnapshot {
            self.state = SessionState::Running;
            debug!(stream = %self.ctx.id(), "initial snapshot received");
        }
        Ok(())
    }

    /// Node ID for log fields, `-` before the first request names it.
    fn node_label(&self) -> &str {
        self.identity
            .as_ref()
            .map_or("-", |identity| identity.node_id.as_str())
    }

    async fn reauthorize(&self) -> XdsResult<()> {
        match &self.identity {
            Some(identity) => self.authorizer.authorize(identity).await,
            None => Ok(()),
        }
    }

    /// One pass over [`UPDATE_ORDER`]. Returns `false` if the client closed
    /// its side of the response stream.
    async fn emit(&mut self) -> XdsResult<bool> {
        let Some(indexed) = self.indexed.as_ref() else {
            return Ok(true);
        };

        for step in UPDATE_ORDER {
            if let Some(blocker) = step.blocked_by(&self.trackers) {
                trace!(
                    stream = %self.ctx.id(),
                    type_url = step.resource_type.type_url(),
                    blocked_by = blocker.type_url(),
                    "skipping step while dependency is pending"
                );
                continue;
            }

            let tracker = &mut self.trackers[step.resource_type];
            let Some(mut response) =
                tracker.send(indexed, &mut self.nonces, step.upsert, step.remove)?
            else {
                continue;
            };
            response.control_plane = self.control_plane.clone();

            let permit = tokio::select! {
                biased;
                _ = self.shutdown.wait() => return Err(shutting_down()),
                _ = self.limiter.drained() => return Err(drained()),
                permit = self.responses.reserve() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        debug!(stream = %self.ctx.id(), "response stream closed by peer");
                        return Ok(false);
                    }
                },
            };

            let (resources, removed) = (response.resources.len(), response.removed_resources.len());
            self.ctx.on_response(step.resource_type, resources, removed);
            self.metrics.record_response(step.resource_type, resources, removed);
            info!(
                stream = %self.ctx.id(),
                type_url = %response.type_url,
                nonce = %response.nonce,
                resources,
                removed,
                "sending Delta response"
            );
            permit.send(Ok(response));
        }
        Ok(true)
    }

    async fn finish(self, result: XdsResult<()>) -> XdsResult<()> {
        let stream = self.ctx.id();
        let node = self.node_label();

        for (kind, traffic) in self.ctx.active_types() {
            debug!(
                stream = %stream,
                type_url = kind.type_url(),
                requests = traffic.requests,
                acks = traffic.acks,
                nacks = traffic.nacks,
                responses = traffic.responses,
                resources = traffic.resources_sent,
                removed = traffic.removals_sent,
                "delta session traffic"
            );
        }

        match &result {
            Ok(()) => {
                self.metrics.session_ended(code_label(Code::Ok));
                let totals = self.ctx.totals();
                info!(
                    stream = %stream,
                    node,
                    requests = totals.requests,
                    responses = totals.responses,
                    duration_ms = self.ctx.age().as_millis() as u64,
                    "delta session closed"
                );
            }
            Err(e) => {
                let status = e.to_status();
                self.metrics.session_ended(code_label(status.code()));
                match status.code() {
                    Code::Unavailable | Code::Internal => {
                        error!(stream = %stream, node, error = %e, "delta session failed")
                    }
                    _ => warn!(stream = %stream, node, error = %e, "delta session ended"),
                }
                if self
                    .responses
                    .send_timeout(Err(status), FINAL_STATUS_TIMEOUT)
                    .await
                    .is_err()
                {
                    debug!(stream = %stream, "final status not delivered");
                }
            }
        }

        result
    }
}

fn shutting_down() -> XdsError {
    XdsError::Overloaded {
        reason: "server is shutting down".into(),
    }
}

fn drained() -> XdsError {
    XdsError::Overloaded {
        reason: "session drained to shed load".into(),
    }
}

async fn next_snapshot(watch: &mut Option<Watch>) -> Option<SharedSnapshot> {
    match watch {
        Some(watch) => watch.recv().await,
        None => std::future::pending().await,
    }
}

/// Forward inbound requests to the session until told to stop.
async fn read_inbound<S>(
    mut inbound: S,
    queue: mpsc::Sender<Inbound>,
    mut stop: watch::Receiver<bool>,
    stream: StreamId,
) where
    S: Stream<Item = Result<DeltaDiscoveryRequest, Status>> + Send + Unpin + 'static,
{
    loop {
        let item = tokio::select! {
            biased;
            _ = stop.changed() => break,
            item = inbound.next() => item,
        };
        let Some(item) = item else {
            debug!(stream = %stream, "inbound stream closed by peer");
            break;
        };

        let failed = item.is_err();
        let item = item.map_err(|status| XdsError::transport("inbound stream failed", status));
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            sent = queue.send(item) => if sent.is_err() { break },
        }
        if failed {
            break;
        }
    }
}

fn code_label(code: Code) -> &'static str {
    match code {
        Code::Ok => "ok",
        Code::InvalidArgument => "invalid_argument",
        Code::PermissionDenied => "permission_denied",
        Code::ResourceExhausted => "resource_exhausted",
        Code::Aborted => "aborted",
        Code::Unavailable => "unavailable",
        Code::Internal => "internal",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::wrappers::ReceiverStream;
    use xds_cache::Snapshot;
    use xds_core::{AnyResource, NodeHash, ResourceType};
    use xds_types::envoy::config::core::v3::Node;

    use crate::auth::AllowAll;
    use crate::shutdown::ShutdownController;

    fn wildcard(kind: ResourceType, with_node: bool) -> DeltaDiscoveryRequest {
        DeltaDiscoveryRequest {
            node: with_node.then(|| Node {
                id: "n1".into(),
                cluster: "test".into(),
            }),
            type_url: kind.type_url().into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn full_response_channel_still_sees_shutdown() {
        let cache = Arc::new(ShardedCache::new());
        let shutdown = ShutdownController::new();
        let state = ServiceState::new(
            Arc::clone(&cache),
            ServerConfig::default(),
            Arc::new(AllowAll),
            shutdown.clone(),
        );
        cache.set_snapshot(
            NodeHash::from_id("n1"),
            Snapshot::builder()
                .version("v1")
                .resource(AnyResource::from_bytes(ResourceType::Secret, "s1", vec![1]).boxed())
                .resource(AnyResource::from_bytes(ResourceType::Cluster, "c1", vec![2]).boxed())
                .build(),
        );

        // Room for one response only, which the client never reads.
        let (tx, mut responses) = mpsc::channel(1);
        let session = DeltaSession::new(&state, state.limiter.begin().unwrap(), None, tx);
        let (client, requests) = mpsc::channel(4);
        client.send(Ok(wildcard(ResourceType::Secret, true))).await.unwrap();
        client.send(Ok(wildcard(ResourceType::Cluster, false))).await.unwrap();
        let task = tokio::spawn(session.run(ReceiverStream::new(requests)));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let stopping = tokio::spawn(async move { shutdown.shutdown(Duration::from_secs(2)).await });

        let first = responses.recv().await.unwrap().unwrap();
        assert_eq!(first.type_url, ResourceType::Secret.type_url());
        let status = responses.recv().await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::ResourceExhausted);
        assert!(responses.recv().await.is_none());

        let result = task.await.unwrap();
        assert!(matches!(result, Err(XdsError::Overloaded { .. })));
        assert!(stopping.await.unwrap());
        drop(client);
    }

    #[test]
    fn code_labels() {
        assert_eq!(code_label(Code::Ok), "ok");
        assert_eq!(code_label(Code::ResourceExhausted), "resource_exhausted");
        assert_eq!(code_label(Code::DataLoss), "other");
    }

    #[tokio::test]
    async fn reader_stops_on_flag() {
        let (_client, requests) = mpsc::channel::<Result<DeltaDiscoveryRequest, Status>>(1);
        let inbound = ReceiverStream::new(requests);
        let (queue_tx, mut queue) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);

        let reader = tokio::spawn(read_inbound(inbound, queue_tx, stop_rx, StreamId::next()));
        stop_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("reader should stop")
            .unwrap();
        assert!(queue.recv().await.is_none());
    }

    #[tokio::test]
    async fn reader_forwards_error_then_stops() {
        let (client, requests) = mpsc::channel(2);
        let inbound = ReceiverStream::new(requests);
        let (queue_tx, mut queue) = mpsc::channel(2);
        let (_stop_tx, stop_rx) = watch::channel(false);

        client.send(Err(Status::cancelled("gone"))).await.unwrap();
        let reader = tokio::spawn(read_inbound(inbound, queue_tx, stop_rx, StreamId::next()));

        let item = queue.recv().await.unwrap();
        assert!(matches!(item, Err(XdsError::TransportError { .. })));
        reader.await.unwrap();
        assert!(queue.recv().await.is_none());
        drop(client);
    }
}
