//! Aggregated Discovery Service (ADS) implementation.
//!
//! ADS multiplexes all xDS resource types over a single gRPC stream. This
//! server only speaks the delta variant; each stream becomes one
//! [`DeltaSession`].

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, instrument, warn};

use xds_core::XdsError;
use xds_types::envoy::service::discovery::v3::{DeltaDiscoveryRequest, DeltaDiscoveryResponse};

use super::ServiceState;
use crate::config::MIN_RESPONSE_BUFFER;
use crate::delta::DeltaSession;
use crate::utils::token_from_metadata;

/// Response stream type for delta ADS.
pub type DeltaResponseStream = ReceiverStream<Result<DeltaDiscoveryResponse, Status>>;

/// Trait for the ADS delta endpoint.
///
/// Mirrors the shape of tonic's generated service trait so the service can
/// be mounted behind any transport that produces a request stream.
#[async_trait]
pub trait AggregatedDiscoveryService: Send + Sync + 'static {
    /// Server streaming response type for DeltaAggregatedResources.
    type DeltaAggregatedResourcesStream: Stream<Item = Result<DeltaDiscoveryResponse, Status>>
        + Send
        + 'static;

    /// Bidirectional streaming RPC for delta xDS.
    async fn delta_aggregated_resources(
        &self,
        request: Request<Streaming<DeltaDiscoveryRequest>>,
    ) -> Result<Response<Self::DeltaAggregatedResourcesStream>, Status>;
}

/// Aggregated Discovery Service.
#[derive(Debug, Clone)]
pub struct AdsService {
    state: ServiceState,
}

impl AdsService {
    /// Create a new ADS service over shared state.
    pub fn new(state: ServiceState) -> Self {
        Self { state }
    }

    /// Shared state.
    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    /// Admit a session for `inbound` and return its response stream.
    ///
    /// The session runs on its own task. Admission fails with
    /// `RESOURCE_EXHAUSTED` while shutting down or at the session limit.
    #[allow(clippy::result_large_err)]
    pub fn open_session<S>(
        &self,
        inbound: S,
        token: Option<String>,
    ) -> Result<DeltaResponseStream, Status>
    where
        S: Stream<Item = Result<DeltaDiscoveryRequest, Status>> + Send + Unpin + 'static,
    {
        if self.state.shutdown.is_shutdown() {
            self.state.metrics.session_rejected("shutdown");
            return Err(XdsError::Overloaded {
                reason: "server is shutting down".into(),
            }
            .into());
        }

        let guard = self.state.limiter.begin().map_err(|e| {
            self.state.metrics.session_rejected("overloaded");
            warn!(error = %e, "refusing delta session");
            Status::from(e)
        })?;

        let (tx, rx) = mpsc::channel(self.state.config.response_buffer_size.max(MIN_RESPONSE_BUFFER));
        let session = DeltaSession::new(&self.state, guard, token, tx);
        let id = session.id();
        debug!(stream = %id, "delta session admitted");

        tokio::spawn(async move {
            // Failures are logged and reported to the client by the session.
            let _ = session.run(inbound).await;
        });

        Ok(ReceiverStream::new(rx))
    }
}

#[async_trait]
impl AggregatedDiscoveryService for AdsService {
    type DeltaAggregatedResourcesStream = DeltaResponseStream;

    #[instrument(skip(self, request), name = "ads_delta_stream")]
    async fn delta_aggregated_resources(
        &self,
        request: Request<Streaming<DeltaDiscoveryRequest>>,
    ) -> Result<Response<Self::DeltaAggregatedResourcesStream>, Status> {
        let token = token_from_metadata(request.metadata());
        let stream = self.open_session(request.into_inner(), token)?;
        Ok(Response::new(stream))
    }
}
