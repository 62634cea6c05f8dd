//! Stream numbering and per-type traffic accounting for delta sessions.

use std::fmt;
use std::iter::Sum;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use xds_core::{ResourceType, TypeMap};

static NEXT_STREAM: AtomicU64 = AtomicU64::new(1);

/// Process-unique number of a delta stream, logged as `stream-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    /// Allocate the next stream number.
    pub fn next() -> Self {
        Self(NEXT_STREAM.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw number.
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// What went over a stream for one resource type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeTraffic {
    /// Requests received, including ACKs and NACKs.
    pub requests: u64,
    /// Requests that acknowledged a pending response.
    pub acks: u64,
    /// Requests that rejected a pending response.
    pub nacks: u64,
    /// Responses sent.
    pub responses: u64,
    /// Resources carried by those responses.
    pub resources_sent: u64,
    /// Removals carried by those responses.
    pub removals_sent: u64,
}

impl Sum for TypeTraffic {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, t| Self {
            requests: acc.requests + t.requests,
            acks: acc.acks + t.acks,
            nacks: acc.nacks + t.nacks,
            responses: acc.responses + t.responses,
            resources_sent: acc.resources_sent + t.resources_sent,
            removals_sent: acc.removals_sent + t.removals_sent,
        })
    }
}

/// Bookkeeping a session keeps about its own stream.
///
/// Owned and mutated by the session task only.
#[derive(Debug)]
pub struct StreamContext {
    id: StreamId,
    opened: Instant,
    traffic: TypeMap<TypeTraffic>,
}

impl StreamContext {
    /// Open a context under a fresh stream number.
    pub fn new() -> Self {
        Self {
            id: StreamId::next(),
            opened: Instant::now(),
            traffic: TypeMap::default(),
        }
    }

    /// The stream number.
    #[inline]
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Time since the stream was accepted.
    pub fn age(&self) -> Duration {
        self.opened.elapsed()
    }

    /// Count a request for `resource_type`.
    pub fn on_request(&mut self, resource_type: ResourceType) {
        self.traffic[resource_type].requests += 1;
    }

    /// Count an ACK.
    pub fn on_ack(&mut self, resource_type: ResourceType) {
        self.traffic[resource_type].acks += 1;
    }

    /// Count a NACK.
    pub fn on_nack(&mut self, resource_type: ResourceType) {
        self.traffic[resource_type].nacks += 1;
    }

    /// Count a response and what it carried.
    pub fn on_response(&mut self, resource_type: ResourceType, resources: usize, removals: usize) {
        let traffic = &mut self.traffic[resource_type];
        traffic.responses += 1;
        traffic.resources_sent += resources as u64;
        traffic.removals_sent += removals as u64;
    }

    /// Traffic for one type.
    pub fn traffic(&self, resource_type: ResourceType) -> &TypeTraffic {
        &self.traffic[resource_type]
    }

    /// Traffic summed over every type.
    pub fn totals(&self) -> TypeTraffic {
        self.traffic.iter().map(|(_, t)| *t).sum()
    }

    /// Types that saw any request, with their traffic.
    pub fn active_types(&self) -> impl Iterator<Item = (ResourceType, &TypeTraffic)> {
        self.traffic.iter().filter(|(_, t)| t.requests > 0)
    }
}

impl Default for StreamContext {
    fn default() -> Self {
        Self::new()
    }
}
