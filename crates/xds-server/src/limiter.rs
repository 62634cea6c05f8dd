//! Session admission and load shedding.
//!
//! A [`SessionLimiter`] caps the number of concurrent delta sessions. When
//! the cap is lowered below the number of live sessions, the newest excess
//! sessions are told to end so their clients reconnect to another server.
//!
//! # Example
//!
//! ```rust,ignore
//! use xds_server::limiter::SessionLimiter;
//!
//! let limiter = SessionLimiter::new(Some(1000));
//!
//! match limiter.begin() {
//!     Ok(guard) => { /* run the session, holding the guard */ }
//!     Err(e) => { /* at capacity: resource exhausted */ }
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};
use xds_core::{XdsError, XdsResult};

/// Limits concurrent sessions and drains sessions on demand.
#[derive(Debug, Clone)]
pub struct SessionLimiter {
    inner: Arc<LimiterInner>,
}

#[derive(Debug)]
struct LimiterInner {
    /// Counter for generating session IDs. Later sessions get larger IDs.
    next_id: AtomicU64,
    /// Current cap and the live sessions with their drain flags.
    state: Mutex<LimiterState>,
}

#[derive(Debug)]
struct LimiterState {
    max_sessions: Option<usize>,
    sessions: BTreeMap<u64, watch::Sender<bool>>,
}

impl Default for SessionLimiter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionLimiter {
    /// Create a limiter. `None` means unlimited.
    pub fn new(max_sessions: Option<usize>) -> Self {
        Self {
            inner: Arc::new(LimiterInner {
                next_id: AtomicU64::new(1),
                state: Mutex::new(LimiterState {
                    max_sessions,
                    sessions: BTreeMap::new(),
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, LimiterState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The current cap.
    pub fn max_sessions(&self) -> Option<usize> {
        self.state().max_sessions
    }

    /// Number of sessions holding a slot.
    pub fn active_sessions(&self) -> usize {
        self.state().sessions.len()
    }

    /// Admit a new session.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::Overloaded`] when the cap is reached.
    pub fn begin(&self) -> XdsResult<SessionGuard> {
        let mut state = self.state();

        if let Some(max) = state.max_sessions {
            if state.sessions.len() >= max {
                warn!(
                    active = state.sessions.len(),
                    limit = max,
                    "session rejected: at max sessions"
                );
                return Err(XdsError::Overloaded {
                    reason: format!("session limit of {max} reached"),
                });
            }
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(false);
        state.sessions.insert(id, tx);

        debug!(id, active = state.sessions.len(), "session admitted");

        Ok(SessionGuard {
            limiter: self.clone(),
            id,
            drained: rx,
        })
    }

    /// Change the cap, draining the newest sessions above it.
    ///
    /// Returns the number of drained sessions. Drained sessions give up their
    /// slot immediately.
    pub fn set_max_sessions(&self, max_sessions: Option<usize>) -> usize {
        let mut state = self.state();
        state.max_sessions = max_sessions;

        let Some(max) = max_sessions else {
            return 0;
        };
        let excess = state.sessions.len().saturating_sub(max);
        let newest: Vec<u64> = state.sessions.keys().rev().take(excess).copied().collect();
        for id in &newest {
            if let Some(drain) = state.sessions.remove(id) {
                drain.send_replace(true);
            }
        }

        if !newest.is_empty() {
            info!(
                drained = newest.len(),
                limit = max,
                "draining sessions above new limit"
            );
        }
        newest.len()
    }

    fn release(&self, id: u64) {
        let mut state = self.state();
        if state.sessions.remove(&id).is_some() {
            debug!(id, active = state.sessions.len(), "session released");
        }
    }
}

/// A session's slot in the limiter.
///
/// Releases the slot when dropped.
#[derive(Debug)]
pub struct SessionGuard {
    limiter: SessionLimiter,
    id: u64,
    drained: watch::Receiver<bool>,
}

impl SessionGuard {
    /// The limiter-assigned session ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the limiter asked this session to end.
    pub fn is_drained(&self) -> bool {
        *self.drained.borrow()
    }

    /// Resolves once the limiter asks this session to end.
    pub async fn drained(&mut self) {
        // The drain flag is set before the sender is dropped, so a closed
        // channel also means drained.
        let _ = self.drained.wait_for(|drained| *drained).await;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.limiter.release(self.id);
    }
}
