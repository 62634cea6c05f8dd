//! Server-wide stop signal and session accounting.
//!
//! Every running session holds an [`OperationGuard`] and a
//! [`ShutdownSignal`]. [`ShutdownController::shutdown`] raises the signal
//! once; sessions see it from their select loop, tell the client to go to
//! another server and drop their guard. The controller returns when the
//! guard count reaches zero or the grace period runs out.
//!
//! ```rust,ignore
//! let controller = ShutdownController::new();
//! let _guard = controller.register_operation();
//! let mut signal = controller.shutdown_signal();
//!
//! tokio::select! {
//!     _ = signal.wait() => { /* end with RESOURCE_EXHAUSTED */ }
//!     _ = serve() => {}
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Raises the stop signal and waits for sessions to let go.
///
/// Clones share state; the server, the ADS service and every session see
/// the same controller.
#[derive(Debug, Clone)]
pub struct ShutdownController {
    inner: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    /// `true` once shutdown started. Never reset.
    stopping: watch::Sender<bool>,
    /// Sessions still holding a guard.
    sessions: watch::Sender<usize>,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    /// A controller with no sessions and the signal lowered.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Shared {
                stopping: watch::Sender::new(false),
                sessions: watch::Sender::new(0),
            }),
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shutdown(&self) -> bool {
        *self.inner.stopping.borrow()
    }

    /// A handle a session can await in its select loop.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.inner.stopping.subscribe(),
        }
    }

    /// Raise the signal and wait up to `grace_period` for every session to
    /// drop its guard.
    ///
    /// Returns `false` if sessions were still running when the grace period
    /// ran out. Only the first call waits; later calls return `true` at once.
    pub async fn shutdown(&self, grace_period: Duration) -> bool {
        if self.inner.stopping.send_replace(true) {
            debug!("shutdown already in progress");
            return true;
        }

        let mut sessions = self.inner.sessions.subscribe();
        info!(
            sessions = *sessions.borrow(),
            grace_period = ?grace_period,
            "stop signal raised, waiting for sessions"
        );

        let drained = match timeout(grace_period, sessions.wait_for(|active| *active == 0)).await {
            Ok(_) => {
                info!("all sessions ended");
                true
            }
            Err(_) => {
                warn!(
                    remaining = self.active_operations(),
                    "grace period elapsed with sessions still running"
                );
                false
            }
        };
        drained
    }

    /// Count a session until the returned guard drops.
    pub fn register_operation(&self) -> OperationGuard {
        self.inner.sessions.send_modify(|active| *active += 1);
        OperationGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Sessions currently holding a guard.
    pub fn active_operations(&self) -> usize {
        *self.inner.sessions.borrow()
    }
}

/// Keeps a session counted by its [`ShutdownController`].
#[derive(Debug)]
pub struct OperationGuard {
    inner: Arc<Shared>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.inner
            .sessions
            .send_modify(|active| *active = active.saturating_sub(1));
    }
}

/// Resolves once the stop signal is raised.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Whether the signal is raised.
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the signal. Resolves immediately on every call after it is
    /// raised, so it can sit in a `select!` loop.
    pub async fn wait(&mut self) {
        // The controller outlives its sessions; a closed channel means stop.
        let _ = self.rx.wait_for(|stopping| *stopping).await;
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C off unix).
///
/// # Errors
///
/// Fails if the signal handlers cannot be installed.
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!(signal = name, "received stop signal");
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!(signal = "ctrl-c", "received stop signal");
    }

    Ok(())
}
