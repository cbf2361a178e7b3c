//! Graceful shutdown coordination.
//!
//! A [`ShutdownSignal`] is shared by the accept loop and every connection
//! task. Triggering it stops accepting, asks open connections to finish their
//! in-flight exchange, and lets [`ConnectionTracker`] report when the last one
//! has gone.
//!
//! ```rust
//! use courier_server::ShutdownSignal;
//!
//! let shutdown = ShutdownSignal::new();
//! let worker = shutdown.clone();
//!
//! shutdown.trigger();
//! assert!(worker.is_shutdown());
//! ```

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable, one-shot shutdown flag.
///
/// Every clone observes the same flag. Once triggered it stays triggered.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    state: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Triggers shutdown.
    ///
    /// Returns `true` for the call that flipped the flag and `false` for every
    /// later one.
    pub fn trigger(&self) -> bool {
        self.state.send_if_modified(|triggered| {
            if *triggered {
                false
            } else {
                *triggered = true;
                true
            }
        })
    }

    /// Returns `true` once shutdown has been triggered.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.state.borrow()
    }

    /// Completes once shutdown has been triggered, immediately if it already
    /// was.
    pub async fn recv(&self) {
        let mut rx = self.state.subscribe();
        // `self` keeps the sender alive, so this only returns on trigger.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    /// Creates a signal that triggers on SIGTERM or SIGINT.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn with_os_signals() -> Self {
        let signal = Self::new();
        let trigger = signal.clone();

        tokio::spawn(async move {
            match wait_for_os_signal().await {
                Ok(name) => {
                    tracing::info!(signal = name, "Received shutdown signal, draining connections");
                    trigger.trigger();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to register signal handlers; OS signals will be ignored");
                }
            }
        });

        signal
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_os_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_os_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Counts open connections so shutdown can wait for them to drain.
///
/// ```rust
/// use courier_server::shutdown::ConnectionTracker;
///
/// let tracker = ConnectionTracker::new();
/// let token = tracker.acquire();
/// assert_eq!(tracker.active_connections(), 1);
///
/// drop(token);
/// assert_eq!(tracker.active_connections(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    open: Arc<watch::Sender<usize>>,
}

impl ConnectionTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        let (open, _) = watch::channel(0);
        Self {
            open: Arc::new(open),
        }
    }

    /// Registers a connection; it stays counted until the token is dropped.
    #[must_use]
    pub fn acquire(&self) -> ConnectionToken {
        self.open.send_modify(|open| *open += 1);
        ConnectionToken {
            open: Arc::clone(&self.open),
        }
    }

    /// Returns the number of open connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        *self.open.borrow()
    }

    /// Completes once no connection is open.
    pub async fn drained(&self) {
        let mut rx = self.open.subscribe();
        let _ = rx.wait_for(|open| *open == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A live connection registered with a [`ConnectionTracker`].
#[derive(Debug)]
pub struct ConnectionToken {
    open: Arc<watch::Sender<usize>>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        self.open.send_modify(|open| *open -= 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_only_first_trigger_reports_transition() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutdown());

        assert!(signal.trigger());
        assert!(!signal.trigger());
        assert!(signal.is_shutdown());
    }

    #[test]
    fn test_clones_share_the_flag() {
        let signal = ShutdownSignal::default();
        let other = signal.clone();

        other.trigger();
        assert!(signal.is_shutdown());
    }

    #[tokio::test]
    async fn test_recv_on_clone_completes_after_trigger_from_another_task() {
        let signal = ShutdownSignal::new();
        let waiter = signal.clone();
        let trigger = signal.clone();

        let waiting = tokio::spawn(async move { waiter.recv().await });

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });

        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("recv should complete")
            .expect("task should not panic");
    }

    #[tokio::test]
    async fn test_recv_completes_immediately_if_triggered() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        tokio::time::timeout(Duration::from_millis(10), signal.clone().recv())
            .await
            .expect("recv should complete immediately");
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_pends_until_triggered() {
        let signal = ShutdownSignal::new();

        let result = tokio::time::timeout(Duration::from_secs(5), signal.recv()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_tracker_counts_tokens() {
        let tracker = ConnectionTracker::default();
        let first = tracker.acquire();
        let second = tracker.clone().acquire();
        assert_eq!(tracker.active_connections(), 2);

        drop(first);
        assert_eq!(tracker.active_connections(), 1);
        drop(second);
        assert_eq!(tracker.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_drained_immediate_when_idle() {
        let tracker = ConnectionTracker::new();

        tokio::time::timeout(Duration::from_millis(10), tracker.drained())
            .await
            .expect("drained should complete immediately");
    }

    #[tokio::test]
    async fn test_drained_after_last_token() {
        let tracker = ConnectionTracker::new();
        let first = tracker.acquire();
        let second = tracker.acquire();

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.drained().await })
        };

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            drop(first);
            tokio::time::sleep(Duration::from_millis(5)).await;
            drop(second);
        });

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("drained should complete")
            .expect("task should not panic");
        assert_eq!(tracker.active_connections(), 0);
    }
}
