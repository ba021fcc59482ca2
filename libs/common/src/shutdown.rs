//! Shutdown utilities
//!
//! Two kinds of shutdown exist in the host:
//! - an operator stop (Ctrl+C / SIGTERM), awaited with [`wait_for_shutdown`]
//! - a fatal control-system shutdown, raised through a [`ShutdownSink`]
//!
//! The second one is not an error return. Anything that detects the running
//! system no longer matches its configuration calls
//! [`ShutdownSink::invoke_shutdown`] and the whole control loop stops.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Fatal shutdown channel for the control system
pub trait ShutdownSink: Send + Sync {
    /// Shut down the whole control system with the given reason.
    ///
    /// Must not block. Calls after the first are ignored.
    fn invoke_shutdown(&self, reason: &str);
}

/// Process-wide shutdown state
///
/// The first reason wins; later calls are logged and dropped.
/// Clones share state.
#[derive(Clone, Default)]
pub struct ShutdownController {
    inner: Arc<ShutdownInner>,
}

#[derive(Default)]
struct ShutdownInner {
    reason: Mutex<Option<String>>,
    token: CancellationToken,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a shutdown has been invoked
    pub fn is_shutdown(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Reason passed to the first `invoke_shutdown` call
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }

    /// Token cancelled when the system shuts down
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Resolve once a shutdown has been invoked
    pub async fn wait(&self) {
        self.inner.token.cancelled().await;
    }
}

impl ShutdownSink for ShutdownController {
    fn invoke_shutdown(&self, reason: &str) {
        {
            let mut slot = self.inner.reason.lock();
            if let Some(first) = slot.as_ref() {
                debug!("Shutdown already in progress ({}), ignoring: {}", first, reason);
                return;
            }
            *slot = Some(reason.to_string());
        }
        error!("Control system shutdown: {}", reason);
        self.inner.token.cancel();
    }
}

impl std::fmt::Debug for ShutdownController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownController")
            .field("is_shutdown", &self.is_shutdown())
            .field("reason", &self.reason())
            .finish()
    }
}

/// Wait for an operator stop signal (Ctrl+C or SIGTERM on Unix)
///
/// # Example
///
/// ```ignore
/// tokio::select! {
///     _ = common::shutdown::wait_for_shutdown() => {
///         info!("Shutdown signal received");
///     }
///     _ = controller.wait() => {}
/// }
/// ```
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!(
                    "Failed to install SIGTERM handler: {}. Only Ctrl+C will stop the host",
                    e
                );
                None
            },
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(mut sig) = term_signal {
                    sig.recv().await;
                } else {
                    std::future::pending::<()>().await
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_reason_wins() {
        let controller = ShutdownController::new();
        assert!(!controller.is_shutdown());
        assert_eq!(controller.reason(), None);

        controller.invoke_shutdown("first");
        controller.invoke_shutdown("second");

        assert!(controller.is_shutdown());
        assert_eq!(controller.reason().as_deref(), Some("first"));
    }

    #[test]
    fn test_clones_share_state() {
        let controller = ShutdownController::new();
        let sink: Arc<dyn ShutdownSink> = Arc::new(controller.clone());

        sink.invoke_shutdown("from a clone");

        assert!(controller.is_shutdown());
        assert_eq!(controller.reason().as_deref(), Some("from a clone"));
    }

    #[tokio::test]
    async fn test_wait_resolves_after_invoke() {
        let controller = ShutdownController::new();
        let waiter = controller.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });

        controller.invoke_shutdown("stop");

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("wait() did not resolve")
            .unwrap();
    }
}
