//! Task runtime shared by the comms channels.
//!
//! Every channel (console, HTTP) is a [`Component`] that owns its state and
//! runs until the shared [`CancellationToken`] fires.  [`spawn_components`]
//! starts them side by side and hands back a [`SubsystemHandle`]; one channel
//! failing cancels the token so the rest drain and the process can exit.

use std::future::Future;
use std::pin::Pin;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::AppError;

// ── Component ─────────────────────────────────────────────────────────────────

/// Boxed run-loop returned by [`Component::run`].
pub type ComponentFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

/// An independently running channel.
///
/// Shared state (`Arc<CommsState>`) is captured at construction time;
/// [`Component::run`] is called exactly once.
pub trait Component: Send + 'static {
    /// Channel id used in logs, e.g. `pty0`.
    fn id(&self) -> &str;

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture;
}

// ── SubsystemHandle ───────────────────────────────────────────────────────────

/// Resolves once every spawned component has exited.
pub struct SubsystemHandle {
    inner: JoinHandle<Result<(), AppError>>,
}

impl SubsystemHandle {
    /// The first component error, if any.
    pub async fn join(self) -> Result<(), AppError> {
        self.inner
            .await
            .map_err(|e| AppError::Comms(format!("comms manager task failed: {e}")))?
    }
}

// ── spawn_components ──────────────────────────────────────────────────────────

/// Spawn every component on the Tokio pool.
///
/// An error or panic in one component cancels `shutdown`; the rest are
/// drained and the first failure is returned.  With no components the handle
/// simply waits for `shutdown`, so a daemon with every channel disabled stays
/// up until Ctrl-C.
pub fn spawn_components(components: Vec<Box<dyn Component>>, shutdown: CancellationToken) -> SubsystemHandle {
    let inner = tokio::spawn(async move {
        if components.is_empty() {
            shutdown.cancelled().await;
            return Ok(());
        }

        let mut set: JoinSet<(String, Result<(), AppError>)> = JoinSet::new();
        for component in components {
            let id = component.id().to_string();
            debug!(channel = %id, "spawning channel");
            let run = component.run(shutdown.clone());
            set.spawn(async move { (id, run.await) });
        }

        let mut first_err: Option<AppError> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, Ok(()))) => info!(channel = %id, "channel exited"),
                Ok((id, Err(e))) => {
                    error!(channel = %id, error = %e, "channel failed");
                    shutdown.cancel();
                    first_err.get_or_insert(e);
                }
                Err(e) => {
                    error!(error = %e, "channel panicked");
                    shutdown.cancel();
                    first_err.get_or_insert_with(|| AppError::Comms(format!("channel panicked: {e}")));
                }
            }
        }

        first_err.map_or(Ok(()), Err)
    });

    SubsystemHandle { inner }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Waits for shutdown, or fails straight away when `fail` is set.
    struct StubChannel {
        id: &'static str,
        fail: bool,
    }

    impl Component for StubChannel {
        fn id(&self) -> &str {
            self.id
        }

        fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
            Box::pin(async move {
                if self.fail {
                    return Err(AppError::Comms(format!("{} could not bind", self.id)));
                }
                shutdown.cancelled().await;
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn failing_channel_stops_siblings() {
        let shutdown = CancellationToken::new();
        let components: Vec<Box<dyn Component>> = vec![
            Box::new(StubChannel { id: "pty0", fail: false }),
            Box::new(StubChannel { id: "http0", fail: true }),
        ];
        let handle = spawn_components(components, shutdown.clone());
        let result = tokio::time::timeout(Duration::from_secs(5), handle.join()).await.unwrap();
        assert!(matches!(result, Err(AppError::Comms(msg)) if msg.contains("http0")));
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn clean_shutdown_is_ok() {
        let shutdown = CancellationToken::new();
        let components: Vec<Box<dyn Component>> = vec![Box::new(StubChannel { id: "pty0", fail: false })];
        let handle = spawn_components(components, shutdown.clone());
        shutdown.cancel();
        assert!(handle.join().await.is_ok());
    }

    #[tokio::test]
    async fn no_channels_waits_for_shutdown() {
        let shutdown = CancellationToken::new();
        let handle = spawn_components(Vec::new(), shutdown.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.inner.is_finished());
        shutdown.cancel();
        assert!(handle.join().await.is_ok());
    }
}
