//! Comms subsystem: the customer-facing channels of the loan desk.
//!
//! The console (`pty0`, only with `-i`) and the HTTP API (`http0`) are both
//! [`Component`]s holding an `Arc<CommsState>`.  That state is the only way a
//! channel reaches the [`LoanDesk`]; channels never see the back-office
//! directly.  Channels report lifecycle events on a small mpsc queue which
//! [`start`] drains into debug logs.

#[cfg(feature = "channel-axum")]
pub mod axum_channel;
#[cfg(feature = "channel-pty")]
pub mod pty;
mod state;

pub use state::{CommsEvent, CommsState, HealthReport};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::subsystems::desk::LoanDesk;
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};

// ── start ───────────────────────────────────────────────────────────────────

/// Spawn the enabled channels.  Returns immediately; the handle resolves
/// once every channel has stopped, or on the first channel error (which also
/// cancels `shutdown`).
pub fn start(config: &Config, desk: Arc<LoanDesk>, shutdown: CancellationToken) -> SubsystemHandle {
    let (event_tx, event_rx) = mpsc::channel::<CommsEvent>(32);
    let state = Arc::new(CommsState::new(desk, event_tx));

    let mut components: Vec<Box<dyn Component>> = Vec::new();

    #[cfg(feature = "channel-pty")]
    {
        if config.comms_pty_should_load() {
            info!("loading pty channel");
            components.push(Box::new(pty::PtyChannel::new("pty0", state.clone())));
        }
    }

    #[cfg(feature = "channel-axum")]
    {
        if config.comms_http_should_load() {
            info!(bind = %config.comms.http.bind, "loading axum channel");
            components.push(Box::new(axum_channel::AxumChannel::new(
                "http0",
                config.comms.http.bind.clone(),
                state.clone(),
            )));
        }
    }

    if components.is_empty() {
        info!("all channels disabled; idling until shutdown");
    }

    // Ends when the last channel drops its sender.
    tokio::spawn(async move {
        let mut rx = event_rx;
        while let Some(event) = rx.recv().await {
            match event {
                CommsEvent::ChannelShutdown { channel_id } => {
                    debug!(%channel_id, "channel reported shutdown");
                }
                CommsEvent::SessionStarted { channel_id, session_id } => {
                    debug!(%channel_id, %session_id, "channel session started");
                }
            }
        }
    });

    drop(state);
    spawn_components(components, shutdown)
}
