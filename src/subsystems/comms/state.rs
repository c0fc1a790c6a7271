//! Shared state for the Comms subsystem — capability boundary for channels.
//!
//! Channels receive an `Arc<CommsState>` and are restricted to the typed
//! methods below.  The [`LoanDesk`] itself is private; channels cannot reach
//! the back-office or the session store directly.
//!
//! # Intra-subsystem events
//!
//! [`CommsState::report_event`] lets a running channel signal the comms
//! subsystem manager (e.g. "I shut down", "new session started").  The
//! manager owns the receiver end.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::subsystems::conversation::SessionView;
use crate::subsystems::desk::{LetterFile, LoanDesk, TurnReply};
use crate::subsystems::memory::SessionInfo;
use crate::subsystems::tools::Customer;

// ── Events ────────────────────────────────────────────────────────────────────

/// Events a channel sends back to the comms subsystem manager.
#[derive(Debug)]
pub enum CommsEvent {
    /// Channel has stopped (clean exit or EOF).
    ChannelShutdown { channel_id: String },
    /// A new chat session was opened on the channel.
    SessionStarted { channel_id: String, session_id: String },
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub provider: Option<&'static str>,
    pub model: Option<String>,
    pub voice_replies: bool,
    pub customers: usize,
    pub sessions: usize,
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Shared state passed as `Arc<CommsState>` to every channel task.
pub struct CommsState {
    /// Loan desk — private so channels only see the methods below.
    desk: Arc<LoanDesk>,
    /// Back-channel to the comms subsystem manager.
    event_tx: mpsc::Sender<CommsEvent>,
}

impl CommsState {
    pub fn new(desk: Arc<LoanDesk>, event_tx: mpsc::Sender<CommsEvent>) -> Self {
        Self { desk, event_tx }
    }

    /// Run one chat turn for `channel_id`.  `session_id = None` opens a new
    /// session.
    pub async fn send_message(
        &self,
        channel_id: &str,
        session_id: Option<&str>,
        content: &str,
    ) -> Result<TurnReply, AppError> {
        debug!(%channel_id, session = ?session_id, "routing message to loan desk");
        let reply = self.desk.converse(session_id, content).await?;
        if session_id.is_none() {
            self.report_event(CommsEvent::SessionStarted {
                channel_id: channel_id.to_string(),
                session_id: reply.session.session_id.clone(),
            });
        }
        Ok(reply)
    }

    pub async fn open_session(&self, channel_id: &str) -> Result<SessionView, AppError> {
        let view = self.desk.new_session().await?;
        self.report_event(CommsEvent::SessionStarted {
            channel_id: channel_id.to_string(),
            session_id: view.session_id.clone(),
        });
        Ok(view)
    }

    pub async fn session(&self, session_id: &str) -> Result<SessionView, AppError> {
        self.desk.session(session_id).await
    }

    pub async fn reset_session(&self, session_id: &str) -> Result<SessionView, AppError> {
        self.desk.reset(session_id).await
    }

    pub async fn sessions(&self) -> Vec<SessionInfo> {
        self.desk.list_sessions().await
    }

    pub async fn letter(&self, session_id: &str) -> Result<Option<LetterFile>, AppError> {
        self.desk.letter(session_id).await
    }

    pub fn customers(&self) -> &[Customer] {
        self.desk.customers()
    }

    pub async fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            provider: self.desk.provider_kind(),
            model: self.desk.model().map(str::to_string),
            voice_replies: self.desk.voice_replies(),
            customers: self.desk.customers().len(),
            sessions: self.desk.session_count().await,
        }
    }

    /// Report an event to the comms subsystem manager.
    ///
    /// Non-blocking: drops the event and logs a warning if the manager is not
    /// keeping up (channel full) or has already exited (closed).
    pub fn report_event(&self, event: CommsEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("comms event dropped: {e}");
        }
    }
}
