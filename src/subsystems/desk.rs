//! Loan desk — the service every comms channel talks to.
//!
//! Ties the deterministic back-office, the agent crew and the session store
//! together.  A turn locks its session, runs the conversation state machine,
//! voices the new replies through the crew, and mirrors a snapshot to disk.
//!
//! The state machine runs on a blocking thread against a copy of the
//! conversation (letter rendering and writing are synchronous).  The copy
//! replaces the session only when the turn succeeds; a failed turn leaves
//! the session exactly as it was.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::llm::LlmProvider;
use crate::subsystems::agents::{Backoffice, Crew};
use crate::subsystems::conversation::{ChatRole, Conversation, MessageView, SessionView};
use crate::subsystems::memory::{SessionInfo, SessionStore};
use crate::subsystems::tools::{Customer, CustomerDirectory};

/// Result of one chat turn: the replies it produced plus the session after it.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub replies: Vec<MessageView>,
    #[serde(flatten)]
    pub session: SessionView,
}

/// A downloadable sanction letter.
#[derive(Debug, Clone)]
pub struct LetterFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct LoanDesk {
    backoffice: Backoffice,
    crew: Crew,
    sessions: SessionStore,
    voice_replies: bool,
}

impl LoanDesk {
    pub fn new(backoffice: Backoffice, crew: Crew, sessions: SessionStore, voice_replies: bool) -> Self {
        Self { backoffice, crew, sessions, voice_replies }
    }

    pub fn from_config(
        config: &Config,
        directory: Arc<CustomerDirectory>,
        provider: Option<LlmProvider>,
    ) -> Self {
        let backoffice = Backoffice::new(directory, config.letters_dir());
        let crew = Crew::new(provider, &config.prompts_dir);
        let snapshot_dir = config.snapshot_sessions.then(|| config.sessions_dir());
        let sessions =
            SessionStore::new(config.policy.clone(), snapshot_dir).with_capacity(config.max_sessions);
        Self::new(backoffice, crew, sessions, config.llm.voice_replies)
    }

    pub fn customers(&self) -> &[Customer] {
        self.backoffice.directory().customers()
    }

    /// Kind of the configured provider, if any.
    pub fn provider_kind(&self) -> Option<&'static str> {
        self.crew.provider().map(LlmProvider::kind)
    }

    /// Model name of the configured provider, if any.
    pub fn model(&self) -> Option<&str> {
        self.crew.provider().map(LlmProvider::model)
    }

    pub fn voice_replies(&self) -> bool {
        self.voice_replies
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.len().await
    }

    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.list().await
    }

    /// Open a session and return its greeting.
    pub async fn new_session(&self) -> Result<SessionView, AppError> {
        let (_, handle) = self.sessions.create().await;
        let mut conv = handle.lock().await;
        self.voice_from(&mut conv, 0).await;
        self.persist(&conv).await;
        Ok(conv.view())
    }

    pub async fn session(&self, session_id: &str) -> Result<SessionView, AppError> {
        let (_, handle) = self.sessions.resolve(Some(session_id)).await?;
        let conv = handle.lock().await;
        Ok(conv.view())
    }

    pub async fn reset(&self, session_id: &str) -> Result<SessionView, AppError> {
        let (_, handle) = self.sessions.resolve(Some(session_id)).await?;
        let mut conv = handle.lock().await;
        conv.reset();
        self.voice_from(&mut conv, 0).await;
        self.persist(&conv).await;
        Ok(conv.view())
    }

    /// Run one chat turn.  Without a `session_id` a new session is opened.
    pub async fn converse(&self, session_id: Option<&str>, message: &str) -> Result<TurnReply, AppError> {
        let (id, handle) = self.sessions.resolve(session_id).await?;
        let mut conv = handle.lock().await;

        let mut working = conv.clone();
        let backoffice = self.backoffice.clone();
        let text = message.to_string();
        let (working, first_reply) = tokio::task::spawn_blocking(move || {
            let first = working.handle(&backoffice, &text);
            first.map(|first| (working, first))
        })
        .await
        .map_err(|e| AppError::Session(format!("turn task failed: {e}")))??;
        *conv = working;

        self.voice_from(&mut conv, first_reply).await;
        self.persist(&conv).await;

        let replies: Vec<MessageView> =
            conv.transcript()[first_reply..].iter().map(MessageView::from).collect();
        info!(session = %id, state = ?conv.state(), replies = replies.len(), "turn complete");
        Ok(TurnReply { replies, session: conv.view() })
    }

    /// The session's sanction letter, or `None` if nothing was approved.
    pub async fn letter(&self, session_id: &str) -> Result<Option<LetterFile>, AppError> {
        let (_, handle) = self.sessions.resolve(Some(session_id)).await?;
        let path = match handle.lock().await.letter_path() {
            Some(p) => p.to_path_buf(),
            None => return Ok(None),
        };
        let bytes = tokio::fs::read(&path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sanction_letter.pdf".to_string());
        Ok(Some(LetterFile { file_name, bytes }))
    }

    async fn voice_from(&self, conv: &mut Conversation, first: usize) {
        if !self.voice_replies {
            return;
        }
        for index in first..conv.transcript().len() {
            let msg = &conv.transcript()[index];
            let (ChatRole::Assistant, Some(role)) = (msg.role, msg.speaker) else {
                continue;
            };
            let draft = msg.content.clone();
            let voiced = self.crew.voice(role, &draft).await;
            conv.set_content(index, voiced);
        }
    }

    async fn persist(&self, conv: &Conversation) {
        if let Err(e) = self.sessions.snapshot(conv).await {
            warn!(session = %conv.id(), error = %e, "session snapshot failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::dummy::DummyProvider;
    use crate::subsystems::conversation::ConversationState;

    fn desk(work_dir: &std::path::Path) -> LoanDesk {
        let mut config = Config::test_default(work_dir);
        config.snapshot_sessions = true;
        let directory = CustomerDirectory::load(&config.dataset_path).unwrap();
        LoanDesk::from_config(&config, Arc::new(directory), Some(LlmProvider::Dummy(DummyProvider)))
    }

    #[tokio::test]
    async fn converse_without_session_opens_one() {
        let tmp = tempfile::tempdir().unwrap();
        let desk = desk(tmp.path());
        let turn = desk.converse(None, "hello").await.unwrap();
        assert_eq!(desk.session_count().await, 1);
        assert_eq!(turn.replies.len(), 1);
        assert!(turn.replies[0].content.starts_with("Hey, it's nice to meet you!"));
        assert!(tmp.path().join("sessions").join(format!("{}.json", turn.session.session_id)).exists());
    }

    #[tokio::test]
    async fn unknown_session_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let desk = desk(tmp.path());
        assert!(matches!(desk.converse(Some("missing"), "hi").await, Err(AppError::Session(_))));
        assert!(matches!(desk.letter("missing").await, Err(AppError::Session(_))));
    }

    #[tokio::test]
    async fn no_letter_before_approval() {
        let tmp = tempfile::tempdir().unwrap();
        let desk = desk(tmp.path());
        let view = desk.new_session().await.unwrap();
        assert!(desk.letter(&view.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn turn_reply_flattens_session_view() {
        let tmp = tempfile::tempdir().unwrap();
        let desk = desk(tmp.path());
        let turn = desk.converse(None, "9876543210").await.unwrap();
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["state"], "COLLECT_LOAN");
        assert!(json["replies"].as_array().unwrap().len() >= 3);
        assert_eq!(json["data"]["customer_phone"], "9876543210");
    }

    #[tokio::test]
    async fn failed_turn_leaves_session_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let desk = desk(tmp.path());
        // A plain file where the letters directory should go.
        std::fs::write(tmp.path().join("letters"), b"").unwrap();

        let mut session_id = None;
        for msg in ["9876543210", "300000", "24"] {
            let turn = desk.converse(session_id.as_deref(), msg).await.unwrap();
            session_id = Some(turn.session.session_id);
        }
        let id = session_id.unwrap();
        let before = desk.session(&id).await.unwrap();

        let err = desk.converse(Some(id.as_str()), "no").await.unwrap_err();
        assert!(matches!(err, AppError::Io(_) | AppError::Sanction(_)), "{err}");
        let after = desk.session(&id).await.unwrap();
        assert_eq!(after.state, ConversationState::AskSalaryOption);
        assert_eq!(after.messages.len(), before.messages.len());

        std::fs::remove_file(tmp.path().join("letters")).unwrap();
        let turn = desk.converse(Some(id.as_str()), "no").await.unwrap();
        assert_eq!(turn.session.status, Some("APPROVED"));
    }
}
