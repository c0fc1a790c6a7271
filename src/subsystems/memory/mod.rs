//! Session memory — the live conversations and their on-disk snapshots.
//!
//! Every session is an `Arc<Mutex<Conversation>>` held in an in-process map.
//! A turn holds its session's lock for its whole duration, so concurrent
//! requests to one session are serialised while different sessions proceed
//! independently.
//!
//! The map is bounded: once it holds `capacity` sessions, opening another
//! evicts the least recently active one along with its snapshot.  Issued
//! letters are never removed.
//!
//! When snapshots are enabled, each session's view is mirrored after every
//! turn:
//!
//! ```text
//! {work_dir}/
//! └── sessions/
//!     └── {session_id}.json
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::PolicyConfig;
use crate::error::AppError;
use crate::subsystems::conversation::Conversation;

pub type SessionHandle = Arc<Mutex<Conversation>>;

pub const DEFAULT_MAX_SESSIONS: usize = 500;

/// Metadata for one live session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: String,
}

struct SessionEntry {
    info: SessionInfo,
    handle: SessionHandle,
    last_active: Instant,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    policy: PolicyConfig,
    snapshot_dir: Option<PathBuf>,
    capacity: usize,
}

impl SessionStore {
    /// `snapshot_dir = None` keeps sessions purely in memory.
    pub fn new(policy: PolicyConfig, snapshot_dir: Option<PathBuf>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            policy,
            snapshot_dir,
            capacity: DEFAULT_MAX_SESSIONS,
        }
    }

    /// Cap the live sessions at `capacity` (at least one).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn snapshot_dir(&self) -> Option<&Path> {
        self.snapshot_dir.as_deref()
    }

    /// Open a fresh session with a new v4 id.
    pub async fn create(&self) -> (String, SessionHandle) {
        let session_id = uuid::Uuid::new_v4().to_string();
        let handle = Arc::new(Mutex::new(Conversation::new(session_id.clone(), self.policy.clone())));
        let info = SessionInfo {
            session_id: session_id.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let evicted = {
            let mut sessions = self.sessions.lock().await;
            let mut evicted = Vec::new();
            while sessions.len() >= self.capacity {
                let Some(oldest) = sessions
                    .iter()
                    .min_by_key(|(_, e)| e.last_active)
                    .map(|(id, _)| id.clone())
                else {
                    break;
                };
                sessions.remove(&oldest);
                evicted.push(oldest);
            }
            sessions.insert(
                session_id.clone(),
                SessionEntry { info, handle: handle.clone(), last_active: Instant::now() },
            );
            evicted
        };
        for id in evicted {
            info!(session = %id, capacity = self.capacity, "idle session evicted");
            self.remove_snapshot(&id).await;
        }
        info!(session = %session_id, "session created");
        (session_id, handle)
    }

    /// Fetch a live session and mark it active.
    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(session_id)?;
        entry.last_active = Instant::now();
        Some(entry.handle.clone())
    }

    /// Look up `session_id`, or create a session when none is given.
    pub async fn resolve(&self, session_id: Option<&str>) -> Result<(String, SessionHandle), AppError> {
        match session_id {
            Some(id) => self
                .get(id)
                .await
                .map(|h| (id.to_string(), h))
                .ok_or_else(|| AppError::Session(format!("unknown session '{id}'"))),
            None => Ok(self.create().await),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Live sessions, oldest first.
    pub async fn list(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> =
            self.sessions.lock().await.values().map(|e| e.info.clone()).collect();
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        infos
    }

    /// Mirror `conv`'s view to `{snapshot_dir}/{id}.json`.  No-op when
    /// snapshots are disabled.
    pub async fn snapshot(&self, conv: &Conversation) -> Result<(), AppError> {
        let Some(dir) = &self.snapshot_dir else {
            return Ok(());
        };
        tokio::fs::create_dir_all(dir).await?;
        let json = serde_json::to_string_pretty(&conv.view())
            .map_err(|e| AppError::Session(format!("snapshot encode failed: {e}")))?;
        let path = dir.join(format!("{}.json", conv.id()));
        tokio::fs::write(&path, json).await?;
        debug!(session = %conv.id(), path = %path.display(), "session snapshot written");
        Ok(())
    }

    async fn remove_snapshot(&self, session_id: &str) {
        let Some(dir) = &self.snapshot_dir else {
            return;
        };
        let path = dir.join(format!("{session_id}.json"));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "stale snapshot not removed"),
        }
    }
}
