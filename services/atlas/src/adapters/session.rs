//! services/atlas/src/adapters/session.rs
//!
//! Anonymous session persistence. The hosted auth service issues a short-lived
//! access token, a refresh token and a user id on sign-up; all of it is kept in
//! memory and mirrored to a JSON file so the same identity (and with it the vote
//! set) survives restarts.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user_id: Uuid,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AnonymousSession {
    /// Whether the access token should be refreshed before it is sent.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at <= now + ChronoDuration::seconds(EXPIRY_MARGIN_SECS))
    }
}

pub type SessionSlot<'a> = MutexGuard<'a, Option<AnonymousSession>>;

pub struct SessionStore {
    path: PathBuf,
    current: Mutex<Option<AnonymousSession>>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: Mutex::new(None),
        }
    }

    /// The active session, loading it from disk on first access.
    pub async fn current(&self) -> Option<AnonymousSession> {
        self.lock().await.clone()
    }

    /// Locks the slot for a read-modify-write, so concurrent callers cannot both
    /// sign up or refresh. The slot is already populated from disk when a session
    /// file exists.
    pub async fn lock(&self) -> SessionSlot<'_> {
        let mut slot = self.current.lock().await;
        if slot.is_none() {
            *slot = read_session_file(&self.path).await;
        }
        slot
    }

    /// Puts `session` into the locked slot and mirrors it to disk.
    pub async fn store(&self, slot: &mut Option<AnonymousSession>, session: AnonymousSession) {
        if let Err(e) = self.persist(&session).await {
            warn!("Failed to persist anonymous session: {}", e);
        }
        *slot = Some(session);
    }

    /// Empties the locked slot and removes the session file.
    pub async fn forget(&self, slot: &mut Option<AnonymousSession>) {
        *slot = None;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Removed session file."),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "Failed to remove session file: {}", e),
        }
    }

    async fn persist(&self, session: &AnonymousSession) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(session)?;
        tokio::fs::write(&self.path, json).await?;
        debug!(path = %self.path.display(), "Persisted anonymous session.");
        Ok(())
    }
}

async fn read_session_file(path: &Path) -> Option<AnonymousSession> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), "Failed to read session file: {}", e);
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(path = %path.display(), "Ignoring unreadable session file: {}", e);
            None
        }
    }
}
