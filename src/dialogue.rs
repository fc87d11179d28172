//! Per-conversation dialogue state and its storage.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::db;

/// What the bot expects from the user next
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueState {
    #[default]
    Idle,
    /// Next profile link removes an identity from the blacklist
    AwaitingBlacklistDeletion,
    /// Next profile link removes an identity from favorites
    AwaitingFavoritesDeletion,
}

/// Conversation context carried between messages
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub state: DialogueState,
    /// Row id of the last match shown; the next card comes after it
    pub cursor: i32,
    /// External identity on the card currently shown
    pub current_match: Option<i64>,
}

impl Session {
    /// Forget the review position, keeping the dialogue state
    pub fn restart_review(&mut self) {
        self.cursor = 0;
        self.current_match = None;
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize session")
    }

    /// Parse a stored session; unreadable data starts a fresh one
    pub fn from_json(raw: &str) -> Session {
        match serde_json::from_str(raw) {
            Ok(session) => session,
            Err(e) => {
                log::warn!("Discarding unreadable dialogue session: {}", e);
                Session::default()
            }
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stored session, or a fresh one for a new conversation
    async fn load(&self, vk_id: i64) -> Result<Session>;

    async fn save(&self, vk_id: i64, session: &Session) -> Result<()>;
}

/// Process-local sessions, lost on restart
#[derive(Default)]
pub struct InMemSessionStore {
    sessions: Mutex<HashMap<i64, Session>>,
}

impl InMemSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemSessionStore {
    async fn load(&self, vk_id: i64) -> Result<Session> {
        Ok(self
            .sessions
            .lock()
            .await
            .get(&vk_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, vk_id: i64, session: &Session) -> Result<()> {
        self.sessions.lock().await.insert(vk_id, session.clone());
        Ok(())
    }
}

/// Sessions in the `dialogue_sessions` table
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, vk_id: i64) -> Result<Session> {
        let raw = db::load_session(&self.pool, vk_id).await?;
        Ok(raw.as_deref().map(Session::from_json).unwrap_or_default())
    }

    async fn save(&self, vk_id: i64, session: &Session) -> Result<()> {
        db::save_session(&self.pool, vk_id, &session.to_json()?).await
    }
}
