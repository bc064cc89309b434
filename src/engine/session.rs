//! Per-user conversation sessions.
//!
//! A session is created on the first inbound event from a user and lives for
//! the process lifetime. Handlers read-then-write session state without a
//! transactional guard, so each session carries its own async lock that is
//! held for the whole turn; distinct users proceed in parallel.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::chat::UserId;

/// Conversation states. No transition produces anything outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    SelectCity,
    ManualCityInput,
    ConfirmCity,
    /// Steady state; re-entrant from almost every terminal action.
    MainMenu,
    DepositAmount,
    GetModelData,
    GetModelPhoto,
    ConfirmDeleteModel,
}

/// A validated catalog draft from the add-model flow. Only ever constructed
/// from input that already passed `moderation::parse_draft`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDraft {
    pub name: String,
    pub age: i64,
    pub city: String,
    pub price: i64,
}

#[derive(Debug)]
pub struct Session {
    pub state: SessionState,
    pub pending_city: Option<String>,
    pub pending_draft: Option<ModelDraft>,
    pub pending_delete: Option<i64>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: SessionState::SelectCity,
            pending_city: None,
            pending_draft: None,
            pending_delete: None,
        }
    }
}

/// Session registry keyed by user identity. Entries are never removed.
pub struct SessionMap {
    inner: Mutex<HashMap<UserId, Arc<tokio::sync::Mutex<Session>>>>,
}

impl SessionMap {
    pub fn new() -> Self {
        Self { inner: Mutex::new(HashMap::new()) }
    }

    /// Get or create the session cell for a user. New sessions start in
    /// `SelectCity`.
    pub fn entry(&self, user_id: UserId) -> Arc<tokio::sync::Mutex<Session>> {
        let mut map = self.inner.lock().unwrap();
        map.entry(user_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(Session::new())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionMap {
    fn default() -> Self {
        Self::new()
    }
}
