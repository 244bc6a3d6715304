//! Cookie-keyed sessions with pluggable storage.
//!
//! Layout:
//! - `layer.rs`: middleware that loads, attaches and commits the session
//! - `memory.rs`: transient in-process store
//! - `mongo.rs`: persistent store in the document database

pub mod layer;
pub mod memory;
pub mod mongo;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::AppError;

pub use layer::SessionLayer;
pub use memory::MemoryStore;
pub use mongo::MongoSessionStore;

/// Session key holding the authentication flag.
pub const AUTH_KEY: &str = "isAuth";
pub const SESSION_ID_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Persistent,
    Transient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub data: Map<String, Value>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Expired records are reported as absent.
    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, AppError>;
    async fn save(&self, record: &SessionRecord) -> Result<(), AppError>;
    async fn destroy(&self, id: &str) -> Result<(), AppError>;
    fn kind(&self) -> StoreKind;
}

pub fn generate_id() -> String {
    let mut rng = rand::rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric) as char)
        .take(SESSION_ID_LEN)
        .collect()
}

#[derive(Debug, Default)]
struct SessionState {
    id: Option<String>,
    data: Map<String, Value>,
    modified: bool,
    destroyed: bool,
}

/// Per-request handle on the session; clones share state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

pub(crate) struct Snapshot {
    pub id: Option<String>,
    pub data: Map<String, Value>,
    pub modified: bool,
    pub destroyed: bool,
}

impl Session {
    pub(crate) fn new(id: Option<String>, data: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                id,
                data,
                ..SessionState::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` until the session has been stored once.
    pub fn id(&self) -> Option<String> {
        self.state().id.clone()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.state().data.get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub fn insert(&self, key: &str, value: impl Serialize) -> Result<(), AppError> {
        let value = serde_json::to_value(value)?;
        let mut state = self.state();
        state.data.insert(key.to_string(), value);
        state.modified = true;
        Ok(())
    }

    pub fn remove<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut state = self.state();
        let value = state.data.remove(key)?;
        state.modified = true;
        serde_json::from_value(value).ok()
    }

    pub fn destroy(&self) {
        let mut state = self.state();
        state.data.clear();
        state.destroyed = true;
    }

    pub fn is_authenticated(&self) -> bool {
        self.get::<bool>(AUTH_KEY).unwrap_or(false)
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let state = self.state();
        Snapshot {
            id: state.id.clone(),
            data: state.data.clone(),
            modified: state.modified,
            destroyed: state.destroyed,
        }
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AppError::SessionMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_do_not_mark_the_session_modified() {
        let session = Session::default();
        assert!(!session.is_authenticated());
        assert!(!session.snapshot().modified);

        session.insert(AUTH_KEY, true).unwrap();
        assert!(session.is_authenticated());
        assert!(session.snapshot().modified);
    }

    #[test]
    fn destroy_clears_data() {
        let session = Session::new(Some("abc".into()), Map::new());
        session.insert("username", "alice").unwrap();
        session.destroy();
        let snap = session.snapshot();
        assert!(snap.destroyed);
        assert!(snap.data.is_empty());
        assert_eq!(snap.id.as_deref(), Some("abc"));
    }

    #[test]
    fn generated_ids_are_alphanumeric() {
        let id = generate_id();
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, generate_id());
    }
}
