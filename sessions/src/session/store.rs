use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::errors::{NewSessionError, StoreError};
use crate::session::request::RequestInfo;

/// Reserved key holding queued flash messages
const FLASH_KEY: &str = "_flash";

/// SameSite attribute for session cookies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Cookie options a backend applies when persisting a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub path: String,
    pub domain: Option<String>,
    /// Seconds until expiry. `0` keeps the cookie for the browser session,
    /// a negative value deletes the session on the next save.
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            max_age: 86400 * 30,
            secure: false,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }
}

impl SessionOptions {
    /// When state saved at `now` expires, `None` when `max_age` is not
    /// positive. Fails when `max_age` does not fit a date.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, StoreError> {
        if self.max_age <= 0 {
            return Ok(None);
        }
        Duration::try_seconds(self.max_age)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .map(Some)
            .ok_or_else(|| StoreError::Storage(format!("max_age out of range: {}", self.max_age)))
    }
}

/// Session data structure
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Cookie name the session is registered under
    pub(crate) name: String,
    /// Backend-assigned identifier, empty until the backend assigns one
    pub id: String,
    /// Custom session data stored as key-value pairs
    pub values: HashMap<String, Value>,
    pub options: SessionOptions,
    /// True when the session was not loaded from existing state
    pub is_new: bool,
}

impl Session {
    /// Create a new, empty session with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_new: true,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set a key-value pair in the session data
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get a value from the session data by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Remove a key-value pair from the session data
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Queue a flash message, read back once by [`Session::flashes`].
    pub fn add_flash(&mut self, message: impl Into<Value>) {
        let flashes = self
            .values
            .entry(FLASH_KEY.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match flashes {
            Value::Array(items) => items.push(message.into()),
            other => *other = Value::Array(vec![message.into()]),
        }
    }

    /// Drain and return queued flash messages.
    pub fn flashes(&mut self) -> Vec<Value> {
        match self.values.remove(FLASH_KEY) {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => Vec::new(),
        }
    }
}

/// Shared handle to a session tracked by a registry
pub type SessionRef = Arc<Mutex<Session>>;

/// Trait defining the interface for session stores
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Create the session named `name` for this request.
    ///
    /// Loads existing state where the backend finds some. On failure the
    /// error must still carry a usable session.
    async fn new_session(
        &self,
        request: &RequestInfo,
        name: &str,
    ) -> Result<Session, NewSessionError>;

    /// Persist one session, writing whatever the client needs (usually a
    /// `Set-Cookie`) into the response headers.
    async fn save_session(
        &self,
        request: &RequestInfo,
        response: &mut HeaderMap,
        session: &mut Session,
    ) -> Result<(), StoreError>;
}

/// Type alias for Arc-wrapped SessionStore trait objects
pub type SessionStoreRef = Arc<dyn SessionStore>;
