use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{NewSessionError, StoreError};
use crate::session::cookies::{append_cookie, new_cookie};
use crate::session::request::RequestInfo;
use crate::session::store::{Session, SessionOptions, SessionStore};

/// Server-side state for one session id
#[derive(Debug, Clone)]
struct StoredSession {
    values: HashMap<String, Value>,
    options: SessionOptions,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }
}

/// In-memory implementation of SessionStore.
///
/// Session values stay on the server; the client only holds the session id
/// in a cookie named after the session.
#[derive(Debug)]
pub struct InMemorySessionStore {
    /// Thread-safe storage of sessions, keyed by session id
    sessions: Arc<RwLock<HashMap<String, StoredSession>>>,
    /// Options given to sessions that have no stored state yet
    options: SessionOptions,
}

impl InMemorySessionStore {
    /// Create a new InMemorySessionStore
    pub fn new() -> Self {
        Self::with_options(SessionOptions::default())
    }

    pub fn with_options(options: SessionOptions) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            options,
        }
    }

    fn fresh_session(&self, name: &str) -> Session {
        let mut session = Session::new(name);
        session.options = self.options.clone();
        session
    }

    /// Delete a session by id
    pub fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().map_err(|e| {
            StoreError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        if sessions.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        debug!("Deleted session: {}", id);
        Ok(())
    }

    /// Delete expired sessions, returning how many were removed
    pub fn cleanup_expired_sessions(&self) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.write().map_err(|e| {
            StoreError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, stored| !stored.is_expired(now));
        let count = before - sessions.len();

        if count > 0 {
            warn!("Cleaned up {} expired sessions", count);
        }

        Ok(count)
    }

    /// Number of stored sessions, expired ones included
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn new_session(
        &self,
        request: &RequestInfo,
        name: &str,
    ) -> Result<Session, NewSessionError> {
        let Some(id) = request.cookie(name) else {
            return Ok(self.fresh_session(name));
        };

        let stored = {
            let sessions = self.sessions.read().map_err(|e| {
                NewSessionError::new(
                    self.fresh_session(name),
                    StoreError::Storage(format!("Failed to acquire read lock: {}", e)),
                )
            })?;
            sessions.get(&id).cloned()
        };

        match stored {
            None => Err(NewSessionError::new(
                self.fresh_session(name),
                StoreError::NotFound(id),
            )),
            Some(stored) if stored.is_expired(Utc::now()) => Err(NewSessionError::new(
                self.fresh_session(name),
                StoreError::Expired(id),
            )),
            Some(stored) => {
                let mut session = Session::new(name);
                session.id = id;
                session.values = stored.values;
                session.options = stored.options;
                session.is_new = false;
                debug!("Loaded session: {}", session.id);
                Ok(session)
            }
        }
    }

    async fn save_session(
        &self,
        _request: &RequestInfo,
        response: &mut HeaderMap,
        session: &mut Session,
    ) -> Result<(), StoreError> {
        // Checked before taking the lock so a bad max_age cannot poison it
        let expires_at = session.options.expires_at(Utc::now())?;

        let mut sessions = self.sessions.write().map_err(|e| {
            StoreError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        if session.options.max_age < 0 {
            if !session.id.is_empty() {
                sessions.remove(&session.id);
                debug!("Deleted session: {}", session.id);
            }
            return append_cookie(response, &new_cookie(session.name(), "", &session.options));
        }

        if session.id.is_empty() {
            session.id = Uuid::new_v4().to_string();
        }

        sessions.insert(
            session.id.clone(),
            StoredSession {
                values: session.values.clone(),
                options: session.options.clone(),
                expires_at,
            },
        );
        debug!("Saved session: {}", session.id);

        append_cookie(response, &new_cookie(session.name(), &session.id, &session.options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use http::header::{COOKIE, SET_COOKIE};
    use http::HeaderValue;
    use serde_json::json;
    use tokio::test;

    fn request_with_cookie(name: &str, id: &str) -> RequestInfo {
        let mut request = RequestInfo::default();
        request.headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("{}={}", name, id)).unwrap(),
        );
        request
    }

    #[test]
    async fn test_new_session_without_cookie() {
        let store = InMemorySessionStore::new();
        let session = store
            .new_session(&RequestInfo::default(), "sid")
            .await
            .unwrap();

        assert!(session.is_new);
        assert!(session.id.is_empty());
        assert_eq!(session.options, SessionOptions::default());
    }

    #[test]
    async fn test_save_and_reload() {
        let store = InMemorySessionStore::new();
        let mut session = store
            .new_session(&RequestInfo::default(), "sid")
            .await
            .unwrap();
        session.set("key1", "value1");

        let mut response = HeaderMap::new();
        store
            .save_session(&RequestInfo::default(), &mut response, &mut session)
            .await
            .unwrap();

        assert!(!session.id.is_empty());
        let set_cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.starts_with(&format!("sid={}", session.id)));

        let reloaded = store
            .new_session(&request_with_cookie("sid", &session.id), "sid")
            .await
            .unwrap();
        assert!(!reloaded.is_new);
        assert_eq!(reloaded.id, session.id);
        assert_eq!(reloaded.get("key1"), Some(&json!("value1")));
    }

    #[test]
    async fn test_unknown_id_returns_fallback() {
        let store = InMemorySessionStore::new();
        let err = store
            .new_session(&request_with_cookie("sid", "nope"), "sid")
            .await
            .unwrap_err();

        assert!(matches!(err.source, StoreError::NotFound(ref id) if id == "nope"));
        assert!(err.session.is_new);
        assert!(err.session.id.is_empty());
    }

    #[test]
    async fn test_expired_session() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new("sid");
        session.set("key", "value");
        store
            .save_session(&RequestInfo::default(), &mut HeaderMap::new(), &mut session)
            .await
            .unwrap();

        // Force the stored entry into the past
        store
            .sessions
            .write()
            .unwrap()
            .get_mut(&session.id)
            .unwrap()
            .expires_at = Some(Utc::now() - Duration::seconds(1));

        let err = store
            .new_session(&request_with_cookie("sid", &session.id), "sid")
            .await
            .unwrap_err();
        assert!(matches!(err.source, StoreError::Expired(_)));
        assert!(err.session.values.is_empty());

        assert_eq!(store.cleanup_expired_sessions().unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    async fn test_negative_max_age_deletes() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new("sid");
        store
            .save_session(&RequestInfo::default(), &mut HeaderMap::new(), &mut session)
            .await
            .unwrap();
        assert_eq!(store.len(), 1);

        session.options.max_age = -1;
        let mut response = HeaderMap::new();
        store
            .save_session(&RequestInfo::default(), &mut response, &mut session)
            .await
            .unwrap();

        assert!(store.is_empty());
        let set_cookie = response.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[test]
    async fn test_out_of_range_max_age_keeps_store_usable() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new("sid");
        session.options.max_age = i64::MAX;

        let result = store
            .save_session(&RequestInfo::default(), &mut HeaderMap::new(), &mut session)
            .await;
        assert!(matches!(result, Err(StoreError::Storage(_))));
        assert!(store.is_empty());

        // The lock is not poisoned; later saves still work
        session.options.max_age = 60;
        store
            .save_session(&RequestInfo::default(), &mut HeaderMap::new(), &mut session)
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.cleanup_expired_sessions().unwrap(), 0);
    }

    #[test]
    async fn test_delete_session() {
        let store = InMemorySessionStore::new();
        let mut session = Session::new("sid");
        store
            .save_session(&RequestInfo::default(), &mut HeaderMap::new(), &mut session)
            .await
            .unwrap();

        store.delete_session(&session.id).unwrap();
        assert!(matches!(
            store.delete_session(&session.id),
            Err(StoreError::NotFound(_))
        ));
    }
}
