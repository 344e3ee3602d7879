//! Per-request session registry
//!
//! A [`Registry`] is attached to a request's extensions once, early in request
//! handling. Handlers then ask it for sessions by name; the first request for a
//! name creates the session through the given store and every later request
//! gets the same session back. At the end of the request a single
//! [`Registry::save`] persists every session that was touched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use http::{Extensions, HeaderMap};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::{MultiError, NewSessionError, SessionError, SessionResult, StoreError};
use crate::session::name::is_cookie_name_valid;
use crate::session::request::RequestInfo;
use crate::session::store::{SessionRef, SessionStoreRef};

/// A session tracked by the registry together with its creation error and
/// the store that will persist it.
///
/// The store lives outside the session's lock so `get` never waits on a
/// caller that is holding the session.
#[derive(Debug)]
struct SessionInfo {
    session: SessionRef,
    error: Option<Arc<StoreError>>,
    store: StdMutex<Option<SessionStoreRef>>,
}

impl SessionInfo {
    fn store(&self) -> Option<SessionStoreRef> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_store(&self, store: Option<SessionStoreRef>) {
        *self.store.lock().unwrap_or_else(PoisonError::into_inner) = store;
    }
}

/// Extension slot holding the registry. Private so nothing else can occupy
/// or read it by accident.
#[derive(Clone)]
struct RegistrySlot(RegistryRef);

/// Sessions used during one request
#[derive(Debug)]
pub struct Registry {
    request: RequestInfo,
    sessions: Mutex<HashMap<String, Arc<SessionInfo>>>,
}

/// Type alias for the shared registry handle kept in request extensions
pub type RegistryRef = Arc<Registry>;

/// Attach a registry for `request` unless the extensions already carry one.
///
/// Returns the registry in the extensions either way, so attaching twice
/// yields the same instance.
pub fn attach_registry(extensions: &mut Extensions, request: RequestInfo) -> RegistryRef {
    if let Some(registry) = registry_from_extensions(extensions) {
        return registry;
    }
    let registry = Arc::new(Registry::new(request));
    extensions.insert(RegistrySlot(registry.clone()));
    registry
}

/// The registry attached to these extensions, if any.
pub fn registry_from_extensions(extensions: &Extensions) -> Option<RegistryRef> {
    extensions.get::<RegistrySlot>().map(|slot| slot.0.clone())
}

/// Save every session used by the request owning `extensions`.
///
/// Fails with [`SessionError::NoRegistry`] when no registry was attached.
pub async fn save(extensions: &Extensions, response: &mut HeaderMap) -> SessionResult<()> {
    registry_from_extensions(extensions)
        .ok_or(SessionError::NoRegistry)?
        .save(response)
        .await
}

impl Registry {
    pub fn new(request: RequestInfo) -> Self {
        Self {
            request,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn request(&self) -> &RequestInfo {
        &self.request
    }

    /// Register and return the session called `name`, created by `store` if
    /// this registry has not seen the name yet.
    ///
    /// Creation runs at most once per name: a failed creation is cached and
    /// every later call returns the same [`SessionError::Creation`], which
    /// still carries the store's fallback session.
    ///
    /// Each call points the session at `store`, so the store of the most
    /// recent call is the one that persists it on save. The data already in
    /// the session is kept as is; callers must not switch to a store that
    /// cannot handle it.
    pub async fn get(&self, store: SessionStoreRef, name: &str) -> SessionResult<SessionRef> {
        if !is_cookie_name_valid(name) {
            return Err(SessionError::InvalidName(name.to_string()));
        }

        let info = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get(name) {
                Some(info) => info.clone(),
                None => {
                    let (mut session, error) = match store.new_session(&self.request, name).await {
                        Ok(session) => (session, None),
                        Err(NewSessionError { session, source }) => {
                            warn!(session = name, error = %source, "Failed to create session");
                            (session, Some(Arc::new(source)))
                        }
                    };
                    session.name = name.to_string();
                    debug!(session = name, is_new = session.is_new, "Registered session");

                    let info = Arc::new(SessionInfo {
                        session: Arc::new(Mutex::new(session)),
                        error,
                        store: StdMutex::new(None),
                    });
                    sessions.insert(name.to_string(), info.clone());
                    info
                }
            }
        };

        info.set_store(Some(store));

        match &info.error {
            None => Ok(info.session.clone()),
            Some(source) => Err(SessionError::Creation {
                name: name.to_string(),
                session: info.session.clone(),
                source: source.clone(),
            }),
        }
    }

    /// Persist every registered session through its store.
    ///
    /// A failing session does not stop the others from being saved; all
    /// failures come back together as [`SessionError::Multi`].
    pub async fn save(&self, response: &mut HeaderMap) -> SessionResult<()> {
        let entries: Vec<(String, Arc<SessionInfo>)> = {
            let sessions = self.sessions.lock().await;
            sessions
                .iter()
                .map(|(name, info)| (name.clone(), info.clone()))
                .collect()
        };

        let mut errors = MultiError::new();
        for (name, info) in entries {
            let Some(store) = info.store() else {
                errors.push(SessionError::MissingStore(name));
                continue;
            };
            let mut session = info.session.lock().await;
            if let Err(source) = store.save_session(&self.request, response, &mut session).await {
                errors.push(SessionError::Save { name, source });
            }
        }

        if !errors.is_empty() {
            warn!(failed = errors.len(), error = %errors, "Failed to save sessions");
        }
        errors.into_result()
    }

    /// The store that will persist the session called `name`, if registered.
    pub async fn session_store(&self, name: &str) -> Option<SessionStoreRef> {
        let info = self.sessions.lock().await.get(name).cloned()?;
        info.store()
    }

    /// Number of sessions registered so far
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
