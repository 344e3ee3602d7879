use std::fmt::{self, Display};
use std::sync::Arc;

use thiserror::Error;

use crate::session::{Session, SessionRef};

/// Errors raised by a storage backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// No stored state for the given session id
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Stored state exists but is past its expiry
    #[error("Session expired: {0}")]
    Expired(String),

    /// Error occurred during a store operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// A cookie could not be turned into a header value
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// Failure of [`SessionStore::new_session`](crate::session::SessionStore::new_session).
///
/// A store always hands back a usable session, even when loading the
/// existing one failed, so the fallback session travels with the error.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct NewSessionError {
    pub session: Session,
    #[source]
    pub source: StoreError,
}

impl NewSessionError {
    pub fn new(session: Session, source: StoreError) -> Self {
        Self { session, source }
    }
}

/// Session registry errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("sessions: invalid character in cookie name: {0}")]
    InvalidName(String),

    /// The store failed to create the session. The failure is pinned for the
    /// lifetime of the registry and `session` is the store's fallback.
    #[error("sessions: error creating session {name:?} -- {source}")]
    Creation {
        name: String,
        session: SessionRef,
        #[source]
        source: Arc<StoreError>,
    },

    #[error("sessions: missing store for session {0:?}")]
    MissingStore(String),

    #[error("sessions: error saving session {name:?} -- {source}")]
    Save {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("sessions: no registry attached to the request")]
    NoRegistry,

    #[error(transparent)]
    Multi(MultiError),

    #[error("Configuration Error: {0}")]
    Config(String),
}

impl SessionError {
    /// The fallback session carried by a creation failure.
    pub fn session(&self) -> Option<&SessionRef> {
        match self {
            SessionError::Creation { session, .. } => Some(session),
            _ => None,
        }
    }

    /// The individual failures, if this is an aggregate.
    pub fn as_multi(&self) -> Option<&MultiError> {
        match self {
            SessionError::Multi(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Every failure collected during one save, in the order encountered.
#[derive(Debug, Default)]
pub struct MultiError(Vec<SessionError>);

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: SessionError) {
        self.0.push(error);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SessionError> {
        self.0.iter()
    }

    /// `Ok(())` when nothing was collected, the aggregate otherwise.
    pub fn into_result(self) -> SessionResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(SessionError::Multi(self))
        }
    }
}

impl Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "(0 errors)"),
            [only] => write!(f, "{}", only),
            [first, _] => write!(f, "{} (and 1 other error)", first),
            [first, rest @ ..] => write!(f, "{} (and {} other errors)", first, rest.len()),
        }
    }
}

impl std::error::Error for MultiError {}

impl IntoIterator for MultiError {
    type Item = SessionError;
    type IntoIter = std::vec::IntoIter<SessionError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a MultiError {
    type Item = &'a SessionError;
    type IntoIter = std::slice::Iter<'a, SessionError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;
