//! Per-request session registry for HTTP services.
//!
//! Attach a [`session::Registry`] to each request, fetch sessions by name from
//! anywhere in the handler chain, and save them all in one pass when the
//! response is ready.

pub mod config;
pub mod errors;
pub mod http_server;
pub mod session;

pub use errors::{MultiError, NewSessionError, SessionError, SessionResult, StoreError};
