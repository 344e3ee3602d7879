//! Session management
//!
//! Sessions are created and cached per request by a [`Registry`] attached to
//! the request's extensions, and persisted in one batch at the end of the
//! request. Storage is pluggable through the [`SessionStore`] trait.

pub mod adapters;
pub mod cookies;
pub mod name;
pub mod registry;
pub mod request;
pub mod store;

pub use adapters::InMemorySessionStore;
pub use cookies::{append_cookie, new_cookie};
pub use name::is_cookie_name_valid;
pub use registry::{attach_registry, registry_from_extensions, save, Registry, RegistryRef};
pub use request::RequestInfo;
pub use store::{SameSite, Session, SessionOptions, SessionRef, SessionStore, SessionStoreRef};
