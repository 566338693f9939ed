//! Authentication module for managing the session lifecycle.
//!
//! This module provides:
//! - `SessionStore`: process-wide signed-in state with change subscriptions
//! - `SessionManager`: the sign-in/sign-out/restore operation surface
//! - `Credentials`: sign-in form data with local shape validation
//!
//! Sessions are persisted to durable storage and restored on launch,
//! before the first screen mounts.

pub mod credentials;
pub mod error;
pub mod manager;
pub mod session;
pub mod store;

pub use credentials::{Credentials, FieldError};
pub use error::{AuthError, StorageWarning};
pub use manager::{AuthPayload, CredentialVerifier, SessionManager};
pub use session::{Session, SessionState};
pub use store::{SessionStore, SessionWatcher};
