//! Core library for the barbook mobile companion.
//!
//! This crate owns the client-side authentication session lifecycle:
//! verifying credentials against the barbook API, persisting the resulting
//! session token, and exposing the signed-in state to the UI layers.
//!
//! The UI crates construct one [`SessionStore`] and one [`SessionManager`]
//! at launch, call [`SessionManager::restore_session`] before the first
//! screen mounts, and subscribe to the store to decide what to render.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError};
pub use auth::{
    AuthError, Credentials, FieldError, Session, SessionManager, SessionState, SessionStore,
    StorageWarning,
};
pub use config::Config;
pub use models::UserProfile;
pub use storage::{EncryptedStorage, FileStorage, KeyValueStorage, MemoryStorage};
