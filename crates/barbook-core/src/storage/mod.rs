//! Durable key-value storage for session material.
//!
//! The session manager reads and writes two fixed keys through the
//! `KeyValueStorage` trait; backends decide where and how the bytes live
//! (plain files, encrypted files, process memory).

pub mod encrypted;
pub mod file;
pub mod memory;

pub use encrypted::EncryptedStorage;
pub use file::FileStorage;
pub use memory::MemoryStorage;

use anyhow::Result;

/// Storage key holding the opaque session token, verbatim
pub const TOKEN_KEY: &str = "session.token";

/// Storage key holding the serialized user record
pub const USER_KEY: &str = "session.user";

/// Durable key-value storage scoped to this application's sandbox.
///
/// Implementations are touched one call at a time per operation; each
/// call acquires and releases whatever resource backs it, so a failed
/// write never blocks the next attempt.
pub trait KeyValueStorage: Send + Sync {
    /// Fetch the value for `key`, or `None` when it was never written.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<()>;
}
