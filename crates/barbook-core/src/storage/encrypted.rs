//! Encrypted-at-rest storage backend.
//!
//! Wraps `FileStorage` with XChaCha20-Poly1305 over every value, so the
//! session token never touches disk in the clear. Key custody comes in
//! two flavors: a random key filed in the OS keychain, or a key derived
//! from a passphrase for sandboxes without a usable keychain.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use keyring::Entry;
use rand::RngCore;
use tracing::debug;

use super::{FileStorage, KeyValueStorage};

/// Keychain service under which the storage key is filed
const KEYRING_SERVICE: &str = "barbook";

/// Keychain entry name for the storage key
const KEYRING_KEY_NAME: &str = "storage-key";

/// Cipher key length in bytes (XChaCha20-Poly1305)
const KEY_LEN: usize = 32;

/// Nonce length in bytes; a fresh nonce is prepended to every ciphertext
const NONCE_LEN: usize = 24;

/// Storage key holding the salt for passphrase-derived keys
const SALT_KEY: &str = "storage.salt";
const SALT_LEN: usize = 16;

pub struct EncryptedStorage {
    inner: FileStorage,
    cipher: XChaCha20Poly1305,
}

impl EncryptedStorage {
    /// Open storage keyed from the OS keychain, generating and filing a
    /// fresh key on first use.
    pub fn with_keyring(dir: impl Into<PathBuf>) -> Result<Self> {
        let entry = Entry::new(KEYRING_SERVICE, KEYRING_KEY_NAME)
            .context("Failed to open keychain entry")?;

        let key = match entry.get_password() {
            Ok(encoded) => {
                let bytes = STANDARD
                    .decode(encoded.trim())
                    .context("Stored storage key is not valid base64")?;
                if bytes.len() != KEY_LEN {
                    return Err(anyhow!("Stored storage key has the wrong length"));
                }
                bytes
            }
            Err(keyring::Error::NoEntry) => {
                let mut key = vec![0u8; KEY_LEN];
                rand::thread_rng().fill_bytes(&mut key);
                entry
                    .set_password(&STANDARD.encode(&key))
                    .context("Failed to file storage key in keychain")?;
                debug!("Generated new storage key");
                key
            }
            Err(e) => return Err(e).context("Failed to read storage key from keychain"),
        };

        Self::with_key(dir, &key)
    }

    /// Open storage keyed from a passphrase via Argon2id, with a random
    /// salt persisted next to the entries.
    pub fn with_passphrase(dir: impl Into<PathBuf>, passphrase: &str) -> Result<Self> {
        let inner = FileStorage::new(dir)?;
        let salt = Self::load_or_create_salt(&inner)?;

        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), &salt, &mut key)
            .map_err(|e| anyhow!("Key derivation failed: {}", e))?;

        Ok(Self {
            cipher: XChaCha20Poly1305::new(Key::from_slice(&key)),
            inner,
        })
    }

    fn with_key(dir: impl Into<PathBuf>, key: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: FileStorage::new(dir)?,
            cipher: XChaCha20Poly1305::new(Key::from_slice(key)),
        })
    }

    fn load_or_create_salt(inner: &FileStorage) -> Result<Vec<u8>> {
        if let Some(salt) = inner.get(SALT_KEY)? {
            return Ok(salt);
        }
        let mut salt = vec![0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        inner.set(SALT_KEY, &salt)?;
        Ok(salt)
    }
}

impl KeyValueStorage for EncryptedStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let Some(blob) = self.inner.get(key)? else {
            return Ok(None);
        };
        if blob.len() < NONCE_LEN {
            return Err(anyhow!("Encrypted entry {} is truncated", key));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| anyhow!("Failed to decrypt storage entry {}", key))?;
        Ok(Some(plaintext))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), value)
            .map_err(|_| anyhow!("Failed to encrypt storage entry {}", key))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        self.inner.set(key, &blob)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key)
    }
}
