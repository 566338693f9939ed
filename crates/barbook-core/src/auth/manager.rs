//! Sign-in/sign-out orchestration against the remote verifier and durable
//! storage.
//!
//! The manager owns the protocol ordering: verify remotely, persist, then
//! publish to the in-memory store. Persistence always lands before the
//! store update, so an interrupted sign-in can leave a persisted token
//! with no live session (recovered on next launch) but never a live
//! session that would vanish on restart.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::models::UserProfile;
use crate::storage::{KeyValueStorage, TOKEN_KEY, USER_KEY};

use super::session::UserRecord;
use super::{AuthError, Credentials, Session, SessionStore, StorageWarning};

/// What the verification endpoint hands back for accepted credentials.
#[derive(Debug, Clone)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserProfile,
}

/// Remote credential verification, behind a seam so transports and test
/// doubles can swap in.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError>;
}

/// Orchestrates the session lifecycle for one process.
pub struct SessionManager {
    verifier: Arc<dyn CredentialVerifier>,
    storage: Arc<dyn KeyValueStorage>,
    store: SessionStore,
    /// Serializes mutating operations. `sign_in` fails fast when it is
    /// held; `sign_out` waits its turn.
    op_guard: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        storage: Arc<dyn KeyValueStorage>,
        store: SessionStore,
    ) -> Self {
        Self {
            verifier,
            storage,
            store,
            op_guard: Mutex::new(()),
        }
    }

    /// The store this manager publishes to.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Exchange credentials for a session.
    ///
    /// Shape-checks the credentials locally first; invalid input never
    /// reaches the network. At most one mutating operation may be pending
    /// at a time - a concurrent call fails with `OperationInFlight`
    /// without touching any state.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        credentials.validate().map_err(AuthError::Validation)?;

        let _guard = self
            .op_guard
            .try_lock()
            .map_err(|_| AuthError::OperationInFlight)?;

        let payload = self
            .verifier
            .verify(&credentials.email, &credentials.password)
            .await?;

        let session = Session {
            user: payload.user,
            token: payload.token,
            issued_at: Utc::now(),
        };

        self.persist(&session).map_err(AuthError::Storage)?;
        self.store.set_session(session.clone());

        info!(user = %session.user.email, "Signed in");
        Ok(session)
    }

    /// Sign out, clearing durable storage before the in-memory session.
    ///
    /// Never fails: when storage deletion goes wrong the user still ends
    /// up signed out, and the leftover is reported as a warning.
    pub async fn sign_out(&self) -> Option<StorageWarning> {
        let _guard = self.op_guard.lock().await;

        let mut failures = Vec::new();
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.delete(key) {
                warn!(key, error = %e, "Failed to delete persisted session key");
                failures.push(format!("{key}: {e:#}"));
            }
        }

        self.store.clear();
        info!("Signed out");

        if failures.is_empty() {
            None
        } else {
            Some(StorageWarning {
                detail: failures.join("; "),
            })
        }
    }

    /// Rebuild the session persisted by an earlier launch, if any.
    ///
    /// Called once at startup, before any mutating operation. The token
    /// is not revalidated against the endpoint here; a stale token
    /// surfaces on the first authenticated request instead. Whatever
    /// happens, the store leaves `Unknown`.
    pub async fn restore_session(&self) -> Result<Option<Session>, AuthError> {
        match self.load_persisted() {
            Ok(Some(session)) => {
                self.store.set_session(session.clone());
                info!(user = %session.user.email, "Session restored");
                Ok(Some(session))
            }
            Ok(None) => {
                debug!("No persisted session");
                self.store.resolve_anonymous();
                Ok(None)
            }
            Err(e) => {
                // An unreadable store still resolves the lifecycle; as far
                // as the UI can tell, nobody is signed in.
                self.store.resolve_anonymous();
                Err(AuthError::Storage(e))
            }
        }
    }

    fn load_persisted(&self) -> anyhow::Result<Option<Session>> {
        let token = self.storage.get(TOKEN_KEY)?;
        let record = self.storage.get(USER_KEY)?;

        let (Some(token), Some(record)) = (token, record) else {
            // Either key alone is a remnant of an interrupted write, not
            // a session.
            return Ok(None);
        };

        let token = match String::from_utf8(token) {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Discarding persisted token: not valid UTF-8");
                return Ok(None);
            }
        };
        let record: UserRecord = match serde_json::from_slice(&record) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Discarding persisted session: user record unreadable");
                return Ok(None);
            }
        };

        Ok(Some(Session {
            user: record.user,
            token,
            issued_at: record.issued_at,
        }))
    }

    /// Write the user record before the token: a persisted token must
    /// always imply a recoverable record on the next launch.
    fn persist(&self, session: &Session) -> anyhow::Result<()> {
        let record = UserRecord {
            user: session.user.clone(),
            issued_at: session.issued_at,
        };
        self.storage.set(USER_KEY, &serde_json::to_vec(&record)?)?;
        self.storage.set(TOKEN_KEY, session.token.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionState;
    use crate::storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn profile() -> UserProfile {
        UserProfile {
            id: "u-1".to_string(),
            name: "Ana Souza".to_string(),
            email: "a@b.com".to_string(),
            avatar_url: None,
        }
    }

    fn creds() -> Credentials {
        Credentials::new("a@b.com", "secret")
    }

    enum Outcome {
        Accept(String),
        Reject,
        Unreachable,
    }

    /// Verifier double: counts calls and, when gated, parks inside
    /// `verify` until released.
    struct StubVerifier {
        outcome: Outcome,
        calls: AtomicUsize,
        entered: Notify,
        release: Option<Notify>,
    }

    impl StubVerifier {
        fn accepting(token: &str) -> Self {
            Self::with_outcome(Outcome::Accept(token.to_string()))
        }

        fn rejecting() -> Self {
            Self::with_outcome(Outcome::Reject)
        }

        fn unreachable() -> Self {
            Self::with_outcome(Outcome::Unreachable)
        }

        fn with_outcome(outcome: Outcome) -> Self {
            Self {
                outcome,
                calls: AtomicUsize::new(0),
                entered: Notify::new(),
                release: None,
            }
        }

        fn gated(mut self) -> Self {
            self.release = Some(Notify::new());
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialVerifier for StubVerifier {
        async fn verify(&self, _email: &str, _password: &str) -> Result<AuthPayload, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            if let Some(release) = &self.release {
                release.notified().await;
            }
            match &self.outcome {
                Outcome::Accept(token) => Ok(AuthPayload {
                    token: token.clone(),
                    user: profile(),
                }),
                Outcome::Reject => Err(ApiError::Unauthorized),
                Outcome::Unreachable => Err(ApiError::Unavailable {
                    status: 502,
                    detail: "bad gateway".to_string(),
                }),
            }
        }
    }

    /// Storage double failing the chosen operations.
    struct FailingStorage {
        inner: MemoryStorage,
        fail_set: bool,
        fail_delete: bool,
    }

    impl FailingStorage {
        fn on_set() -> Self {
            Self {
                inner: MemoryStorage::new(),
                fail_set: true,
                fail_delete: false,
            }
        }

        fn on_delete() -> Self {
            Self {
                inner: MemoryStorage::new(),
                fail_set: false,
                fail_delete: true,
            }
        }
    }

    impl KeyValueStorage for FailingStorage {
        fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
            if self.fail_set {
                anyhow::bail!("disk full");
            }
            self.inner.set(key, value)
        }

        fn delete(&self, key: &str) -> anyhow::Result<()> {
            if self.fail_delete {
                anyhow::bail!("sandbox revoked");
            }
            self.inner.delete(key)
        }
    }

    fn manager_with(
        verifier: Arc<dyn CredentialVerifier>,
        storage: Arc<dyn KeyValueStorage>,
    ) -> SessionManager {
        SessionManager::new(verifier, storage, SessionStore::new())
    }

    #[tokio::test]
    async fn test_invalid_credentials_never_reach_the_network() {
        let verifier = Arc::new(StubVerifier::accepting("T1"));
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager_with(verifier.clone(), storage.clone());

        let err = manager
            .sign_in(&Credentials::new("not-an-address", ""))
            .await
            .unwrap_err();

        let AuthError::Validation(fields) = err else {
            panic!("expected a validation failure");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(verifier.calls(), 0);
        assert!(storage.get(TOKEN_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_publishes_and_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager_with(Arc::new(StubVerifier::accepting("T1")), storage.clone());

        let session = manager.sign_in(&creds()).await.expect("sign-in succeeds");

        assert_eq!(session.token, "T1");
        assert_eq!(session.user, profile());
        assert_eq!(manager.store().session(), Some(session.clone()));

        assert_eq!(storage.get(TOKEN_KEY).unwrap().unwrap(), b"T1");
        let record: UserRecord =
            serde_json::from_slice(&storage.get(USER_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(record.user, profile());
        assert_eq!(record.issued_at, session.issued_at);
    }

    #[tokio::test]
    async fn test_rejected_credentials_leave_no_trace() {
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager_with(Arc::new(StubVerifier::rejecting()), storage.clone());

        let err = manager.sign_in(&creds()).await.unwrap_err();

        assert!(matches!(err, AuthError::BadCredentials));
        assert!(manager.store().session().is_none());
        assert!(storage.get(TOKEN_KEY).unwrap().is_none());
        assert!(storage.get(USER_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transport_failures_surface_as_network() {
        let manager = manager_with(
            Arc::new(StubVerifier::unreachable()),
            Arc::new(MemoryStorage::new()),
        );

        let err = manager.sign_in(&creds()).await.unwrap_err();
        assert!(matches!(err, AuthError::Network(_)));
        assert!(manager.store().session().is_none());
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_store_untouched() {
        let manager = manager_with(
            Arc::new(StubVerifier::accepting("T1")),
            Arc::new(FailingStorage::on_set()),
        );

        let err = manager.sign_in(&creds()).await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));
        assert!(manager.store().session().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_sign_in_is_rejected_without_racing() {
        let verifier = Arc::new(StubVerifier::accepting("T1").gated());
        let manager = Arc::new(manager_with(verifier.clone(), Arc::new(MemoryStorage::new())));

        let first = tokio::spawn({
            let manager = manager.clone();
            async move { manager.sign_in(&creds()).await }
        });

        // Wait until the first call is parked inside the verifier, holding
        // the guard.
        verifier.entered.notified().await;

        let err = manager.sign_in(&creds()).await.unwrap_err();
        assert!(matches!(err, AuthError::OperationInFlight));
        assert_eq!(verifier.calls(), 1);

        verifier.release.as_ref().unwrap().notify_one();
        let session = first
            .await
            .unwrap()
            .expect("the pending sign-in is unaffected");
        assert_eq!(session.token, "T1");
        assert_eq!(manager.store().session(), Some(session));
    }

    #[tokio::test]
    async fn test_sign_out_clears_storage_and_store() {
        let storage = Arc::new(MemoryStorage::new());
        let manager = manager_with(Arc::new(StubVerifier::accepting("T1")), storage.clone());

        manager.sign_in(&creds()).await.expect("sign-in succeeds");
        assert!(manager.store().is_authenticated());

        assert!(manager.sign_out().await.is_none());
        assert_eq!(manager.store().state(), SessionState::Anonymous);
        assert!(storage.get(TOKEN_KEY).unwrap().is_none());
        assert!(storage.get(USER_KEY).unwrap().is_none());

        // Signing out while already signed out is a silent no-op.
        assert!(manager.sign_out().await.is_none());
        assert_eq!(manager.store().state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_sign_out_survives_storage_failure() {
        let manager = manager_with(
            Arc::new(StubVerifier::accepting("T1")),
            Arc::new(FailingStorage::on_delete()),
        );
        manager.store().set_session(Session {
            user: profile(),
            token: "T1".to_string(),
            issued_at: Utc::now(),
        });

        let warning = manager.sign_out().await.expect("deletion failed");
        assert!(warning.detail.contains(TOKEN_KEY));
        // The user-visible effect wins regardless.
        assert_eq!(manager.store().state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_restore_round_trips_a_persisted_session() {
        let storage = Arc::new(MemoryStorage::new());
        let first = manager_with(Arc::new(StubVerifier::accepting("T1")), storage.clone());
        let session = first.sign_in(&creds()).await.expect("sign-in succeeds");

        // A fresh launch: new store, same storage.
        let second = manager_with(Arc::new(StubVerifier::rejecting()), storage);
        let restored = second
            .restore_session()
            .await
            .expect("restore succeeds")
            .expect("a session was persisted");

        assert_eq!(restored, session);
        assert_eq!(second.store().session(), Some(session));
    }

    #[tokio::test]
    async fn test_restore_on_empty_storage_resolves_anonymous() {
        let manager = manager_with(
            Arc::new(StubVerifier::rejecting()),
            Arc::new(MemoryStorage::new()),
        );

        let restored = manager.restore_session().await.expect("restore succeeds");
        assert!(restored.is_none());
        assert_eq!(manager.store().state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_restore_ignores_incomplete_remnants() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, b"T1").unwrap();

        let manager = manager_with(Arc::new(StubVerifier::rejecting()), storage);
        let restored = manager.restore_session().await.expect("restore succeeds");

        assert!(restored.is_none());
        assert_eq!(manager.store().state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_restore_discards_unreadable_records() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, b"T1").unwrap();
        storage.set(USER_KEY, b"{ not json").unwrap();

        let manager = manager_with(Arc::new(StubVerifier::rejecting()), storage);
        let restored = manager.restore_session().await.expect("restore succeeds");

        assert!(restored.is_none());
        assert_eq!(manager.store().state(), SessionState::Anonymous);
    }
}
