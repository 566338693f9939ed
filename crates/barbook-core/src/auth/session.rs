use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::UserProfile;

/// An authenticated session: the identity and opaque token currently
/// active in the process.
///
/// At most one session is live per process; it is owned by the
/// `SessionStore` and replaced wholesale, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Session {
    pub user: UserProfile,
    /// Server-issued bearer token. Opaque: nothing in this crate
    /// interprets its contents.
    pub token: String,
    #[serde(rename = "issuedAt")]
    pub issued_at: DateTime<Utc>,
}

/// On-disk companion to the token key: the profile plus the moment the
/// token was issued, so a restored session keeps its original issue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct UserRecord {
    pub user: UserProfile,
    #[serde(rename = "issuedAt")]
    pub issued_at: DateTime<Utc>,
}

/// Lifecycle of the process-wide session.
///
/// `Unknown` is the only initial state and is transient: session
/// restoration resolves it to one of the other two before any screen
/// renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Persisted state not inspected yet (startup only).
    #[default]
    Unknown,
    /// Nobody is signed in.
    Anonymous,
    /// A user is signed in.
    Authenticated(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Authenticated(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    /// Whether startup restoration has run yet.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, SessionState::Unknown)
    }
}
