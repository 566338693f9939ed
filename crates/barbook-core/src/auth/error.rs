use thiserror::Error;

use super::FieldError;
use crate::api::ApiError;

/// Why a session operation failed.
///
/// Callers branch on the variant: `Validation` is fixed by correcting the
/// form, `BadCredentials` by different credentials, `Network` by retrying
/// later, `OperationInFlight` by waiting for the pending call to resolve.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Local shape checks failed; the network was never contacted.
    #[error("credentials failed validation")]
    Validation(Vec<FieldError>),

    /// The endpoint understood the request and said no.
    #[error("e-mail or password was rejected")]
    BadCredentials,

    /// The endpoint was unreachable, timed out, or failed on its side.
    #[error("could not reach the sign-in service")]
    Network(#[source] ApiError),

    /// Another mutating session operation is still pending.
    #[error("another sign-in or sign-out is still in progress")]
    OperationInFlight,

    /// Durable storage rejected an operation; the in-memory state was
    /// left untouched.
    #[error("failed to access persisted session state")]
    Storage(#[source] anyhow::Error),
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            // Only a definitive 401 means the credentials themselves were
            // wrong; everything else is transient from the caller's side.
            ApiError::Unauthorized => AuthError::BadCredentials,
            other => AuthError::Network(other),
        }
    }
}

/// Non-fatal inconsistency reported by sign-out: the user is signed out
/// either way, but durable storage may still hold stale session keys.
#[derive(Debug, Clone)]
pub struct StorageWarning {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_mapping() {
        assert!(matches!(
            AuthError::from(ApiError::Unauthorized),
            AuthError::BadCredentials
        ));
        assert!(matches!(
            AuthError::from(ApiError::Unavailable {
                status: 502,
                detail: "upstream down".to_string(),
            }),
            AuthError::Network(_)
        ));
        assert!(matches!(
            AuthError::from(ApiError::RateLimited),
            AuthError::Network(_)
        ));
    }
}
