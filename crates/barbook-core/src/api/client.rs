//! HTTP client for the barbook REST API.
//!
//! This module provides the `ApiClient` struct implementing the
//! credential-verification half of the sign-in protocol: POST the form's
//! e-mail and password to the sessions endpoint, get back a bearer token
//! and the account profile.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{AuthPayload, CredentialVerifier};
use crate::config::Config;
use crate::models::UserProfile;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL for the barbook API
const DEFAULT_BASE_URL: &str = "https://api.barbook.app";

/// HTTP request timeout in seconds.
/// 15s tolerates slow mobile links while failing fast enough for a
/// sign-in screen the user is staring at.
const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
    user: UserProfile,
}

/// API client for barbook.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client against the production endpoint
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client honoring a configured endpoint override
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        match config.api_base_url.as_deref() {
            Some(url) => Self::with_base_url(url),
            None => Self::new(),
        }
    }

    /// Create a client against a non-default endpoint (staging, tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Check if response is successful, returning a classified error with
    /// the body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_response(status, &body))
        }
    }
}

#[async_trait]
impl CredentialVerifier for ApiClient {
    async fn verify(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        let url = format!("{}/sessions", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&SessionRequest { email, password })
            .send()
            .await?;

        let response = Self::check_response(response).await?;

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        debug!(user = %session.user.email, "Credentials accepted by the API");

        Ok(AuthPayload {
            token: session.token,
            user: session.user,
        })
    }
}
