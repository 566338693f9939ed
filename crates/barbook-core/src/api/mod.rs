//! REST API client module for the barbook service.
//!
//! This module provides the `ApiClient` used to exchange credentials for
//! a bearer token at the sessions endpoint. Transport policy (base URL,
//! timeout, TLS) lives here; the session lifecycle sees the client only
//! through the `CredentialVerifier` seam.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
