//! Data models for barbook entities.
//!
//! This module contains the data structures shared between the API layer
//! and the session lifecycle:
//!
//! - `UserProfile`: the signed-in account holder

pub mod user;

pub use user::UserProfile;
