//! Common error types used throughout puzzlegallery.
//!
//! This module provides a unified error type covering the failure cases of
//! the gallery store: missing records, duplicate keys, connectivity and
//! database failures, and caller-driven cancellation.

/// Common error type for puzzlegallery.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No record matched a single-record lookup.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A unique key already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A connected handle could not be acquired.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// The caller cancelled the request.
    #[error("Operation cancelled")]
    Cancelled,

    /// The caller's deadline elapsed.
    #[error("Operation timed out")]
    Timeout,

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Conflict error.
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a new Connection error.
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this is a missing-record error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this is a duplicate-key error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
