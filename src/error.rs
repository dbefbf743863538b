//! Error types for qbit-brush
//!
//! This module provides the error handling surface for the library:
//! - Domain-specific error variants (unreachable client, missing feed, config)
//! - Automatic conversions from the underlying HTTP/serialization errors
//! - A crate-wide [`Result`] alias
//!
//! Failures are contained at the smallest unit of work: a single torrent or
//! article failure is logged and counted, a feed failure skips that feed, a
//! client failure skips that client. Nothing in a cycle terminates the loop.

use thiserror::Error;

/// Result type alias for qbit-brush operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for qbit-brush
///
/// Each variant carries enough context to diagnose the failing client, feed,
/// or configuration key from a log line alone.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "clients")
        key: Option<String>,
    },

    /// The download client cannot be queried or commanded
    #[error("client {client} unreachable: {reason}")]
    UnreachableClient {
        /// Configured name of the client
        client: String,
        /// Underlying cause (connection refused, timeout, auth rejection, ...)
        reason: String,
    },

    /// A configured RSS feed name is not registered on the client
    #[error("RSS feed not registered on client: {0}")]
    FeedNotFound(String),

    /// The client rejected the supplied credentials
    #[error("client {client} rejected login credentials")]
    AuthRejected {
        /// Configured name of the client
        client: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client answered with a payload the wire structs cannot interpret
    #[error("malformed client response: {0}")]
    MalformedResponse(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build an [`Error::UnreachableClient`] from any displayable cause
    pub fn unreachable(client: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::UnreachableClient {
            client: client.into(),
            reason: reason.to_string(),
        }
    }

    /// Build an [`Error::Config`] with an optional offending key
    pub fn config(message: impl Into<String>, key: Option<&str>) -> Self {
        Error::Config {
            message: message.into(),
            key: key.map(str::to_string),
        }
    }
}
