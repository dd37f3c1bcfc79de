// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Remote store error types for Bazaar.
//
// Covers every failure mode a remote store may report: transport errors,
// non-2xx responses, undecodable payloads, unknown collections, and requests
// that exceed the store's predicate-size ceiling.

use thiserror::Error;

/// Errors that can occur when querying a remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// An underlying HTTP / network transport error from `reqwest`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The remote store answered with a non-success status.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code (e.g. 400, 500, 503).
        status: u16,
        /// Message extracted from the response body, if any.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The named collection does not exist in the store.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// An `in` predicate carried more values than the store accepts.
    #[error("predicate too large: {size} values (max: {max})")]
    PredicateTooLarge {
        /// Number of values in the offending predicate.
        size: usize,
        /// Maximum number of values per predicate.
        max: usize,
    },

    /// The request could not be built (bad URL, bad header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The store is temporarily unavailable.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

/// Crate-level result alias using [`RemoteError`].
pub type Result<T> = std::result::Result<T, RemoteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_display() {
        let err = RemoteError::Server {
            status: 503,
            message: "upstream timeout".to_string(),
        };
        assert_eq!(err.to_string(), "server error (503): upstream timeout");
    }

    #[test]
    fn test_unknown_collection_display() {
        let err = RemoteError::UnknownCollection("recipes".to_string());
        assert_eq!(err.to_string(), "unknown collection: recipes");
    }

    #[test]
    fn test_predicate_too_large_display() {
        let err = RemoteError::PredicateTooLarge { size: 1500, max: 1000 };
        assert!(err.to_string().contains("1500"));
        assert!(err.to_string().contains("1000"));
    }

    #[test]
    fn test_serialization_from_serde() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = RemoteError::from(parse_err);
        assert!(err.to_string().starts_with("serialization error"));
    }
}
