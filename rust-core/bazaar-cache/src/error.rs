// SPDX-License-Identifier: PMPL-1.0-or-later
//! Cache error types.
//!
//! `CacheError` is `Clone` so a single resolver outcome can be handed to
//! every caller attached to the same in-flight query.

use bazaar_remote::RemoteError;
use thiserror::Error;

use crate::kind::QueryKind;

/// Errors surfaced by [`MarketCache`](crate::market::MarketCache) operations.
///
/// Not-found is never an error: missing keys are simply absent from results.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The caller's abort signal fired before an answer was available.
    #[error("query aborted")]
    Aborted,

    /// A remote failure that could not be absorbed.
    #[error("remote store error: {0}")]
    Remote(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The resolver task panicked or was cancelled by runtime shutdown.
    #[error("resolver failed: {0}")]
    ResolverFailed(String),

    /// A cached value had a different shape than its kind produces.
    #[error("cached value for {kind} has an unexpected shape")]
    ShapeMismatch { kind: QueryKind },
}

impl CacheError {
    /// Whether this outcome means "no answer yet" rather than a failure.
    pub fn is_aborted(&self) -> bool {
        matches!(self, CacheError::Aborted)
    }
}

impl From<RemoteError> for CacheError {
    fn from(err: RemoteError) -> Self {
        CacheError::Remote(err.to_string())
    }
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, CacheError>;
