// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core remote store trait for Bazaar.
//
// Defines the `RemoteStore` trait: the single interface the cache consumes
// from the hosted relational store. A store runs one predicate query and
// returns the matching rows. Stores are expected to be thread-safe
// (`Send + Sync`) and fully asynchronous.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::predicate::{QueryRequest, Row};

/// A remote relational store that answers predicate queries.
///
/// Rows are opaque JSON objects. Implementations must be safe to share
/// across threads and tokio tasks.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Run `request` and return every matching row.
    ///
    /// An empty result is `Ok(vec![])`, never an error.
    async fn query(&self, request: &QueryRequest) -> Result<Vec<Row>, RemoteError>;

    /// A human-readable name for this store, used in logging.
    fn name(&self) -> &str;
}

#[async_trait]
impl<S: RemoteStore + ?Sized> RemoteStore for Arc<S> {
    async fn query(&self, request: &QueryRequest) -> Result<Vec<Row>, RemoteError> {
        (**self).query(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
