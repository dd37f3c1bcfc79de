// SPDX-License-Identifier: PMPL-1.0-or-later
//! Single-flight resolution.
//!
//! A miss registers a [`PendingFlight`] whose outcome is a
//! `futures::future::Shared` over a oneshot receiver, so every caller with
//! the same `(kind, key)` awaits the same outcome. Once the store lock is
//! released, [`launch`] spawns the resolver task. The task owns a
//! [`FlightGuard`] that publishes on success and always releases the
//! in-flight slot when dropped: after success, failure, panic, or runtime
//! shutdown.
//!
//! Callers race the shared outcome against their own abort signal. Giving up
//! never cancels the resolver; it still completes and populates the cache.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::abort::AbortSignal;
use crate::error::CacheError;
use crate::store::{CacheStore, FlightTicket};
use crate::value::CachedValue;

/// Outcome of one resolution.
pub type Outcome = Result<CachedValue, CacheError>;

/// A multi-subscriber handle to one resolution's outcome.
pub type SharedOutcome = Shared<BoxFuture<'static, Outcome>>;

/// A registered resolution that has not been launched yet.
pub struct PendingFlight {
    pub ticket: FlightTicket,
    sender: oneshot::Sender<Outcome>,
}

impl PendingFlight {
    /// Register-side half: the pending flight and the outcome its waiters
    /// share.
    pub(crate) fn new(ticket: FlightTicket) -> (Self, SharedOutcome) {
        let (sender, receiver) = oneshot::channel();
        let kind = ticket.kind;
        let outcome = async move {
            receiver.await.unwrap_or_else(|_| {
                warn!(%kind, "Resolver ended without an outcome");
                Err(CacheError::ResolverFailed(
                    "resolver ended without an outcome".to_string(),
                ))
            })
        }
        .boxed()
        .shared();
        (Self { ticket, sender }, outcome)
    }
}

/// Owned by the resolver task; releases the in-flight slot on drop.
struct FlightGuard {
    store: Arc<CacheStore>,
    ticket: FlightTicket,
}

impl FlightGuard {
    fn complete(&self, outcome: &Outcome) {
        match outcome {
            Ok(value) => {
                self.store.publish(&self.ticket, value.clone());
            }
            Err(err) => {
                debug!(
                    kind = %self.ticket.kind,
                    key = %self.ticket.key,
                    error = %err,
                    "Resolution failed, nothing cached"
                );
            }
        }
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.store.resolve_in_flight(&self.ticket);
    }
}

/// Spawn the resolver for `pending` on the current tokio runtime.
///
/// Must not be called while holding the store lock. Without a runtime the
/// slot is released and waiters receive [`CacheError::ResolverFailed`].
pub fn launch<F>(store: Arc<CacheStore>, pending: PendingFlight, work: F)
where
    F: Future<Output = Outcome> + Send + 'static,
{
    let PendingFlight { ticket, sender } = pending;
    let kind = ticket.kind;
    let guard = FlightGuard { store, ticket };

    match Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                let guard = guard;
                let outcome = work.await;
                guard.complete(&outcome);
                drop(guard);
                let _ = sender.send(outcome);
            });
        }
        Err(err) => {
            warn!(%kind, error = %err, "No tokio runtime, resolution not started");
            drop(guard);
            let _ = sender.send(Err(CacheError::ResolverFailed(err.to_string())));
        }
    }
}

/// Await `outcome`, giving up with [`CacheError::Aborted`] as soon as
/// `signal` fires.
pub async fn await_outcome(outcome: SharedOutcome, signal: Option<&AbortSignal>) -> Outcome {
    let Some(signal) = signal else {
        return outcome.await;
    };
    signal.check()?;
    tokio::select! {
        biased;
        _ = signal.aborted() => Err(CacheError::Aborted),
        result = outcome => result,
    }
}

/// An outcome that is already settled.
#[cfg(test)]
pub(crate) fn ready_outcome(outcome: Outcome) -> SharedOutcome {
    futures::future::ready(outcome).boxed().shared()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abort::AbortController;
    use crate::key::NormalizedKey;
    use crate::kind::QueryKind;
    use crate::store::Begin;
    use crate::value::{Cacheable, FlagMap};
    use std::time::Duration;

    fn flags(id: i64) -> CachedValue {
        FlagMap::from([(id, true)]).into_cached()
    }

    async fn explode() -> Outcome {
        panic!("resolver blew up")
    }

    fn start<F>(store: &Arc<CacheStore>, key: &str, work: F) -> SharedOutcome
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        match store.begin(QueryKind::Marketable, &NormalizedKey::new(key)) {
            Begin::Started(outcome, pending) => {
                launch(Arc::clone(store), pending, work);
                outcome
            }
            _ => panic!("expected a new resolution"),
        }
    }

    #[tokio::test]
    async fn test_success_publishes_and_releases() {
        let store = Arc::new(CacheStore::new());
        let outcome = start(&store, "1", async { Ok::<_, CacheError>(flags(1)) });

        let value = outcome.await.unwrap();
        assert_eq!(value.len(), 1);
        assert_eq!(store.in_flight_count(), 0);
        assert!(store
            .get(QueryKind::Marketable, &NormalizedKey::new("1"))
            .is_some());
    }

    #[tokio::test]
    async fn test_failure_releases_without_caching() {
        let store = Arc::new(CacheStore::new());
        let outcome = start(&store, "1", async {
            Err::<CachedValue, _>(CacheError::Remote("down".into()))
        });

        assert_eq!(outcome.await.unwrap_err(), CacheError::Remote("down".into()));
        assert_eq!(store.in_flight_count(), 0);
        assert_eq!(store.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_panic_releases_slot() {
        let store = Arc::new(CacheStore::new());
        let outcome = start(&store, "1", explode());

        let err = outcome.await.unwrap_err();
        assert!(matches!(err, CacheError::ResolverFailed(_)));
        assert_eq!(store.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_all_subscribers_see_same_outcome() {
        let store = Arc::new(CacheStore::new());
        let outcome = start(&store, "7", async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, CacheError>(flags(7))
        });
        let (a, b) = tokio::join!(outcome.clone(), outcome);
        assert_eq!(a.unwrap().len(), 1);
        assert_eq!(b.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_abort_stops_only_the_wait() {
        let store = Arc::new(CacheStore::new());
        let outcome = start(&store, "3", async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, CacheError>(flags(3))
        });

        let controller = AbortController::new();
        let signal = controller.signal();
        let waiter = {
            let outcome = outcome.clone();
            tokio::spawn(async move { await_outcome(outcome, Some(&signal)).await })
        };
        controller.abort();

        assert_eq!(waiter.await.unwrap().unwrap_err(), CacheError::Aborted);
        assert!(await_outcome(outcome, None).await.is_ok());
        assert_eq!(store.in_flight_count(), 0);
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test]
    async fn test_pre_aborted_signal_returns_immediately() {
        let controller = AbortController::new();
        controller.abort();
        let result = await_outcome(ready_outcome(Ok(flags(1))), Some(&controller.signal())).await;
        assert!(result.unwrap_err().is_aborted());
    }

    #[test]
    fn test_launch_without_runtime_fails_and_releases() {
        let store = Arc::new(CacheStore::new());
        let outcome = start(&store, "9", async { Ok::<_, CacheError>(flags(9)) });

        assert_eq!(store.in_flight_count(), 0);
        let err = futures::executor::block_on(outcome).unwrap_err();
        assert!(matches!(err, CacheError::ResolverFailed(_)));
        assert_eq!(store.entry_count(), 0);
    }
}
