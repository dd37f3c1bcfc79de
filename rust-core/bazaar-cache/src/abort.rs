// SPDX-License-Identifier: PMPL-1.0-or-later
//! Cooperative cancellation.
//!
//! An [`AbortController`] owns the flag; any number of [`AbortSignal`]s
//! observe it. Aborting is one-way. A signal whose controller was dropped
//! without aborting never fires.

use tokio::sync::watch;

use crate::error::{CacheError, Result};

/// The owning side of an abort flag.
#[derive(Debug)]
pub struct AbortController {
    tx: watch::Sender<bool>,
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// A new observer of this controller.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the flag. Idempotent.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// The observing side of an abort flag.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// `Err(Aborted)` once the flag has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_aborted() {
            Err(CacheError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Resolves when the flag fires; pends forever if it never can.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Check an optional signal.
pub(crate) fn check(signal: Option<&AbortSignal>) -> Result<()> {
    signal.map_or(Ok(()), AbortSignal::check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_abort_is_visible_to_every_signal() {
        let controller = AbortController::new();
        let a = controller.signal();
        let b = a.clone();
        assert!(!a.is_aborted());
        assert!(a.check().is_ok());

        controller.abort();
        controller.abort();
        assert!(controller.is_aborted());
        assert!(a.is_aborted());
        assert_eq!(b.check(), Err(CacheError::Aborted));
        assert!(controller.signal().is_aborted());
    }

    #[test]
    fn test_check_optional() {
        assert!(check(None).is_ok());
        let controller = AbortController::new();
        controller.abort();
        assert!(check(Some(&controller.signal())).unwrap_err().is_aborted());
    }

    #[tokio::test]
    async fn test_aborted_future_wakes() {
        let controller = AbortController::new();
        let signal = controller.signal();
        let waiter = tokio::spawn(async move { signal.aborted().await });

        tokio::task::yield_now().await;
        controller.abort();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_controller_never_fires() {
        let signal = AbortController::new().signal();
        let result = tokio::time::timeout(Duration::from_millis(20), signal.aborted()).await;
        assert!(result.is_err());
        assert!(!signal.is_aborted());
    }
}
