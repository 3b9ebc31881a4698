//! Tracking of outstanding asynchronous field mutations.
//!
//! The engine never awaits these operations itself. Each one runs as a local
//! task that removes itself from its set when it settles, successfully or
//! not. Callers that need quiescence (e.g. before serializing state) await
//! the combined wait, which covers exactly the operations outstanding at the
//! moment it was requested.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::error::EngineError;

/// Why a tracked operation did not complete successfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PendingError {
    /// The operation itself failed.
    #[error("pending operation rejected: {0}")]
    Rejected(String),

    /// The operation's task was dropped before it settled.
    #[error("pending operation abandoned before settling")]
    Abandoned,
}

/// Outcome of a tracked operation or of a combined wait.
pub type PendingResult = Result<(), PendingError>;

/// Future resolving once every covered operation has settled.
pub type PendingWait = Pin<Box<dyn Future<Output = PendingResult>>>;

type Settlement = watch::Receiver<Option<PendingResult>>;

/// The outstanding operations of one instance.
#[derive(Default)]
pub struct PendingSet {
    next_id: Cell<u64>,
    ops: Rc<RefCell<BTreeMap<u64, Settlement>>>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `op`.
    ///
    /// The operation is spawned with [`tokio::task::spawn_local`], so this
    /// must be called from within a [`tokio::task::LocalSet`]. Without any
    /// tokio runtime it fails with [`EngineError::NoAsyncRuntime`] and
    /// nothing is tracked.
    pub fn register<F, T, E>(&self, op: F) -> crate::error::Result<()>
    where
        F: Future<Output = Result<T, E>> + 'static,
        T: 'static,
        E: Display + 'static,
    {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(EngineError::NoAsyncRuntime);
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let (tx, rx) = watch::channel(None);
        self.ops.borrow_mut().insert(id, rx);
        debug!(pending = id, "pending operation registered");

        let ops = Rc::downgrade(&self.ops);
        tokio::task::spawn_local(async move {
            let outcome = match op.await {
                Ok(_) => Ok(()),
                Err(e) => Err(PendingError::Rejected(e.to_string())),
            };
            if let Some(ops) = ops.upgrade() {
                ops.borrow_mut().remove(&id);
            }
            debug!(pending = id, ok = outcome.is_ok(), "pending operation settled");
            tx.send_replace(Some(outcome));
        });
        Ok(())
    }

    /// Number of outstanding operations.
    pub fn len(&self) -> usize {
        self.ops.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.borrow().is_empty()
    }

    /// A wait over the operations outstanding right now, or `None` if there
    /// are none. Computed fresh on every call.
    pub fn wait(&self) -> Option<PendingWait> {
        let settlements: Vec<Settlement> = self.ops.borrow().values().cloned().collect();
        if settlements.is_empty() {
            return None;
        }
        Some(Box::pin(wait_all(settlements)))
    }
}

impl fmt::Debug for PendingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSet")
            .field("outstanding", &self.len())
            .finish()
    }
}

/// Await every settlement, then report the first rejection in registration
/// order.
async fn wait_all(settlements: Vec<Settlement>) -> PendingResult {
    let mut result = Ok(());
    for mut settlement in settlements {
        let outcome = match settlement.wait_for(Option::is_some).await {
            Ok(settled) => settled.clone().unwrap_or(Err(PendingError::Abandoned)),
            Err(_) => Err(PendingError::Abandoned),
        };
        if result.is_ok() {
            result = outcome;
        }
    }
    result
}

/// Combine several waits into one, or `None` if there are none.
pub fn join_waits(waits: Vec<PendingWait>) -> Option<PendingWait> {
    if waits.is_empty() {
        return None;
    }
    Some(Box::pin(async move {
        let mut result = Ok(());
        for wait in waits {
            let outcome = wait.await;
            if result.is_ok() {
                result = outcome;
            }
        }
        result
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;
    use tokio::task::LocalSet;

    type Trigger = oneshot::Sender<Result<(), String>>;

    fn track(set: &PendingSet) -> Trigger {
        let (tx, rx) = oneshot::channel::<Result<(), String>>();
        set.register(async move { rx.await.unwrap_or_else(|_| Err("dropped".into())) })
            .unwrap();
        tx
    }

    #[test]
    fn empty_set_has_no_wait() {
        let set = PendingSet::new();
        assert!(set.wait().is_none());
        assert!(join_waits(Vec::new()).is_none());
    }

    #[test]
    fn registering_without_a_runtime_fails_cleanly() {
        let set = PendingSet::new();
        assert_eq!(
            set.register(async { Ok::<(), String>(()) }),
            Err(EngineError::NoAsyncRuntime)
        );
        assert!(set.is_empty());
        assert!(set.wait().is_none());
    }

    #[tokio::test]
    async fn wait_resolves_after_all_settle() {
        LocalSet::new()
            .run_until(async {
                let set = PendingSet::new();
                let first = track(&set);
                let second = track(&set);
                assert_eq!(set.len(), 2);

                let wait = set.wait().unwrap();
                first.send(Ok(())).unwrap();
                tokio::task::yield_now().await;
                // One settled, one still outstanding.
                assert_eq!(set.len(), 1);

                second.send(Ok(())).unwrap();
                assert_eq!(wait.await, Ok(()));
                assert!(set.is_empty());
                assert!(set.wait().is_none());
            })
            .await;
    }

    #[tokio::test]
    async fn rejection_still_settles_and_propagates() {
        LocalSet::new()
            .run_until(async {
                let set = PendingSet::new();
                let ok = track(&set);
                let failing = track(&set);

                let wait = set.wait().unwrap();
                failing.send(Err("boom".into())).unwrap();
                ok.send(Ok(())).unwrap();

                assert_eq!(wait.await, Err(PendingError::Rejected("boom".into())));
                assert!(set.is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn wait_is_not_memoized() {
        LocalSet::new()
            .run_until(async {
                let set = PendingSet::new();
                let first = track(&set);
                let early = set.wait().unwrap();

                let second = track(&set);
                first.send(Ok(())).unwrap();
                // The early wait only covers the first operation.
                assert_eq!(early.await, Ok(()));
                assert_eq!(set.len(), 1);

                let late = set.wait().unwrap();
                second.send(Err("late".into())).unwrap();
                assert_eq!(late.await, Err(PendingError::Rejected("late".into())));
            })
            .await;
    }

    #[tokio::test]
    async fn joined_waits_report_first_rejection() {
        LocalSet::new()
            .run_until(async {
                let a = PendingSet::new();
                let b = PendingSet::new();
                let ta = track(&a);
                let tb = track(&b);

                let joined = join_waits(vec![a.wait().unwrap(), b.wait().unwrap()]).unwrap();
                tb.send(Err("b failed".into())).unwrap();
                ta.send(Ok(())).unwrap();
                assert_eq!(joined.await, Err(PendingError::Rejected("b failed".into())));
            })
            .await;
    }
}
