use crate::types::{Completion, ProbeOutcome, Target};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Bounded-concurrency probe executor.
///
/// - Limits in-flight probes using one `Semaphore` shared by every batch.
/// - Streams each `(target, outcome)` as soon as its probe finishes, in
///   completion order rather than submission order.
/// - A panicking probe is caught at the task boundary and reported as
///   `ProbeOutcome::None`; its siblings keep running.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    width: usize,
    permits: Arc<Semaphore>,
}

impl Dispatcher {
    pub fn new(width: usize) -> Self {
        let width = width.max(1);
        Self {
            width,
            permits: Arc::new(Semaphore::new(width)),
        }
    }

    /// Run `probe` over every target. Excess targets wait for a free permit.
    /// Every target yields exactly one completion.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime, since the batch is driven by
    /// a spawned task.
    pub fn dispatch<F, Fut>(&self, targets: Vec<Target>, probe: F) -> Completions
    where
        F: Fn(Target) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeOutcome> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.width);
        let permits = self.permits.clone();
        let probe = Arc::new(probe);
        let total = targets.len();

        tokio::spawn(async move {
            let mut set = JoinSet::new();
            for target in targets {
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    log::error!("dispatcher semaphore closed; dropping remaining targets");
                    break;
                };
                let probe = probe.clone();
                let tx = tx.clone();

                set.spawn(async move {
                    let _permit = permit; // keep permit until the probe completes

                    let outcome = AssertUnwindSafe(async { probe(target.clone()).await })
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            log::warn!("probe for {target} panicked; treating as no response");
                            ProbeOutcome::None
                        });
                    // Receiver gone means the caller stopped draining; nothing to report to.
                    let _ = tx.send(Completion { target, outcome }).await;
                });
            }
            drop(tx);
            while set.join_next().await.is_some() {}
        });

        Completions { rx, total }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(crate::types::ScanConfig::DEFAULT_POOL)
    }
}

/// Completion stream of one dispatched batch.
#[derive(Debug)]
pub struct Completions {
    rx: mpsc::Receiver<Completion>,
    total: usize,
}

impl Completions {
    /// Next finished probe, or `None` once the whole batch has been delivered.
    pub async fn next(&mut self) -> Option<Completion> {
        self.rx.recv().await
    }

    /// Number of targets submitted in this batch.
    pub fn total(&self) -> usize {
        self.total
    }
}
