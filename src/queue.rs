//! Single-flight mutation queue.
//!
//! Document edits go through one FIFO lane consumed by one worker task, so
//! no two edits ever interleave. Jobs run strictly in submission order and a
//! job starts only after the previous one has settled. A failing or panicking
//! job reports to its own caller only; the lane keeps going.
//!
//! There is no priority and no withdrawal. A running job always runs to
//! completion; tearing down the lane drops jobs that have not started yet.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::QueueError;
use crate::pending::{OperationKind, PendingGuard, PendingRegistry};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handle to the mutation lane. Dropping it lets the lane drain and exit.
#[derive(Debug)]
pub struct MutationQueue {
    tx: mpsc::UnboundedSender<(u64, Job)>,
    next_seq: AtomicU64,
    _registration: Option<PendingGuard>,
}

impl MutationQueue {
    /// Start the lane. Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_lane(rx));
        Self {
            tx,
            next_seq: AtomicU64::new(0),
            _registration: None,
        }
    }

    /// Start a lane whose worker is tracked by `registry`, so teardown stops
    /// it from picking up further jobs.
    pub fn with_registry(registry: &Arc<PendingRegistry>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_lane(rx));
        let registration = registry.guard(OperationKind::Request, worker.abort_handle());
        Self {
            tx,
            next_seq: AtomicU64::new(0),
            _registration: Some(registration),
        }
    }

    /// Submit `job` and get a future for its outcome.
    ///
    /// The job's place in the lane is fixed when this is called, not when the
    /// returned future is first polled. A job that returns `Err` is still a
    /// settled job; only lane failures surface as [`QueueError`].
    pub fn enqueue<F, T>(
        &self,
        job: F,
    ) -> impl Future<Output = Result<T, QueueError>> + Send + 'static
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let wrapped: Job = Box::pin(async move {
            let _ = reply_tx.send(job.await);
        });
        let submitted = self.tx.send((seq, wrapped)).is_ok();
        let lane = self.tx.clone();

        async move {
            if !submitted {
                return Err(QueueError::Closed);
            }
            match reply_rx.await {
                Ok(outcome) => Ok(outcome),
                // Lane gone: the job was dropped before it ran.
                Err(_) if lane.is_closed() => Err(QueueError::Closed),
                Err(_) => Err(QueueError::JobAborted),
            }
        }
    }

    /// Whether the lane still accepts jobs.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl Default for MutationQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_lane(mut rx: mpsc::UnboundedReceiver<(u64, Job)>) {
    while let Some((seq, job)) = rx.recv().await {
        debug!(seq, "mutation job started");
        // Own task, so a panicking job fails alone.
        match tokio::spawn(job).await {
            Ok(()) => debug!(seq, "mutation job settled"),
            Err(e) => warn!(seq, error = %e, "mutation job aborted"),
        }
    }
    debug!("mutation lane closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    fn step(log: &Arc<Mutex<Vec<String>>>, entry: String) {
        log.lock().expect("log lock").push(entry);
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_sequencing() {
        let queue = MutationQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut outcomes = Vec::new();
        for (name, ms) in [("a", 20), ("b", 10), ("c", 0)] {
            let log = log.clone();
            outcomes.push(queue.enqueue(async move {
                step(&log, format!("start-{name}"));
                tokio::time::sleep(Duration::from_millis(ms)).await;
                step(&log, format!("end-{name}"));
                name
            }));
        }

        let mut names = Vec::new();
        for outcome in outcomes {
            names.push(outcome.await.expect("job outcome"));
        }
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(
            *log.lock().expect("log lock"),
            vec!["start-a", "end-a", "start-b", "end-b", "start-c", "end-c"]
        );
    }

    #[tokio::test]
    async fn test_failure_isolated() {
        let queue = MutationQueue::new();

        let failing = queue.enqueue(async { Err::<u32, String>("boom".to_owned()) });
        let panicking = queue.enqueue(async {
            panic!("job exploded");
        });
        let fine = queue.enqueue(async { Ok::<u32, String>(3) });

        assert_eq!(failing.await.expect("settled"), Err("boom".to_owned()));
        let panicked: Result<(), QueueError> = panicking.await;
        assert_eq!(panicked, Err(QueueError::JobAborted));
        assert_eq!(fine.await.expect("settled"), Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_drops_waiting_jobs() {
        let registry = PendingRegistry::new();
        let queue = MutationQueue::with_registry(&registry);
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let running = queue.enqueue(async move {
            let _ = release_rx.await;
            "finished"
        });
        let waiting = queue.enqueue(async { "never" });

        // Let the lane pick up the first job.
        tokio::time::sleep(Duration::from_millis(1)).await;
        registry.teardown();
        let _ = release_tx.send(());

        assert_eq!(running.await.expect("running job completes"), "finished");
        assert_eq!(waiting.await, Err(QueueError::Closed));
        assert!(!queue.is_open());
    }
}
