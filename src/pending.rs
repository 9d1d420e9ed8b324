//! Registry of cancellable in-flight operations.
//!
//! Anything that starts work which may outlive its caller (host requests,
//! timers, the mutation lane) registers a cancel handle here and deregisters
//! it on settlement. [`PendingRegistry::cancel_all`] cancels everything still
//! tracked; [`PendingRegistry::teardown`] additionally raises the torn-down
//! flag so later work is refused instead of firing stale callbacks.
//!
//! Requests and timers are tracked in separate sets with the same lifecycle.

use std::collections::HashMap;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{AnchorError, AnchorResult};

/// Something that can be cancelled.
pub trait Cancel: Send + Sync {
    fn cancel(&self) -> anyhow::Result<()>;
}

impl Cancel for tokio::task::AbortHandle {
    fn cancel(&self) -> anyhow::Result<()> {
        self.abort();
        Ok(())
    }
}

/// Which tracked set an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Request,
    Timer,
}

/// Identifies a registered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId {
    kind: OperationKind,
    seq: u64,
}

impl OperationId {
    pub const fn kind(&self) -> OperationKind {
        self.kind
    }
}

#[derive(Default)]
struct Tracked {
    requests: HashMap<u64, Box<dyn Cancel>>,
    timers: HashMap<u64, Box<dyn Cancel>>,
}

impl Tracked {
    fn set(&mut self, kind: OperationKind) -> &mut HashMap<u64, Box<dyn Cancel>> {
        match kind {
            OperationKind::Request => &mut self.requests,
            OperationKind::Timer => &mut self.timers,
        }
    }
}

/// Tracks cancel handles and the torn-down flag.
#[derive(Default)]
pub struct PendingRegistry {
    tracked: Mutex<Tracked>,
    next_seq: AtomicU64,
    torn_down: AtomicBool,
    hook_bound: AtomicBool,
}

impl std::fmt::Debug for PendingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRegistry")
            .field("requests", &self.tracked_count(OperationKind::Request))
            .field("timers", &self.tracked_count(OperationKind::Timer))
            .field("torn_down", &self.is_torn_down())
            .finish_non_exhaustive()
    }
}

impl PendingRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Tracked> {
        // Handles are plain data; a panic elsewhere cannot leave them torn.
        self.tracked
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn next_id(&self, kind: OperationKind) -> OperationId {
        OperationId {
            kind,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Start tracking `handle`.
    pub fn register(&self, kind: OperationKind, handle: impl Cancel + 'static) -> OperationId {
        let id = self.next_id(kind);
        self.lock().set(kind).insert(id.seq, Box::new(handle));
        id
    }

    pub fn register_request(&self, handle: impl Cancel + 'static) -> OperationId {
        self.register(OperationKind::Request, handle)
    }

    pub fn register_timer(&self, handle: impl Cancel + 'static) -> OperationId {
        self.register(OperationKind::Timer, handle)
    }

    /// Stop tracking `id`. Returns false if it was not tracked.
    pub fn deregister(&self, id: OperationId) -> bool {
        self.lock().set(id.kind).remove(&id.seq).is_some()
    }

    /// Register `handle` and deregister it when the guard drops.
    pub fn guard(
        self: &Arc<Self>,
        kind: OperationKind,
        handle: impl Cancel + 'static,
    ) -> PendingGuard {
        PendingGuard {
            registry: Arc::downgrade(self),
            id: self.register(kind, handle),
        }
    }

    pub fn tracked_count(&self, kind: OperationKind) -> usize {
        let tracked = self.lock();
        match kind {
            OperationKind::Request => tracked.requests.len(),
            OperationKind::Timer => tracked.timers.len(),
        }
    }

    /// Cancel every tracked handle and clear both sets.
    ///
    /// A handle whose cancel fails or panics is logged and skipped; the rest
    /// are still cancelled. Returns how many handles were processed.
    pub fn cancel_all(&self) -> usize {
        let (requests, timers) = {
            let mut tracked = self.lock();
            (
                std::mem::take(&mut tracked.requests),
                std::mem::take(&mut tracked.timers),
            )
        };

        let mut count = 0;
        for (kind, set) in [
            (OperationKind::Request, requests),
            (OperationKind::Timer, timers),
        ] {
            for (seq, handle) in set {
                count += 1;
                match catch_unwind(AssertUnwindSafe(|| handle.cancel())) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(?kind, seq, error = %e, "cancel failed"),
                    Err(_) => warn!(?kind, seq, "cancel panicked"),
                }
            }
        }
        debug!(count, "cancelled pending operations");
        count
    }

    /// Raise the torn-down flag and cancel everything.
    pub fn teardown(&self) -> usize {
        self.torn_down.store(true, Ordering::SeqCst);
        self.cancel_all()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Clear the torn-down flag, e.g. when a host session restarts.
    pub fn reset_teardown(&self) {
        self.torn_down.store(false, Ordering::SeqCst);
    }

    /// Run [`Self::teardown`] when `signal` resolves.
    ///
    /// Binds at most once per registry; later calls return false and drop
    /// their signal. Must be called inside a Tokio runtime.
    pub fn install_teardown_hook<S>(self: &Arc<Self>, signal: S) -> bool
    where
        S: Future<Output = ()> + Send + 'static,
    {
        if self.hook_bound.swap(true, Ordering::SeqCst) {
            debug!("teardown hook already bound");
            return false;
        }
        let registry = Arc::downgrade(self);
        tokio::spawn(async move {
            signal.await;
            if let Some(registry) = registry.upgrade() {
                let cancelled = registry.teardown();
                info!(cancelled, "host going away, tore down pending operations");
            }
        });
        true
    }

    /// Run `fut` as a tracked request.
    ///
    /// The task is registered while it runs. If it is cancelled through the
    /// registry the caller gets [`AnchorError::Cancelled`]. Refused with
    /// [`AnchorError::TornDown`] after teardown.
    pub async fn track<F, T>(self: &Arc<Self>, fut: F) -> AnchorResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_torn_down() {
            return Err(AnchorError::TornDown);
        }
        let task = tokio::spawn(fut);
        let guard = self.guard(OperationKind::Request, task.abort_handle());
        let joined = task.await;
        drop(guard);

        match joined {
            Ok(value) => Ok(value),
            Err(e) if e.is_cancelled() => Err(AnchorError::Cancelled),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }

    /// Run `callback` after `delay` unless cancelled first.
    ///
    /// The timer deregisters itself when it fires.
    pub fn schedule_timer<F>(
        self: &Arc<Self>,
        delay: Duration,
        callback: F,
    ) -> AnchorResult<OperationId>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_torn_down() {
            return Err(AnchorError::TornDown);
        }
        let id = self.next_id(OperationKind::Timer);
        let registry: Weak<Self> = Arc::downgrade(self);

        // Held across the spawn so a zero-delay timer cannot deregister
        // before it is registered.
        let mut tracked = self.lock();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(registry) = registry.upgrade() {
                registry.deregister(id);
            }
            callback();
        });
        tracked.timers.insert(id.seq, Box::new(task.abort_handle()));
        Ok(id)
    }
}

/// Deregisters its operation on drop.
#[derive(Debug)]
pub struct PendingGuard {
    registry: Weak<PendingRegistry>,
    id: OperationId,
}

impl PendingGuard {
    pub const fn id(&self) -> OperationId {
        self.id
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.deregister(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counting(Arc<AtomicUsize>);

    impl Cancel for Counting {
        fn cancel(&self) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl Cancel for Failing {
        fn cancel(&self) -> anyhow::Result<()> {
            anyhow::bail!("already closed")
        }
    }

    struct Panicking;

    impl Cancel for Panicking {
        fn cancel(&self) -> anyhow::Result<()> {
            panic!("cancel blew up")
        }
    }

    #[test]
    fn test_register_and_deregister() {
        let registry = PendingRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let request = registry.register_request(Counting(hits.clone()));
        let timer = registry.register_timer(Counting(hits.clone()));
        assert_eq!(registry.tracked_count(OperationKind::Request), 1);
        assert_eq!(registry.tracked_count(OperationKind::Timer), 1);

        assert!(registry.deregister(request));
        assert!(!registry.deregister(request));
        assert_eq!(timer.kind(), OperationKind::Timer);
        assert_eq!(registry.cancel_all(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_all_survives_failures() {
        let registry = PendingRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        registry.register_request(Failing);
        registry.register_request(Panicking);
        registry.register_request(Counting(hits.clone()));
        registry.register_timer(Panicking);
        registry.register_timer(Counting(hits.clone()));

        assert_eq!(registry.cancel_all(), 5);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(registry.tracked_count(OperationKind::Request), 0);
        assert_eq!(registry.tracked_count(OperationKind::Timer), 0);

        // Second call is a no-op.
        assert_eq!(registry.cancel_all(), 0);
    }

    #[test]
    fn test_guard_deregisters_on_drop() {
        let registry = PendingRegistry::new();
        let guard = registry.guard(OperationKind::Request, Failing);
        assert_eq!(registry.tracked_count(OperationKind::Request), 1);
        drop(guard);
        assert_eq!(registry.tracked_count(OperationKind::Request), 0);
    }

    #[test]
    fn test_teardown_flag() {
        let registry = PendingRegistry::new();
        assert!(!registry.is_torn_down());
        registry.teardown();
        assert!(registry.is_torn_down());
        registry.reset_teardown();
        assert!(!registry.is_torn_down());
    }

    #[tokio::test]
    async fn test_track_settles_and_deregisters() {
        let registry = PendingRegistry::new();
        let value = registry.track(async { 7 }).await.expect("tracked");
        assert_eq!(value, 7);
        assert_eq!(registry.tracked_count(OperationKind::Request), 0);
    }

    #[tokio::test]
    async fn test_track_cancelled() {
        let registry = PendingRegistry::new();
        let tracked = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.track(std::future::pending::<()>()).await })
        };
        while registry.tracked_count(OperationKind::Request) == 0 {
            tokio::task::yield_now().await;
        }
        registry.cancel_all();
        let outcome = tracked.await.expect("join");
        assert!(matches!(outcome, Err(AnchorError::Cancelled)));
    }

    #[tokio::test]
    async fn test_track_refused_after_teardown() {
        let registry = PendingRegistry::new();
        registry.teardown();
        let outcome = registry.track(async { 1 }).await;
        assert!(matches!(outcome, Err(AnchorError::TornDown)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_or_cancels() {
        let registry = PendingRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let f = fired.clone();
        registry
            .schedule_timer(Duration::from_millis(10), move || {
                f.fetch_add(1, Ordering::SeqCst);
            })
            .expect("timer");
        let f = fired.clone();
        registry
            .schedule_timer(Duration::from_millis(50), move || {
                f.fetch_add(10, Ordering::SeqCst);
            })
            .expect("timer");
        assert_eq!(registry.tracked_count(OperationKind::Timer), 2);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(registry.tracked_count(OperationKind::Timer), 1);

        registry.cancel_all();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_teardown_hook_binds_once() {
        let registry = PendingRegistry::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        assert!(registry.install_teardown_hook(async move {
            let _ = rx.await;
        }));
        assert!(!registry.install_teardown_hook(std::future::pending::<()>()));

        let hits = Arc::new(AtomicUsize::new(0));
        registry.register_request(Counting(hits.clone()));
        tx.send(()).expect("signal");

        while !registry.is_torn_down() {
            tokio::task::yield_now().await;
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
