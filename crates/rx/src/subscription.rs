use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use tracing::trace;

/// Cleanup registered by a sequence for one subscription, typically the
/// detach of the handlers it attached. Runs at most once.
#[must_use = "a Teardown that is dropped never runs"]
pub struct Teardown(Option<Box<dyn FnOnce() + Send>>);

impl Teardown {
    pub fn new<F: FnOnce() + Send + 'static>(f: F) -> Self {
        Self(Some(Box::new(f)))
    }

    pub fn empty() -> Self {
        Self(None)
    }

    /// Combine two teardowns; `self` runs first.
    pub fn and(self, other: Teardown) -> Teardown {
        match (self.0, other.0) {
            (None, None) => Teardown::empty(),
            (Some(f), None) | (None, Some(f)) => Teardown(Some(f)),
            (Some(first), Some(second)) => Teardown::new(move || {
                first();
                second();
            }),
        }
    }

    pub fn run(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Teardown").field(&self.0.is_some()).finish()
    }
}

// ─── Gate ─────────────────────────────────────────────────────────────────────

thread_local! {
    /// Number of deliveries in progress on this thread, across all gates.
    static DELIVERING: Cell<usize> = const { Cell::new(0) };
}

fn in_delivery() -> bool {
    DELIVERING.with(|depth| depth.get() > 0)
}

/// Held by a sink while it calls into its observer.
pub(crate) struct Delivery<'a> {
    _lock: ReentrantMutexGuard<'a, ()>,
}

impl<'a> Delivery<'a> {
    fn new(lock: ReentrantMutexGuard<'a, ()>) -> Self {
        DELIVERING.with(|depth| depth.set(depth.get() + 1));
        Self { _lock: lock }
    }
}

impl Drop for Delivery<'_> {
    fn drop(&mut self) {
        DELIVERING.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Per-subscription delivery state shared by the handle and the sink.
///
/// Every delivery and the first dispose take `lock`, so a dispose racing a
/// delivery on another thread waits for it, and nothing is delivered once
/// the dispose returns. The lock is reentrant so an observer can dispose its
/// own subscription from inside `on_next`. A dispose issued while the thread
/// is delivering to any gate skips the lock.
pub(crate) struct Gate {
    lock: ReentrantMutex<()>,
    stopped: AtomicBool,
    teardown: Mutex<Option<Teardown>>,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            lock: ReentrantMutex::new(()),
            stopped: AtomicBool::new(false),
            teardown: Mutex::new(None),
        }
    }

    pub(crate) fn enter(&self) -> Delivery<'_> {
        Delivery::new(self.lock.lock())
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stop delivery. Returns `true` only for the call that stopped it.
    pub(crate) fn close(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }

    /// Install the teardown produced by subscribing. If the gate was closed
    /// while subscribing (the sequence completed synchronously), it runs now.
    pub(crate) fn set_teardown(&self, teardown: Teardown) {
        let mut slot = self.teardown.lock();
        if self.is_stopped() {
            drop(slot);
            teardown.run();
        } else {
            *slot = Some(teardown);
        }
    }

    pub(crate) fn release(&self) {
        let teardown = self.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown.run();
        }
    }
}

// ─── Subscription ─────────────────────────────────────────────────────────────

/// One observer's live registration against a sequence.
///
/// `dispose` is idempotent and may be called from any thread. Dropping the
/// handle disposes it.
#[must_use = "dropping a Subscription detaches its handlers"]
pub struct Subscription {
    gate: Option<Arc<Gate>>,
}

impl Subscription {
    pub(crate) fn new(gate: Arc<Gate>) -> Self {
        Self { gate: Some(gate) }
    }

    /// A subscription with nothing to release.
    pub fn empty() -> Self {
        Self { gate: None }
    }

    /// Stop delivery and detach.
    ///
    /// Called from outside any observer, this waits for a delivery in
    /// progress on another thread, so nothing arrives after it returns.
    /// Called from inside an observer it does not wait: later deliveries
    /// are dropped, but one already running on another thread may still
    /// finish. Two observers disposing each other's subscriptions from
    /// different threads therefore cannot block each other.
    pub fn dispose(&self) {
        let Some(gate) = &self.gate else {
            return;
        };
        let stopped = if in_delivery() {
            gate.close()
        } else {
            let _held = gate.lock.lock();
            gate.close()
        };
        if stopped {
            trace!("subscription disposed");
        }
        gate.release();
    }

    /// True once the subscription was disposed or its sequence terminated.
    pub fn is_disposed(&self) -> bool {
        self.gate.as_ref().map_or(true, |gate| gate.is_stopped())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A group of subscriptions disposed together.
#[derive(Default)]
pub struct CompositeSubscription {
    subscriptions: Mutex<Vec<Subscription>>,
    disposed: AtomicBool,
}

impl CompositeSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `subscription`. Adding to an already disposed
    /// group disposes it immediately.
    pub fn add(&self, subscription: Subscription) {
        let mut subscriptions = self.subscriptions.lock();
        if self.disposed.load(Ordering::Acquire) {
            drop(subscriptions);
            subscription.dispose();
            return;
        }
        subscriptions.push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dispose(&self) {
        let drained: Vec<Subscription> = {
            let mut subscriptions = self.subscriptions.lock();
            self.disposed.store(true, Ordering::Release);
            subscriptions.drain(..).collect()
        };
        for subscription in drained {
            subscription.dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CompositeSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeSubscription")
            .field("len", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_gate(counter: &Arc<AtomicUsize>) -> Arc<Gate> {
        let gate = Arc::new(Gate::new());
        let counter = counter.clone();
        gate.set_teardown(Teardown::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        gate
    }

    #[test]
    fn dispose_runs_teardown_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let subscription = Subscription::new(counting_gate(&runs));

        subscription.dispose();
        subscription.dispose();
        assert!(subscription.is_disposed());
        drop(subscription);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_disposes() {
        let runs = Arc::new(AtomicUsize::new(0));
        {
            let _subscription = Subscription::new(counting_gate(&runs));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn teardown_installed_after_close_runs_immediately() {
        let runs = Arc::new(AtomicUsize::new(0));
        let gate = Gate::new();
        gate.close();
        let counter = runs.clone();
        gate.set_teardown(Teardown::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn combined_teardowns_run_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = {
            let order = order.clone();
            Teardown::new(move || order.lock().push(1))
        };
        let second = {
            let order = order.clone();
            Teardown::new(move || order.lock().push(2))
        };
        first.and(Teardown::empty()).and(second).run();
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn composite_disposes_members_and_late_additions() {
        let runs = Arc::new(AtomicUsize::new(0));
        let group = CompositeSubscription::new();
        group.add(Subscription::new(counting_gate(&runs)));
        group.add(Subscription::new(counting_gate(&runs)));
        assert_eq!(group.len(), 2);

        group.dispose();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(group.is_empty());

        group.add(Subscription::new(counting_gate(&runs)));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn empty_subscription_is_already_disposed() {
        let subscription = Subscription::empty();
        assert!(subscription.is_disposed());
        subscription.dispose();
    }
}
