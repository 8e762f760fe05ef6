use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error};

use crate::observer::{Observer, ObserverFns};
use crate::subscription::{Gate, Subscription, Teardown};
use crate::Error;

/// Downstream end handed to a sequence's subscribe function.
pub type Downstream<T> = Arc<dyn Observer<T>>;

type SubscribeFn<T> = dyn Fn(Downstream<T>) -> Teardown + Send + Sync;

/// A cold, push-based sequence.
///
/// Nothing happens until [`Observable::subscribe`] is called; each
/// subscription runs the subscribe function again and owns whatever it
/// attached. Cloning an `Observable` clones the recipe, not a running
/// sequence.
pub struct Observable<T> {
    subscribe: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe: Arc::clone(&self.subscribe),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Observable")
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Build a sequence from a subscribe function. The function receives
    /// the downstream observer and returns the teardown that undoes what it
    /// set up.
    pub fn create<F>(subscribe: F) -> Self
    where
        F: Fn(Downstream<T>) -> Teardown + Send + Sync + 'static,
    {
        Self {
            subscribe: Arc::new(subscribe),
        }
    }

    /// A sequence that completes as soon as it is subscribed.
    pub fn empty() -> Self {
        Self::create(|down| {
            down.on_completed();
            Teardown::empty()
        })
    }

    /// A sequence that never signals.
    pub fn never() -> Self {
        Self::create(|_| Teardown::empty())
    }

    /// Run the subscribe function against an operator's own observer,
    /// without the delivery gate. Operators use this to chain upstream.
    pub(crate) fn attach(&self, down: Downstream<T>) -> Teardown {
        (self.subscribe)(down)
    }

    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: Observer<T> + 'static,
    {
        let gate = Arc::new(Gate::new());
        let sink: Downstream<T> = Arc::new(Sink {
            gate: Arc::clone(&gate),
            observer: Box::new(observer),
        });
        let teardown = self.attach(sink);
        gate.set_teardown(teardown);
        Subscription::new(gate)
    }

    pub fn subscribe_fn<N>(&self, next: N) -> Subscription
    where
        N: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe(ObserverFns::new(next))
    }
}

// ─── Sink ─────────────────────────────────────────────────────────────────────

/// The gated end of a subscription: drops anything arriving after a
/// terminal signal or dispose, and keeps observer panics from unwinding into
/// the code that raised the event.
struct Sink<T> {
    gate: Arc<Gate>,
    observer: Box<dyn Observer<T>>,
}

impl<T> Sink<T> {
    fn fault(&self, payload: Box<dyn Any + Send>) {
        error!(
            panic = %panic_message(payload.as_ref()),
            "observer panicked; detaching its subscription"
        );
    }
}

impl<T: Send> Observer<T> for Sink<T> {
    fn on_next(&self, value: T) {
        let delivery = self.gate.enter();
        if self.gate.is_stopped() {
            return;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.observer.on_next(value)));
        if let Err(payload) = outcome {
            self.gate.close();
            drop(delivery);
            self.fault(payload);
            self.gate.release();
        }
    }

    fn on_error(&self, error: Error) {
        let delivery = self.gate.enter();
        if !self.gate.close() {
            return;
        }
        debug!(%error, "sequence faulted");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.observer.on_error(error)));
        drop(delivery);
        if let Err(payload) = outcome {
            self.fault(payload);
        }
        self.gate.release();
    }

    fn on_completed(&self) {
        let delivery = self.gate.enter();
        if !self.gate.close() {
            return;
        }
        debug!("sequence completed");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.observer.on_completed()));
        drop(delivery);
        if let Err(payload) = outcome {
            self.fault(payload);
        }
        self.gate.release();
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{Collector, Notification};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscribe_function_runs_per_subscription() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let source: Observable<u8> = Observable::create(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Teardown::empty()
        });
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        let _a = source.subscribe_fn(|_| {});
        let _b = source.subscribe_fn(|_| {});
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn nothing_is_delivered_after_completion() {
        let source: Observable<u8> = Observable::create(|down| {
            down.on_next(1);
            down.on_completed();
            down.on_next(2);
            down.on_completed();
            Teardown::empty()
        });
        let seen = Collector::new();
        let subscription = source.subscribe(seen.clone());

        assert_eq!(
            seen.notifications(),
            vec![Notification::Next(1), Notification::Completed]
        );
        assert!(subscription.is_disposed());
    }

    #[test]
    fn synchronous_completion_runs_teardown_after_subscribe() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let source: Observable<u8> = Observable::create(move |down| {
            down.on_completed();
            let counter = counter.clone();
            Teardown::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        let _subscription = source.subscribe_fn(|_| {});
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_observer_is_detached() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let source: Observable<u8> = Observable::create(move |down| {
            down.on_next(1);
            down.on_next(2);
            let counter = counter.clone();
            Teardown::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let observed = calls.clone();
        let subscription = source.subscribe_fn(move |_| {
            observed.fetch_add(1, Ordering::SeqCst);
            panic!("observer failure");
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(subscription.is_disposed());
    }

    #[test]
    fn empty_completes_immediately() {
        let seen = Collector::<u8>::new();
        let _subscription = Observable::empty().subscribe(seen.clone());
        assert_eq!(seen.notifications(), vec![Notification::Completed]);
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
