use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

// ─── Handler shapes ───────────────────────────────────────────────────────────

pub type Handler0 = Arc<dyn Fn() + Send + Sync>;
pub type Handler<T> = Arc<dyn Fn(T) + Send + Sync>;
pub type Handler2<A, B> = Arc<dyn Fn(A, B) + Send + Sync>;
pub type Handler3<A, B, C> = Arc<dyn Fn(A, B, C) + Send + Sync>;
pub type Handler4<A, B, C, D> = Arc<dyn Fn(A, B, C, D) + Send + Sync>;

pub type Event0 = Event<dyn Fn() + Send + Sync>;
pub type Event1<T> = Event<dyn Fn(T) + Send + Sync>;
pub type Event2<A, B> = Event<dyn Fn(A, B) + Send + Sync>;
pub type Event3<A, B, C> = Event<dyn Fn(A, B, C) + Send + Sync>;
pub type Event4<A, B, C, D> = Event<dyn Fn(A, B, C, D) + Send + Sync>;

/// A multicast callback list, the shape in which platform objects publish
/// their events.
///
/// Handlers are identified by their `Arc` allocation: `remove` detaches the
/// exact instance that was added. Raising invokes a snapshot of the list, so
/// a handler may add or remove handlers (including itself) while running.
pub struct Event<F: ?Sized> {
    handlers: Mutex<Vec<Arc<F>>>,
}

impl<F: ?Sized> Event<F> {
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, handler: &Arc<F>) {
        self.handlers.lock().push(Arc::clone(handler));
    }

    /// Remove the most recently added registration of `handler`.
    /// Returns `false` when the handler was not registered.
    pub fn remove(&self, handler: &Arc<F>) -> bool {
        let mut handlers = self.handlers.lock();
        match handlers.iter().rposition(|h| Arc::ptr_eq(h, handler)) {
            Some(idx) => {
                handlers.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<F>> {
        self.handlers.lock().clone()
    }
}

impl<F: ?Sized> Default for Event<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for Event<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl Event<dyn Fn() + Send + Sync> {
    pub fn raise(&self) {
        for handler in self.snapshot() {
            handler();
        }
    }
}

impl<T: Clone> Event<dyn Fn(T) + Send + Sync> {
    pub fn raise(&self, value: T) {
        for handler in self.snapshot() {
            handler(value.clone());
        }
    }
}

impl<A: Clone, B: Clone> Event<dyn Fn(A, B) + Send + Sync> {
    pub fn raise(&self, a: A, b: B) {
        for handler in self.snapshot() {
            handler(a.clone(), b.clone());
        }
    }
}

impl<A: Clone, B: Clone, C: Clone> Event<dyn Fn(A, B, C) + Send + Sync> {
    pub fn raise(&self, a: A, b: B, c: C) {
        for handler in self.snapshot() {
            handler(a.clone(), b.clone(), c.clone());
        }
    }
}

impl<A: Clone, B: Clone, C: Clone, D: Clone> Event<dyn Fn(A, B, C, D) + Send + Sync> {
    pub fn raise(&self, a: A, b: B, c: C, d: D) {
        for handler in self.snapshot() {
            handler(a.clone(), b.clone(), c.clone(), d.clone());
        }
    }
}

// ─── Hook ─────────────────────────────────────────────────────────────────────

/// The add/remove pair of one external event.
///
/// Both functions must accept the same handler instance: whatever `attach`
/// registers, `detach` must be able to find and remove again.
pub struct Hook<H> {
    add: Arc<dyn Fn(&H) + Send + Sync>,
    remove: Arc<dyn Fn(&H) + Send + Sync>,
}

impl<H> Hook<H> {
    pub fn new<A, R>(add: A, remove: R) -> Self
    where
        A: Fn(&H) + Send + Sync + 'static,
        R: Fn(&H) + Send + Sync + 'static,
    {
        Self {
            add: Arc::new(add),
            remove: Arc::new(remove),
        }
    }

    pub fn attach(&self, handler: &H) {
        (self.add)(handler)
    }

    pub fn detach(&self, handler: &H) {
        (self.remove)(handler)
    }
}

impl<F: ?Sized + 'static> Hook<Arc<F>> {
    /// Hook onto an event field of a shared source object.
    pub fn on<S>(source: Arc<S>, select: fn(&S) -> &Event<F>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let add_source = Arc::clone(&source);
        Self::new(
            move |handler: &Arc<F>| select(&add_source).add(handler),
            move |handler: &Arc<F>| {
                select(&source).remove(handler);
            },
        )
    }
}

impl<H> Clone for Hook<H> {
    fn clone(&self) -> Self {
        Self {
            add: Arc::clone(&self.add),
            remove: Arc::clone(&self.remove),
        }
    }
}

impl<H> fmt::Debug for Hook<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn raise_invokes_handlers_in_registration_order() {
        let event: Event1<u32> = Event::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first: Handler<u32> = {
            let seen = seen.clone();
            Arc::new(move |v| seen.lock().push(("first", v)))
        };
        let second: Handler<u32> = {
            let seen = seen.clone();
            Arc::new(move |v| seen.lock().push(("second", v)))
        };
        event.add(&first);
        event.add(&second);
        event.raise(7);

        assert_eq!(*seen.lock(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn remove_detaches_only_the_same_instance() {
        let event: Event0 = Event::new();
        let a: Handler0 = Arc::new(|| {});
        let b: Handler0 = Arc::new(|| {});
        event.add(&a);

        assert!(!event.remove(&b));
        assert_eq!(event.handler_count(), 1);
        assert!(event.remove(&a));
        assert!(event.is_empty());
        assert!(!event.remove(&a));
    }

    #[test]
    fn duplicate_registration_is_removed_one_at_a_time() {
        let event: Event0 = Event::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler: Handler0 = {
            let calls = calls.clone();
            Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        event.add(&handler);
        event.add(&handler);
        event.raise();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        event.remove(&handler);
        event.raise();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn handler_may_remove_itself_during_raise() {
        let event: Arc<Event1<u8>> = Arc::new(Event::new());
        let slot: Arc<Mutex<Option<Handler<u8>>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let handler: Handler<u8> = {
            let event = event.clone();
            let slot = slot.clone();
            let calls = calls.clone();
            Arc::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(me) = slot.lock().take() {
                    event.remove(&me);
                }
            })
        };
        *slot.lock() = Some(handler.clone());
        event.add(&handler);

        event.raise(1);
        event.raise(2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(event.is_empty());
    }

    #[test]
    fn multi_argument_events_pass_every_argument() {
        let event: Event3<u8, &'static str, bool> = Event::new();
        let seen = Arc::new(Mutex::new(None));
        let handler: Handler3<u8, &'static str, bool> = {
            let seen = seen.clone();
            Arc::new(move |a, b, c| *seen.lock() = Some((a, b, c)))
        };
        event.add(&handler);
        event.raise(1, "x", true);
        assert_eq!(*seen.lock(), Some((1, "x", true)));
    }

    #[test]
    fn hook_on_attaches_to_selected_field() {
        struct Source {
            ticks: Event1<u64>,
        }
        fn ticks(source: &Source) -> &Event1<u64> {
            &source.ticks
        }

        let source = Arc::new(Source { ticks: Event::new() });
        let hook = Hook::on(source.clone(), ticks);
        let handler: Handler<u64> = Arc::new(|_| {});

        hook.attach(&handler);
        assert_eq!(source.ticks.handler_count(), 1);
        hook.detach(&handler);
        assert_eq!(source.ticks.handler_count(), 0);
    }
}
