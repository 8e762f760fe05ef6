//! Consumer-side composition over bridged sequences.
//!
//! Operators run synchronously on the thread that delivered the upstream
//! notification; none of them buffer across threads or reorder.

use std::collections::VecDeque;
use std::fmt::Display;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::observable::{panic_message, Downstream, Observable};
use crate::observer::Observer;
use crate::subscription::Teardown;
use crate::Error;

/// Forwards terminal signals unchanged and runs `step` for each value. A
/// panic in the step faults the sequence with [`Error::Upstream`] instead of
/// unwinding into the raiser.
struct Relay<T, U, S> {
    down: Downstream<U>,
    step: S,
    _input: PhantomData<fn(T)>,
}

impl<T, U, S> Observer<T> for Relay<T, U, S>
where
    S: Fn(&Downstream<U>, T) + Send + Sync,
{
    fn on_next(&self, value: T) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.step)(&self.down, value)));
        if let Err(payload) = outcome {
            let message = panic_message(payload.as_ref());
            error!(%message, "operator panicked; faulting its sequence");
            self.down.on_error(Error::Upstream(format!("operator panicked: {message}")));
        }
    }

    fn on_error(&self, error: Error) {
        self.down.on_error(error)
    }

    fn on_completed(&self) {
        self.down.on_completed()
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Chain a per-value step. `make` runs once per subscription so the step
    /// can own per-subscription state.
    fn lift<U, S, M>(self, make: M) -> Observable<U>
    where
        U: Send + 'static,
        S: Fn(&Downstream<U>, T) + Send + Sync + 'static,
        M: Fn() -> S + Send + Sync + 'static,
    {
        Observable::create(move |down: Downstream<U>| {
            let relay: Downstream<T> = Arc::new(Relay {
                down,
                step: make(),
                _input: PhantomData,
            });
            self.attach(relay)
        })
    }

    pub fn map<U, F>(self, f: F) -> Observable<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.lift(move || {
            let f = Arc::clone(&f);
            move |down: &Downstream<U>, value: T| down.on_next(f(value))
        })
    }

    pub fn filter<P>(self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let predicate = Arc::new(predicate);
        self.lift(move || {
            let predicate = Arc::clone(&predicate);
            move |down: &Downstream<T>, value: T| {
                if predicate(&value) {
                    down.on_next(value)
                }
            }
        })
    }

    pub fn filter_map<U, F>(self, f: F) -> Observable<U>
    where
        U: Send + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.lift(move || {
            let f = Arc::clone(&f);
            move |down: &Downstream<U>, value: T| {
                if let Some(mapped) = f(value) {
                    down.on_next(mapped)
                }
            }
        })
    }

    /// Emit every item of the collection `f` returns, in order.
    pub fn flat_map_iter<U, I, F>(self, f: F) -> Observable<U>
    where
        U: Send + 'static,
        I: IntoIterator<Item = U>,
        F: Fn(T) -> I + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.lift(move || {
            let f = Arc::clone(&f);
            move |down: &Downstream<U>, value: T| {
                for item in f(value) {
                    down.on_next(item)
                }
            }
        })
    }

    /// Map with a fallible function. The first `Err` faults the sequence
    /// with [`Error::Upstream`].
    pub fn try_map<U, E, F>(self, f: F) -> Observable<U>
    where
        U: Send + 'static,
        E: Display,
        F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.lift(move || {
            let f = Arc::clone(&f);
            move |down: &Downstream<U>, value: T| match f(value) {
                Ok(mapped) => down.on_next(mapped),
                Err(e) => down.on_error(Error::Upstream(e.to_string())),
            }
        })
    }

    /// Observe each value without changing it.
    pub fn inspect<F>(self, f: F) -> Observable<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.lift(move || {
            let f = Arc::clone(&f);
            move |down: &Downstream<T>, value: T| {
                f(&value);
                down.on_next(value)
            }
        })
    }

    /// Running fold; emits every intermediate accumulator.
    pub fn scan<A, F>(self, seed: A, f: F) -> Observable<A>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(&A, T) -> A + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.lift(move || {
            let f = Arc::clone(&f);
            let acc = Mutex::new(seed.clone());
            move |down: &Downstream<A>, value: T| {
                let next = {
                    let mut acc = acc.lock();
                    let next = f(&*acc, value);
                    *acc = next.clone();
                    next
                };
                down.on_next(next)
            }
        })
    }

    /// Drop values whose key equals the key of the previous emitted value.
    pub fn distinct_until_changed_by<K, F>(self, key: F) -> Observable<T>
    where
        K: PartialEq + Send + 'static,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let key = Arc::new(key);
        self.lift(move || {
            let key = Arc::clone(&key);
            let last: Mutex<Option<K>> = Mutex::new(None);
            move |down: &Downstream<T>, value: T| {
                let current = key(&value);
                let changed = {
                    let mut last = last.lock();
                    if last.as_ref() == Some(&current) {
                        false
                    } else {
                        *last = Some(current);
                        true
                    }
                };
                if changed {
                    down.on_next(value)
                }
            }
        })
    }

    pub fn distinct_until_changed(self) -> Observable<T>
    where
        T: PartialEq + Clone,
    {
        self.distinct_until_changed_by(|value: &T| value.clone())
    }

    /// Emit at most `count` values, then complete and detach upstream.
    pub fn take(self, count: usize) -> Observable<T> {
        if count == 0 {
            return Observable::empty();
        }
        self.lift(move || {
            let remaining = AtomicUsize::new(count);
            move |down: &Downstream<T>, value: T| {
                match remaining.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1)) {
                    Ok(1) => {
                        down.on_next(value);
                        down.on_completed();
                    }
                    Ok(_) => down.on_next(value),
                    Err(_) => {}
                }
            }
        })
    }

    /// Complete when `signal` emits its first value. A fault on `signal`
    /// faults this sequence; its completion is ignored.
    pub fn take_until<X>(self, signal: Observable<X>) -> Observable<T>
    where
        X: Send + 'static,
    {
        Observable::create(move |down: Downstream<T>| {
            let until: Downstream<X> = Arc::new(Until {
                down: Arc::clone(&down),
                _signal: PhantomData,
            });
            let stop = signal.attach(until);
            let data = self.attach(down);
            data.and(stop)
        })
    }

    /// Interleave two sequences in arrival order. Completes once both have.
    pub fn merge(self, other: Observable<T>) -> Observable<T> {
        Observable::create(move |down: Downstream<T>| {
            let merged: Downstream<T> = Arc::new(Merge {
                down,
                remaining: AtomicUsize::new(2),
            });
            let first = self.attach(Arc::clone(&merged));
            let second = other.attach(merged);
            first.and(second)
        })
    }

    /// Overlapping or hopping windows: a new window opens every `skip`
    /// values and is emitted once it holds `count`. Partial windows are
    /// flushed on completion.
    ///
    /// # Panics
    ///
    /// Panics if `count` or `skip` is zero.
    pub fn buffer(self, count: usize, skip: usize) -> Observable<Vec<T>>
    where
        T: Clone,
    {
        assert!(count > 0 && skip > 0, "buffer count and skip must be positive");
        Observable::create(move |down: Downstream<Vec<T>>| {
            let windows: Downstream<T> = Arc::new(Buffer {
                down,
                count,
                skip,
                state: Mutex::new(Windows {
                    seen: 0,
                    open: VecDeque::new(),
                }),
            });
            self.attach(windows)
        })
    }

    /// Merge many sequences of the same type.
    pub fn merge_all<I>(sources: I) -> Observable<T>
    where
        I: IntoIterator<Item = Observable<T>>,
    {
        sources
            .into_iter()
            .reduce(Observable::merge)
            .unwrap_or_else(Observable::empty)
    }
}

// ─── Observers backing the combinators ───────────────────────────────────────

struct Until<T, X> {
    down: Downstream<T>,
    _signal: PhantomData<fn(X)>,
}

impl<T, X> Observer<X> for Until<T, X> {
    fn on_next(&self, _: X) {
        self.down.on_completed()
    }

    fn on_error(&self, error: Error) {
        self.down.on_error(error)
    }
}

struct Merge<T> {
    down: Downstream<T>,
    remaining: AtomicUsize,
}

impl<T> Observer<T> for Merge<T> {
    fn on_next(&self, value: T) {
        self.down.on_next(value)
    }

    fn on_error(&self, error: Error) {
        self.down.on_error(error)
    }

    fn on_completed(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.down.on_completed()
        }
    }
}

struct Windows<T> {
    seen: usize,
    open: VecDeque<Vec<T>>,
}

struct Buffer<T> {
    down: Downstream<Vec<T>>,
    count: usize,
    skip: usize,
    state: Mutex<Windows<T>>,
}

impl<T: Clone + Send> Observer<T> for Buffer<T> {
    fn on_next(&self, value: T) {
        let full = {
            let mut state = self.state.lock();
            if state.seen % self.skip == 0 {
                state.open.push_back(Vec::with_capacity(self.count));
            }
            state.seen += 1;
            for window in state.open.iter_mut() {
                window.push(value.clone());
            }
            let mut full = Vec::new();
            while state.open.front().is_some_and(|w| w.len() >= self.count) {
                if let Some(window) = state.open.pop_front() {
                    full.push(window);
                }
            }
            full
        };
        for window in full {
            self.down.on_next(window);
        }
    }

    fn on_error(&self, error: Error) {
        self.state.lock().open.clear();
        self.down.on_error(error)
    }

    fn on_completed(&self) {
        let rest: Vec<Vec<T>> = self.state.lock().open.drain(..).collect();
        for window in rest.into_iter().filter(|w| !w.is_empty()) {
            self.down.on_next(window);
        }
        self.down.on_completed()
    }
}

/// A sequence built from a fixed list of values, emitted on subscribe.
pub fn from_iter<T, I>(values: I) -> Observable<T>
where
    T: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = T>,
{
    let values: Arc<[T]> = values.into_iter().collect();
    Observable::create(move |down: Downstream<T>| {
        for value in values.iter() {
            down.on_next(value.clone());
        }
        down.on_completed();
        Teardown::empty()
    })
}
