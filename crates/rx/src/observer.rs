use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Error;

/// Receiver of a push-based sequence.
///
/// A well-behaved sequence calls `on_next` zero or more times, followed by
/// at most one of `on_error` / `on_completed`.
pub trait Observer<T>: Send + Sync {
    fn on_next(&self, value: T);

    fn on_error(&self, error: Error) {
        let _ = error;
    }

    fn on_completed(&self) {}
}

impl<T, O> Observer<T> for Arc<O>
where
    O: Observer<T> + ?Sized,
{
    fn on_next(&self, value: T) {
        (**self).on_next(value)
    }

    fn on_error(&self, error: Error) {
        (**self).on_error(error)
    }

    fn on_completed(&self) {
        (**self).on_completed()
    }
}

type NextFn<T> = Box<dyn Fn(T) + Send + Sync>;
type ErrorFn = Box<dyn Fn(Error) + Send + Sync>;
type CompletedFn = Box<dyn Fn() + Send + Sync>;

/// Observer assembled from closures.
pub struct ObserverFns<T> {
    next: NextFn<T>,
    error: Option<ErrorFn>,
    completed: Option<CompletedFn>,
}

impl<T> ObserverFns<T> {
    pub fn new<N>(next: N) -> Self
    where
        N: Fn(T) + Send + Sync + 'static,
    {
        Self {
            next: Box::new(next),
            error: None,
            completed: None,
        }
    }

    pub fn with_error<E>(mut self, error: E) -> Self
    where
        E: Fn(Error) + Send + Sync + 'static,
    {
        self.error = Some(Box::new(error));
        self
    }

    pub fn with_completed<C>(mut self, completed: C) -> Self
    where
        C: Fn() + Send + Sync + 'static,
    {
        self.completed = Some(Box::new(completed));
        self
    }
}

impl<T> Observer<T> for ObserverFns<T> {
    fn on_next(&self, value: T) {
        (self.next)(value)
    }

    fn on_error(&self, error: Error) {
        if let Some(f) = &self.error {
            f(error)
        }
    }

    fn on_completed(&self) {
        if let Some(f) = &self.completed {
            f()
        }
    }
}

pub fn observer_fn<T, N>(next: N) -> ObserverFns<T>
where
    N: Fn(T) + Send + Sync + 'static,
{
    ObserverFns::new(next)
}

pub fn observer_fns<T, N, E, C>(next: N, error: E, completed: C) -> ObserverFns<T>
where
    N: Fn(T) + Send + Sync + 'static,
    E: Fn(Error) + Send + Sync + 'static,
    C: Fn() + Send + Sync + 'static,
{
    ObserverFns::new(next)
        .with_error(error)
        .with_completed(completed)
}

// ─── Collector ────────────────────────────────────────────────────────────────

/// One delivered signal, as recorded by [`Collector`].
#[derive(Debug, Clone, PartialEq)]
pub enum Notification<T> {
    Next(T),
    Error(Error),
    Completed,
}

/// Observer that records every signal it receives, in order.
pub struct Collector<T> {
    log: Mutex<Vec<Notification<T>>>,
}

impl<T> Collector<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn notifications(&self) -> Vec<Notification<T>>
    where
        T: Clone,
    {
        self.log.lock().clone()
    }

    pub fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.log
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Next(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<Error> {
        self.log
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Error(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_completed(&self) -> bool {
        self.log
            .lock()
            .iter()
            .any(|n| matches!(n, Notification::Completed))
    }

    /// Number of terminal signals (errors and completions) received.
    pub fn terminal_count(&self) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|n| !matches!(n, Notification::Next(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Send> Observer<T> for Collector<T> {
    fn on_next(&self, value: T) {
        self.log.lock().push(Notification::Next(value));
    }

    fn on_error(&self, error: Error) {
        self.log.lock().push(Notification::Error(error));
    }

    fn on_completed(&self) {
        self.log.lock().push(Notification::Completed);
    }
}

impl<T> fmt::Debug for Collector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector").field("len", &self.len()).finish()
    }
}
