//! Constructors that turn an add/remove handler pair into an [`Observable`].
//!
//! Every constructor is cold: the handler is created and attached inside
//! `subscribe`, one per subscription, and the returned teardown detaches
//! that exact instance.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{error, trace, warn};

use crate::event::{Handler, Handler0, Handler2, Handler3, Handler4, Hook};
use crate::observable::{panic_message, Downstream, Observable};
use crate::subscription::Teardown;
use crate::{Error, Result};

/// Attach `handler` through `hook` and return the teardown that detaches it.
fn attach<H>(hook: &Hook<H>, handler: H) -> Teardown
where
    H: Send + 'static,
{
    hook.attach(&handler);
    trace!("handler attached");
    let hook = hook.clone();
    Teardown::new(move || {
        hook.detach(&handler);
        trace!("handler detached");
    })
}

/// Push one value through a subscription's chain. Whatever panics in the
/// chain faults that subscription; the raiser and the other handlers of the
/// event never see it.
fn forward<T>(down: &Downstream<T>, value: T) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| down.on_next(value))) {
        let message = panic_message(payload.as_ref());
        error!(%message, "subscriber chain panicked; detaching it");
        down.on_error(Error::Upstream(message));
    }
}

/// Build a notification and push it downstream. A panic while building is
/// reported on the error channel instead of unwinding into the raiser.
fn deliver<T>(down: &Downstream<T>, build: impl FnOnce() -> T) {
    match panic::catch_unwind(AssertUnwindSafe(build)) {
        Ok(value) => forward(down, value),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(%message, "event producer panicked");
            down.on_error(Error::Producer(message));
        }
    }
}

// ─── Arity variants ───────────────────────────────────────────────────────────

/// Bridge a parameterless event. Each firing yields `()`.
pub fn from_event0(hook: Hook<Handler0>) -> Observable<()> {
    Observable::create(move |down: Downstream<()>| {
        let handler: Handler0 = Arc::new(move || forward(&down, ()));
        attach(&hook, handler)
    })
}

/// Bridge a single-parameter event; the argument is the notification.
pub fn from_event<T>(hook: Hook<Handler<T>>) -> Observable<T>
where
    T: Send + 'static,
{
    Observable::create(move |down: Downstream<T>| {
        let handler: Handler<T> = Arc::new(move |value: T| forward(&down, value));
        attach(&hook, handler)
    })
}

/// Bridge a two-parameter event, packing both arguments with `pack`.
pub fn from_event2<A, B, T, P>(hook: Hook<Handler2<A, B>>, pack: P) -> Observable<T>
where
    A: 'static,
    B: 'static,
    T: Send + 'static,
    P: Fn(A, B) -> T + Send + Sync + 'static,
{
    let pack = Arc::new(pack);
    Observable::create(move |down: Downstream<T>| {
        let pack = Arc::clone(&pack);
        let handler: Handler2<A, B> =
            Arc::new(move |a: A, b: B| deliver(&down, || pack(a, b)));
        attach(&hook, handler)
    })
}

/// Bridge a three-parameter event, packing the arguments with `pack`.
pub fn from_event3<A, B, C, T, P>(hook: Hook<Handler3<A, B, C>>, pack: P) -> Observable<T>
where
    A: 'static,
    B: 'static,
    C: 'static,
    T: Send + 'static,
    P: Fn(A, B, C) -> T + Send + Sync + 'static,
{
    let pack = Arc::new(pack);
    Observable::create(move |down: Downstream<T>| {
        let pack = Arc::clone(&pack);
        let handler: Handler3<A, B, C> =
            Arc::new(move |a: A, b: B, c: C| deliver(&down, || pack(a, b, c)));
        attach(&hook, handler)
    })
}

/// Bridge a four-parameter event, packing the arguments with `pack`.
pub fn from_event4<A, B, C, D, T, P>(
    hook: Hook<Handler4<A, B, C, D>>,
    pack: P,
) -> Observable<T>
where
    A: 'static,
    B: 'static,
    C: 'static,
    D: 'static,
    T: Send + 'static,
    P: Fn(A, B, C, D) -> T + Send + Sync + 'static,
{
    let pack = Arc::new(pack);
    Observable::create(move |down: Downstream<T>| {
        let pack = Arc::clone(&pack);
        let handler: Handler4<A, B, C, D> =
            Arc::new(move |a: A, b: B, c: C, d: D| deliver(&down, || pack(a, b, c, d)));
        attach(&hook, handler)
    })
}

/// Bridge `data` and complete the sequence when `completion` fires.
pub fn from_event_until<T, C>(data: Hook<Handler<T>>, completion: Hook<Handler<C>>) -> Observable<T>
where
    T: Send + 'static,
    C: 'static,
{
    from_event(data).complete_on(completion)
}

// ─── Source precondition ─────────────────────────────────────────────────────

/// Build a sequence over an optional source.
///
/// Fails immediately with [`Error::MissingSource`] when the source is absent,
/// before anything could be subscribed.
pub fn from_source<S, T, B>(source: Option<&Arc<S>>, name: &'static str, build: B) -> Result<Observable<T>>
where
    S: ?Sized,
    B: FnOnce(Arc<S>) -> Observable<T>,
{
    match source {
        Some(source) => Ok(build(Arc::clone(source))),
        None => {
            warn!(source = name, "event source is missing");
            Err(Error::MissingSource { name })
        }
    }
}

// ─── Terminal events ──────────────────────────────────────────────────────────

impl<T: Send + 'static> Observable<T> {
    /// Complete the sequence when `completion` fires.
    ///
    /// The completion handler is attached before the data handler, one of
    /// each per subscription, and both are detached together when the
    /// sequence completes or the subscription is disposed.
    pub fn complete_on<C>(self, completion: Hook<Handler<C>>) -> Observable<T>
    where
        C: 'static,
    {
        Observable::create(move |down: Downstream<T>| {
            let done = Arc::clone(&down);
            let on_done: Handler<C> = Arc::new(move |_: C| done.on_completed());
            let stop = attach(&completion, on_done);
            let data = self.attach(down);
            data.and(stop)
        })
    }

    /// Fault the sequence with [`Error::Source`] when `failure` fires.
    pub fn error_on<E>(self, failure: Hook<Handler<E>>) -> Observable<T>
    where
        E: std::fmt::Display + 'static,
    {
        Observable::create(move |down: Downstream<T>| {
            let failed = Arc::clone(&down);
            let on_failure: Handler<E> =
                Arc::new(move |error: E| failed.on_error(Error::Source(error.to_string())));
            let fault = attach(&failure, on_failure);
            let data = self.attach(down);
            data.and(fault)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event0, Event1, Event2, Event4};
    use crate::observer::{Collector, Notification};

    #[derive(Default)]
    struct Feed {
        ticks: Event1<u32>,
        halted: Event1<&'static str>,
        pairs: Event2<u32, String>,
        quads: Event4<u8, u8, u8, u8>,
        pulse: Event0,
    }

    fn ticks(feed: &Feed) -> &Event1<u32> {
        &feed.ticks
    }

    fn halted(feed: &Feed) -> &Event1<&'static str> {
        &feed.halted
    }

    fn pairs(feed: &Feed) -> &Event2<u32, String> {
        &feed.pairs
    }

    fn quads(feed: &Feed) -> &Event4<u8, u8, u8, u8> {
        &feed.quads
    }

    fn pulse(feed: &Feed) -> &Event0 {
        &feed.pulse
    }

    #[test]
    fn nothing_is_attached_before_subscribe() {
        let feed = Arc::new(Feed::default());
        let stream = from_event(Hook::on(feed.clone(), ticks));
        assert_eq!(feed.ticks.handler_count(), 0);

        let subscription = stream.subscribe_fn(|_| {});
        assert_eq!(feed.ticks.handler_count(), 1);
        drop(subscription);
        assert_eq!(feed.ticks.handler_count(), 0);
    }

    #[test]
    fn parameterless_event_yields_unit() {
        let feed = Arc::new(Feed::default());
        let seen = Collector::new();
        let _sub = from_event0(Hook::on(feed.clone(), pulse)).subscribe(seen.clone());

        feed.pulse.raise();
        feed.pulse.raise();
        assert_eq!(seen.values(), vec![(), ()]);
    }

    #[test]
    fn packed_arguments_arrive_as_one_record() {
        let feed = Arc::new(Feed::default());
        let seen = Collector::new();
        let _sub = from_event2(Hook::on(feed.clone(), pairs), |n: u32, s: String| {
            format!("{s}{n}")
        })
        .subscribe(seen.clone());

        feed.pairs.raise(1, "a".to_string());
        feed.pairs.raise(2, "b".to_string());
        assert_eq!(seen.values(), vec!["a1".to_string(), "b2".to_string()]);
    }

    #[test]
    fn four_arguments_are_packed_in_order() {
        let feed = Arc::new(Feed::default());
        let seen = Collector::new();
        let _sub = from_event4(Hook::on(feed.clone(), quads), |a, b, c, d| [a, b, c, d])
            .subscribe(seen.clone());

        feed.quads.raise(1, 2, 3, 4);
        assert_eq!(seen.values(), vec![[1, 2, 3, 4]]);
    }

    #[test]
    fn pack_panic_is_routed_to_error_channel() {
        let feed = Arc::new(Feed::default());
        let seen = Collector::new();
        let _sub = from_event2(Hook::on(feed.clone(), pairs), |n: u32, _s: String| {
            if n == 2 {
                panic!("bad pair");
            }
            n
        })
        .subscribe(seen.clone());

        feed.pairs.raise(1, String::new());
        feed.pairs.raise(2, String::new());
        feed.pairs.raise(3, String::new());

        assert_eq!(
            seen.notifications(),
            vec![
                Notification::Next(1),
                Notification::Error(Error::Producer("bad pair".to_string())),
            ]
        );
        assert_eq!(feed.pairs.handler_count(), 0);
    }

    #[test]
    fn completion_detaches_both_handlers() {
        let feed = Arc::new(Feed::default());
        let seen = Collector::new();
        let subscription = from_event_until(Hook::on(feed.clone(), ticks), Hook::on(feed.clone(), halted))
            .subscribe(seen.clone());
        assert_eq!(feed.ticks.handler_count(), 1);
        assert_eq!(feed.halted.handler_count(), 1);

        feed.ticks.raise(1);
        feed.halted.raise("closed");
        feed.ticks.raise(2);

        assert_eq!(
            seen.notifications(),
            vec![Notification::Next(1), Notification::Completed]
        );
        assert!(subscription.is_disposed());
        assert_eq!(feed.ticks.handler_count(), 0);
        assert_eq!(feed.halted.handler_count(), 0);
    }

    #[test]
    fn error_event_faults_the_sequence() {
        let feed = Arc::new(Feed::default());
        let seen = Collector::new();
        let _sub = from_event(Hook::on(feed.clone(), ticks))
            .error_on(Hook::on(feed.clone(), halted))
            .subscribe(seen.clone());

        feed.halted.raise("feed lost");
        feed.ticks.raise(1);

        assert_eq!(
            seen.notifications(),
            vec![Notification::Error(Error::Source("feed lost".to_string()))]
        );
        assert_eq!(feed.ticks.handler_count(), 0);
        assert_eq!(feed.halted.handler_count(), 0);
    }

    #[test]
    fn from_source_requires_a_source() {
        let feed = Arc::new(Feed::default());
        let built = from_source(Some(&feed), "feed", |feed| from_event(Hook::on(feed, ticks)));
        assert!(built.is_ok());

        let missing: Option<&Arc<Feed>> = None;
        let err = from_source(missing, "feed", |feed| from_event(Hook::on(feed, ticks)))
            .map(|_| ())
            .unwrap_err();
        assert_eq!(err, Error::MissingSource { name: "feed" });
    }
}
