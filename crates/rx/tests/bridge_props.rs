use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use rx::{from_event, Collector, Event1, Handler, Hook, Notification};

/// An event source that counts detach calls on top of its handler list.
#[derive(Default)]
struct Counted {
    values: Event1<i64>,
    stopped: Event1<()>,
    detaches: AtomicUsize,
}

fn counted_hook(source: &Arc<Counted>) -> Hook<Handler<i64>> {
    let add = source.clone();
    let remove = source.clone();
    Hook::new(
        move |h: &Handler<i64>| add.values.add(h),
        move |h: &Handler<i64>| {
            remove.detaches.fetch_add(1, Ordering::SeqCst);
            remove.values.remove(h);
        },
    )
}

fn stopped(source: &Counted) -> &Event1<()> {
    &source.stopped
}

proptest! {
    /// Subscribing then disposing leaves the handler list as it was.
    #[test]
    fn subscribe_dispose_leaks_nothing(preexisting in 0usize..5, subscriptions in 1usize..8) {
        let source = Arc::new(Counted::default());
        let keep: Vec<Handler<i64>> = (0..preexisting).map(|_| Arc::new(|_: i64| {}) as Handler<i64>).collect();
        for h in &keep {
            source.values.add(h);
        }

        let stream = from_event(counted_hook(&source));
        let subs: Vec<_> = (0..subscriptions).map(|_| stream.subscribe_fn(|_| {})).collect();
        prop_assert_eq!(source.values.handler_count(), preexisting + subscriptions);

        drop(subs);
        prop_assert_eq!(source.values.handler_count(), preexisting);
    }

    /// Values arrive exactly in the order raised.
    #[test]
    fn order_is_preserved(values in proptest::collection::vec(any::<i64>(), 0..64)) {
        let source = Arc::new(Counted::default());
        let seen = Collector::new();
        let _sub = from_event(counted_hook(&source)).subscribe(seen.clone());

        for v in &values {
            source.values.raise(*v);
        }
        prop_assert_eq!(seen.values(), values);
    }

    /// Any number of dispose calls detaches exactly once.
    #[test]
    fn dispose_is_idempotent(calls in 1usize..10) {
        let source = Arc::new(Counted::default());
        let sub = from_event(counted_hook(&source)).subscribe_fn(|_| {});
        for _ in 0..calls {
            sub.dispose();
        }
        drop(sub);
        prop_assert_eq!(source.detaches.load(Ordering::SeqCst), 1);
    }

    /// K values, then completion, then more values: exactly K values and
    /// one terminal signal are observed.
    #[test]
    fn completion_ends_after_k_values(k in 0usize..20, after in 0usize..20) {
        let source = Arc::new(Counted::default());
        let seen = Collector::new();
        let _sub = from_event(counted_hook(&source))
            .complete_on(Hook::on(source.clone(), stopped))
            .subscribe(seen.clone());

        for v in 0..k {
            source.values.raise(v as i64);
        }
        source.stopped.raise(());
        for v in 0..after {
            source.values.raise(v as i64);
        }

        prop_assert_eq!(seen.values().len(), k);
        prop_assert_eq!(seen.terminal_count(), 1);
        let notes = seen.notifications();
        prop_assert_eq!(notes.last(), Some(&Notification::Completed));
        prop_assert_eq!(source.detaches.load(Ordering::SeqCst), 1);
    }
}
