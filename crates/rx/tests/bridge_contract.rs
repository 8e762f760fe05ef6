use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rx::{
    from_event, from_event0, from_event2, from_source, Collector, CompositeSubscription, Error,
    Event0, Event1, Event2, Hook, Notification, Observable, Subscription,
};

#[derive(Default)]
struct Source {
    data: Event1<u32>,
    done: Event1<()>,
    pulse: Event0,
    pairs: Event2<u32, u32>,
}

fn data(source: &Source) -> &Event1<u32> {
    &source.data
}

fn done(source: &Source) -> &Event1<()> {
    &source.done
}

fn pulse(source: &Source) -> &Event0 {
    &source.pulse
}

fn pairs(source: &Source) -> &Event2<u32, u32> {
    &source.pairs
}

fn bridged(source: &Arc<Source>) -> Observable<u32> {
    from_event(Hook::on(source.clone(), data)).complete_on(Hook::on(source.clone(), done))
}

#[test]
fn data_then_completion_then_data() {
    let source = Arc::new(Source::default());
    let seen = Collector::new();
    let _sub = bridged(&source).subscribe(seen.clone());

    source.data.raise(1);
    source.data.raise(2);
    source.done.raise(());
    source.data.raise(3);

    assert_eq!(
        seen.notifications(),
        vec![
            Notification::Next(1),
            Notification::Next(2),
            Notification::Completed
        ]
    );
}

#[test]
fn completion_before_any_data() {
    let source = Arc::new(Source::default());
    let seen = Collector::new();
    let _sub = bridged(&source).subscribe(seen.clone());

    source.done.raise(());
    source.data.raise(1);

    assert_eq!(seen.notifications(), vec![Notification::Completed]);
    assert!(source.data.is_empty());
    assert!(source.done.is_empty());
}

#[test]
fn dispose_stops_without_terminal_signal() {
    let source = Arc::new(Source::default());
    let seen = Collector::new();
    let sub = bridged(&source).subscribe(seen.clone());

    source.data.raise(1);
    sub.dispose();
    source.data.raise(2);
    source.done.raise(());

    assert_eq!(seen.notifications(), vec![Notification::Next(1)]);
}

#[test]
fn independent_subscriptions_have_their_own_handlers() {
    let source = Arc::new(Source::default());
    let stream = bridged(&source);
    let first = Collector::new();
    let second = Collector::new();
    let sub_a = stream.subscribe(first.clone());
    let _sub_b = stream.subscribe(second.clone());
    assert_eq!(source.data.handler_count(), 2);

    source.data.raise(1);
    sub_a.dispose();
    source.data.raise(2);

    assert_eq!(first.values(), vec![1]);
    assert_eq!(second.values(), vec![1, 2]);
    assert_eq!(source.data.handler_count(), 1);
}

#[test]
fn missing_source_fails_before_subscribe() {
    let absent: Option<&Arc<Source>> = None;
    let result = from_source(absent, "candle manager", |s| bridged(&s));
    assert_eq!(
        result.map(|_| ()),
        Err(Error::MissingSource {
            name: "candle manager"
        })
    );
}

#[test]
fn failing_observer_does_not_disturb_others() {
    let source = Arc::new(Source::default());
    let stream = from_event0(Hook::on(source.clone(), pulse));

    let _faulty = stream.subscribe_fn(|()| panic!("consumer bug"));
    let healthy = Collector::new();
    let _healthy = stream.subscribe(healthy.clone());

    source.pulse.raise();
    source.pulse.raise();

    assert_eq!(healthy.values(), vec![(), ()]);
    assert_eq!(source.pulse.handler_count(), 1);
}

#[test]
fn panicking_filter_faults_only_its_own_subscription() {
    let source = Arc::new(Source::default());
    let faulty = Collector::new();
    let _faulty = from_event(Hook::on(source.clone(), data))
        .filter(|v: &u32| {
            assert!(*v != 2, "predicate bug");
            true
        })
        .subscribe(faulty.clone());
    let healthy = Collector::new();
    let _healthy = from_event(Hook::on(source.clone(), data)).subscribe(healthy.clone());

    source.data.raise(1);
    source.data.raise(2);
    source.data.raise(3);

    assert_eq!(healthy.values(), vec![1, 2, 3]);
    assert_eq!(faulty.values(), vec![1]);
    assert!(matches!(faulty.errors().as_slice(), [Error::Upstream(_)]));
    assert_eq!(source.data.handler_count(), 1);
}

#[test]
fn panicking_map_inside_a_chain_stays_contained() {
    let source = Arc::new(Source::default());
    let faulty = Collector::new();
    let _faulty = from_event(Hook::on(source.clone(), data))
        .map(|v: u32| {
            if v == 1 {
                panic!("mapper bug");
            }
            v * 10
        })
        .filter(|_| true)
        .subscribe(faulty.clone());
    let healthy = Collector::new();
    let _healthy = from_event(Hook::on(source.clone(), data)).subscribe(healthy.clone());

    source.data.raise(1);
    source.data.raise(2);

    assert_eq!(healthy.values(), vec![1, 2]);
    assert!(faulty.values().is_empty());
    assert_eq!(faulty.terminal_count(), 1);
    assert_eq!(source.data.handler_count(), 1);
}

#[test]
fn panicking_step_after_a_packed_event_stays_contained() {
    let source = Arc::new(Source::default());
    let faulty = Collector::new();
    let _faulty = from_event2(Hook::on(source.clone(), pairs), |a: u32, b: u32| a + b)
        .inspect(|_| panic!("downstream bug"))
        .subscribe(faulty.clone());
    let healthy = Collector::new();
    let _healthy =
        from_event2(Hook::on(source.clone(), pairs), |a: u32, b: u32| a * b).subscribe(healthy.clone());

    source.pairs.raise(2, 3);
    source.pairs.raise(4, 5);

    assert_eq!(healthy.values(), vec![6, 20]);
    assert!(matches!(faulty.errors().as_slice(), [Error::Upstream(_)]));
    assert_eq!(source.pairs.handler_count(), 1);
}

#[test]
fn observers_on_two_threads_may_dispose_each_other() {
    let source = Arc::new(Source::default());
    let slot_a: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let slot_b: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let both_inside = Arc::new(Barrier::new(2));

    let sub_a = {
        let other = slot_b.clone();
        let both_inside = both_inside.clone();
        from_event(Hook::on(source.clone(), data)).subscribe_fn(move |_| {
            both_inside.wait();
            if let Some(sub) = other.lock().as_ref() {
                sub.dispose();
            }
        })
    };
    let sub_b = {
        let other = slot_a.clone();
        let both_inside = both_inside.clone();
        from_event(Hook::on(source.clone(), done)).subscribe_fn(move |()| {
            both_inside.wait();
            if let Some(sub) = other.lock().as_ref() {
                sub.dispose();
            }
        })
    };
    *slot_a.lock() = Some(sub_a);
    *slot_b.lock() = Some(sub_b);

    let (finished, wait) = mpsc::channel();
    let first = {
        let source = source.clone();
        let finished = finished.clone();
        thread::spawn(move || {
            source.data.raise(1);
            let _ = finished.send(());
        })
    };
    let second = {
        let source = source.clone();
        thread::spawn(move || {
            source.done.raise(());
            let _ = finished.send(());
        })
    };

    for _ in 0..2 {
        wait.recv_timeout(Duration::from_secs(5))
            .expect("cross dispose blocked");
    }
    first.join().unwrap();
    second.join().unwrap();
    assert!(source.data.is_empty());
    assert!(source.done.is_empty());
}

#[test]
fn observer_may_dispose_its_own_subscription() {
    let source = Arc::new(Source::default());
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let seen = Arc::new(AtomicUsize::new(0));

    let sub = {
        let slot = slot.clone();
        let seen = seen.clone();
        bridged(&source).subscribe_fn(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = slot.lock().as_ref() {
                me.dispose();
            }
        })
    };
    *slot.lock() = Some(sub);

    source.data.raise(1);
    source.data.raise(2);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert!(source.data.is_empty());
}

#[test]
fn nothing_is_delivered_after_concurrent_dispose_returns() {
    let source = Arc::new(Source::default());
    let disposed = Arc::new(AtomicBool::new(false));
    let late = Arc::new(AtomicUsize::new(0));

    let sub = {
        let disposed = disposed.clone();
        let late = late.clone();
        from_event(Hook::on(source.clone(), data)).subscribe_fn(move |_| {
            if disposed.load(Ordering::SeqCst) {
                late.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let start = Arc::new(Barrier::new(2));
    let raiser = {
        let source = source.clone();
        let start = start.clone();
        thread::spawn(move || {
            start.wait();
            for n in 0..10_000 {
                source.data.raise(n);
            }
        })
    };

    start.wait();
    sub.dispose();
    disposed.store(true, Ordering::SeqCst);
    raiser.join().unwrap();

    assert_eq!(late.load(Ordering::SeqCst), 0);
    assert!(source.data.is_empty());
}

#[test]
fn composite_releases_every_member() {
    let source = Arc::new(Source::default());
    let group = CompositeSubscription::new();
    for _ in 0..3 {
        group.add(bridged(&source).subscribe_fn(|_| {}));
    }
    assert_eq!(source.data.handler_count(), 3);
    assert_eq!(source.done.handler_count(), 3);

    group.dispose();
    assert!(source.data.is_empty());
    assert!(source.done.is_empty());
}
