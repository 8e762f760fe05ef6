//! Event-to-observable bridge.
//!
//! Platform objects publish multicast [`Event`]s. The constructors in
//! [`bridge`] turn an event's add/remove pair into a cold [`Observable`]:
//! each subscription attaches one handler and disposing it detaches exactly
//! that handler. Delivery happens synchronously on the raising thread.

pub mod bridge;
pub mod error;
pub mod event;
pub mod observable;
pub mod observer;
pub mod operators;
pub mod stream;
pub mod subscription;

pub use bridge::{from_event, from_event0, from_event2, from_event3, from_event4, from_event_until, from_source};
pub use error::{Error, Result};
pub use event::{
    Event, Event0, Event1, Event2, Event3, Event4, Handler, Handler0, Handler2, Handler3, Handler4, Hook,
};
pub use observable::{Downstream, Observable};
pub use observer::{observer_fn, observer_fns, Collector, Notification, Observer, ObserverFns};
pub use operators::from_iter;
pub use stream::EventStream;
pub use subscription::{CompositeSubscription, Subscription, Teardown};
