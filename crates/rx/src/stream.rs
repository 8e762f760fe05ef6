use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::observable::Observable;
use crate::observer::Observer;
use crate::subscription::Subscription;
use crate::{Error, Result};

/// Async view of a sequence.
///
/// Notifications are queued on an unbounded channel so the raising thread
/// never waits on the consumer. The stream owns its subscription: dropping
/// it detaches the underlying handlers. It ends after a completion, or
/// after yielding the error that faulted the sequence.
pub struct EventStream<T> {
    rx: mpsc::UnboundedReceiver<Result<T>>,
    subscription: Subscription,
}

impl<T> EventStream<T> {
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Detach from the source. Notifications already queued are still
    /// yielded, then the stream ends.
    pub fn close(&self) {
        self.subscription.dispose();
    }
}

impl<T> Stream for EventStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.subscription.is_disposed() {
            self.rx.close();
        }
        self.rx.poll_recv(cx)
    }
}

struct ChannelObserver<T> {
    tx: Mutex<Option<mpsc::UnboundedSender<Result<T>>>>,
}

impl<T: Send> Observer<T> for ChannelObserver<T> {
    fn on_next(&self, value: T) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(Ok(value));
        }
    }

    fn on_error(&self, error: Error) {
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(Err(error));
        }
    }

    fn on_completed(&self) {
        self.tx.lock().take();
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Consume the sequence as a [`Stream`] of `Result<T>`.
    pub fn into_stream(self) -> EventStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(ChannelObserver {
            tx: Mutex::new(Some(tx)),
        });
        EventStream { rx, subscription }
    }
}
