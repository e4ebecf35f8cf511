//! Pull-based access to a handle's change events.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError, TrySendError};

use crate::event::MediaEvent;
use crate::handle::MediaQueryList;
use crate::listener::Listener;

/// A channel-backed view of the change events delivered to one handle.
///
/// The stream registers a persistent listener that forwards every delivered
/// event into a bounded buffer. Events that do not fit are dropped and
/// counted. Dropping the stream removes the listener.
#[derive(Debug)]
pub struct ChangeStream {
    handle: MediaQueryList,
    listener: Listener,
    rx: Receiver<MediaEvent>,
    dropped_events: Arc<AtomicU64>,
    unsubscribed: AtomicBool,
}

impl ChangeStream {
    pub(crate) fn attach(handle: MediaQueryList, capacity: usize) -> Self {
        let (tx, rx) = bounded::<MediaEvent>(capacity.max(1));
        let dropped_events = Arc::new(AtomicU64::new(0));

        let dropped = Arc::clone(&dropped_events);
        let listener = Listener::new(move |event| match tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                dropped.fetch_add(1, Ordering::Relaxed);
            }
        });
        handle.add_listener(listener.clone());

        Self {
            handle,
            listener,
            rx,
            dropped_events,
            unsubscribed: AtomicBool::new(false),
        }
    }

    /// The handle this stream observes.
    #[must_use]
    pub const fn handle(&self) -> &MediaQueryList {
        &self.handle
    }

    /// Removes the forwarding listener. Idempotent.
    ///
    /// Buffered events remain readable.
    pub fn unsubscribe(&self) {
        if self.unsubscribed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.handle.remove_listener(&self.listener);
    }

    /// Next buffered event, if any.
    #[must_use]
    pub fn try_recv(&self) -> Option<MediaEvent> {
        match self.rx.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for the next event.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<MediaEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drains every buffered event.
    #[must_use]
    pub fn drain(&self) -> Vec<MediaEvent> {
        self.rx.try_iter().collect()
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if no event is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Events discarded because the buffer was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
