//! Channel-based building blocks for correlating unsolicited radio-stack
//! events with the calls that triggered them.
//!
//! The transport never hands back a request identifier, so each expected
//! result owns a named channel: a [`CompletionSlot`] for a single-shot
//! request, a [`ListenerSet`] for persistent subscribers, a
//! [`SingleListener`] for the replace-on-register slots (RSSI, scan
//! subscriber). Event routing resolves the matching channel set; callers
//! await the other end.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task;

use async_broadcast::{Receiver, Sender};
use async_lock::Mutex;

/// A single-shot result slot with states `{idle, awaiting}`.
///
/// Registering while another request is awaiting displaces the earlier
/// waiter: its [`Completion::wait`] resolves to `None` instead of leaking a
/// never-invoked completion. Resolving clears the slot.
pub(crate) struct CompletionSlot<T: Send> {
    inner: Mutex<Option<Pending<T>>>,
}

struct Pending<T> {
    id: u64,
    sender: async_channel::Sender<T>,
}

/// The waiting end of a registration on a [`CompletionSlot`].
pub(crate) struct Completion<T: Send> {
    id: u64,
    receiver: async_channel::Receiver<T>,
}

impl<T: Send> CompletionSlot<T> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Registers a new waiter, displacing any unresolved one.
    pub fn register(&self) -> Completion<T> {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);

        let (sender, receiver) = async_channel::bounded(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        self.inner.lock_blocking().replace(Pending { id, sender });
        Completion { id, receiver }
    }

    /// Delivers `value` to the awaiting waiter and clears the slot.
    /// Returns `false` when the slot is idle (nobody expected this result).
    pub fn resolve(&self, value: T) -> bool {
        let Some(pending) = self.inner.lock_blocking().take() else {
            return false;
        };
        // The waiter may have been dropped; the slot was occupied either way.
        let _ = pending.sender.try_send(value);
        true
    }

    pub fn is_awaiting(&self) -> bool {
        self.inner.lock_blocking().is_some()
    }

    /// Rolls back `completion`'s registration if it is still the pending
    /// one. Used when the transport rejects the command that was supposed
    /// to produce the result.
    pub fn cancel(&self, completion: &Completion<T>) {
        let mut guard = self.inner.lock_blocking();
        if guard.as_ref().is_some_and(|p| p.id == completion.id) {
            let _ = guard.take();
        }
    }

    /// Drops any pending registration so its waiter resolves to `None`.
    pub fn close(&self) {
        let _ = self.inner.lock_blocking().take();
    }
}

impl<T: Send> Completion<T> {
    /// Waits for the result. Returns `None` when displaced by a later
    /// registration or when the slot was closed on session teardown.
    pub async fn wait(self) -> Option<T> {
        self.receiver.recv().await.ok()
    }
}

/// Broadcasts results from the event-routing context to any number of
/// persistent [`Listener`] streams.
pub(crate) struct ListenerSet<T: Send + Clone> {
    capacity: usize,
    inner: Mutex<Weak<ListenersInner<T>>>,
}

struct ListenersInner<T: Send + Clone> {
    sender: Sender<Option<T>>,
    on_stop: Box<dyn Fn() + Send + Sync + 'static>,
}

/// A stream of results delivered to one persistent listener. Ends when the
/// owning session is torn down or the listener set is cleared.
pub struct Listener<T: Send + Clone> {
    holder: Option<Arc<ListenersInner<T>>>,
    receiver: Receiver<Option<T>>,
}

impl<T: Send + Clone> ListenerSet<T> {
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Weak::new()),
        }
    }

    /// Registers a new listener.
    /// - `on_start` runs while holding the set lock if the set was inactive.
    /// - `on_stop` is what the set should do once the last listener is
    ///   dropped; it is not replaced if the set is already active.
    pub fn subscribe<E>(
        &self,
        on_start: impl FnOnce() -> Result<(), E>,
        on_stop: impl Fn() + Send + Sync + 'static,
    ) -> Result<Listener<T>, E> {
        let mut guard = self.inner.lock_blocking();
        if let Some(inner) = guard.upgrade() {
            let receiver = inner.sender.new_receiver();
            Ok(Listener {
                holder: Some(inner),
                receiver,
            })
        } else {
            on_start()?;
            let (mut sender, receiver) = async_broadcast::broadcast(self.capacity);
            sender.set_overflow(true);
            let new_inner = Arc::new(ListenersInner {
                sender,
                on_stop: Box::new(on_stop),
            });
            *guard = Arc::downgrade(&new_inner);
            Ok(Listener {
                holder: Some(new_inner),
                receiver,
            })
        }
    }

    /// Delivers `value` to every live listener. Returns `false` when the
    /// set is inactive.
    pub fn notify(&self, value: T) -> bool {
        let inner = self.inner.lock_blocking().upgrade();
        if let Some(inner) = inner {
            let _ = inner.sender.broadcast_blocking(Some(value));
            true
        } else {
            false
        }
    }

    /// Ends every listener stream and detaches the set from them, so
    /// results delivered afterwards count as receiver-less even while the
    /// ended streams are still being drained.
    pub fn close(&self) {
        let mut guard = self.inner.lock_blocking();
        if let Some(inner) = guard.upgrade() {
            let _ = inner.sender.broadcast_blocking(None);
        }
        *guard = Weak::new();
    }
}

impl<T: Send + Clone> Drop for ListenerSet<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Send + Clone> futures_core::Stream for Listener<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<Option<T>> {
        if self.holder.is_none() {
            task::Poll::Ready(None)
        } else if let task::Poll::Ready(result) = std::pin::pin!(&mut self.receiver).poll_next(cx)
        {
            if let Some(value) = result.flatten() {
                task::Poll::Ready(Some(value))
            } else {
                let _ = self.holder.take();
                task::Poll::Ready(None)
            }
        } else {
            task::Poll::Pending
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        futures_core::Stream::size_hint(&self.receiver)
    }
}

impl<T: Send + Clone> Drop for ListenersInner<T> {
    fn drop(&mut self) {
        (self.on_stop)()
    }
}

/// At most one listener; a new registration displaces the previous one,
/// whose stream ends. Results are dropped while no listener is registered.
pub(crate) struct SingleListener<T: Send> {
    inner: Mutex<Option<async_channel::Sender<T>>>,
}

impl<T: Send> SingleListener<T> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Registers a listener, displacing any previous one.
    /// Returns the receiving stream and whether a listener was displaced.
    pub fn register(&self) -> (async_channel::Receiver<T>, bool) {
        let (sender, receiver) = async_channel::unbounded();
        let prev = self.inner.lock_blocking().replace(sender);
        (receiver, prev.is_some())
    }

    /// Delivers `value` to the current listener, if one is registered and
    /// still being read. Returns `false` otherwise.
    pub fn notify(&self, value: T) -> bool {
        let mut guard = self.inner.lock_blocking();
        match guard.as_ref() {
            Some(sender) if sender.try_send(value).is_ok() => true,
            Some(_) => {
                // The stream was dropped by its reader.
                let _ = guard.take();
                false
            }
            None => false,
        }
    }

    /// Removes the current listener, ending its stream.
    pub fn close(&self) {
        let _ = self.inner.lock_blocking().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::block_on;
    use futures_lite::StreamExt;

    #[test]
    fn slot_resolves_once() {
        let slot: CompletionSlot<u8> = CompletionSlot::new();
        assert!(!slot.resolve(1));
        let completion = slot.register();
        assert!(slot.is_awaiting());
        assert!(slot.resolve(2));
        assert!(!slot.is_awaiting());
        assert!(!slot.resolve(3));
        assert_eq!(block_on(completion.wait()), Some(2));
    }

    #[test]
    fn slot_displaces_earlier_waiter() {
        let slot: CompletionSlot<u8> = CompletionSlot::new();
        let first = slot.register();
        let second = slot.register();
        assert!(slot.resolve(7));
        assert_eq!(block_on(first.wait()), None);
        assert_eq!(block_on(second.wait()), Some(7));
    }

    #[test]
    fn slot_cancel_is_identity_checked() {
        let slot: CompletionSlot<u8> = CompletionSlot::new();
        let first = slot.register();
        let second = slot.register();
        // Rolling back the displaced registration must not clear the live one.
        slot.cancel(&first);
        assert!(slot.is_awaiting());
        slot.cancel(&second);
        assert!(!slot.is_awaiting());
    }

    #[test]
    fn listener_set_fans_out_and_persists() {
        block_on(async {
            let set: ListenerSet<u8> = ListenerSet::new(16);
            assert!(!set.notify(0));

            let mut a = set.subscribe(|| Ok::<_, ()>(()), || ()).unwrap();
            let mut b = set.subscribe(|| Ok::<_, ()>(()), || ()).unwrap();
            assert!(set.notify(1));
            assert!(set.notify(2));
            assert_eq!(a.next().await, Some(1));
            assert_eq!(a.next().await, Some(2));
            assert_eq!(b.next().await, Some(1));
            assert_eq!(b.next().await, Some(2));

            set.close();
            assert_eq!(a.next().await, None);
            assert_eq!(b.next().await, None);
            // Closed means receiver-less, even while ended streams linger.
            assert!(!set.notify(3));
        });
    }

    #[test]
    fn listener_set_start_stop_hooks() {
        use std::sync::atomic::AtomicUsize;
        let starts = Arc::new(AtomicUsize::new(0));
        let stops = Arc::new(AtomicUsize::new(0));

        let set: ListenerSet<u8> = ListenerSet::new(16);
        let (s, t) = (starts.clone(), stops.clone());
        let first = set
            .subscribe(
                || {
                    s.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(())
                },
                move || {
                    t.fetch_add(1, Ordering::SeqCst);
                },
            )
            .unwrap();
        let second = set
            .subscribe(|| -> Result<(), ()> { unreachable!() }, || ())
            .unwrap();
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        drop(first);
        assert_eq!(stops.load(Ordering::SeqCst), 0);
        drop(second);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(!set.notify(1));
    }

    #[test]
    fn single_listener_replacement_ends_previous_stream() {
        block_on(async {
            let slot: SingleListener<u8> = SingleListener::new();
            assert!(!slot.notify(0));

            let (first, displaced) = slot.register();
            assert!(!displaced);
            assert!(slot.notify(1));

            let (second, displaced) = slot.register();
            assert!(displaced);
            assert!(slot.notify(2));

            assert_eq!(first.recv().await.ok(), Some(1));
            assert!(first.recv().await.is_err());
            assert_eq!(second.recv().await.ok(), Some(2));

            slot.close();
            assert!(second.recv().await.is_err());
        });
    }
}
