//! Listener dispatch
//!
//! Ordered, panic-isolated delivery of description events. Publishers commit
//! notifications to a FIFO queue while holding their own state lock, receive a
//! [`Ticket`], then call [`Dispatcher::drain`] with it after releasing the lock.
//! Only one thread drains a queue at a time, so every listener observes events
//! in commit order and no publisher lock is held while listener code runs.
//!
//! `drain` returns once the caller's notifications have been delivered: the
//! caller either drains them itself or waits for the active drainer to pass
//! its ticket. A thread that is itself delivering callbacks (of any
//! dispatcher) never waits; it leaves its notifications to the active drainer
//! and returns. Waiting there could close a cycle between two publishers
//! draining on different threads.

use crate::provider::ConfigDescriptionListener;
use crate::types::{instance_key, DescriptionEvent, InstanceKey};
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, trace};

/// A registered listener as seen by a publisher.
///
/// The listener reference sits behind a reentrant lock held for the duration
/// of each callback, so [`ListenerSlot::close`] waits for a callback running on
/// another thread while a listener may still close its own slot from inside a
/// callback.
pub(crate) struct ListenerSlot {
    key: InstanceKey,
    listener: ReentrantMutex<RefCell<Option<Arc<dyn ConfigDescriptionListener>>>>,
}

impl ListenerSlot {
    pub(crate) fn new(listener: Arc<dyn ConfigDescriptionListener>) -> Arc<Self> {
        Arc::new(Self {
            key: instance_key(&listener),
            listener: ReentrantMutex::new(RefCell::new(Some(listener))),
        })
    }

    pub(crate) fn key(&self) -> InstanceKey {
        self.key
    }

    /// Release the listener. No callback starts after this returns.
    pub(crate) fn close(&self) {
        let guard = self.listener.lock();
        guard.borrow_mut().take();
    }

    /// Returns `Ok(false)` when the slot was already closed.
    fn deliver(&self, event: &DescriptionEvent) -> Result<bool, String> {
        let guard = self.listener.lock();
        let listener = guard.borrow().clone();
        let Some(listener) = listener else {
            return Ok(false);
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match event {
            DescriptionEvent::Added(description) => listener.added(description),
            DescriptionEvent::Removed(description) => listener.removed(description),
        }));
        drop(guard);

        outcome
            .map(|_| true)
            .map_err(|payload| panic_message(payload.as_ref()))
    }
}

thread_local! {
    /// Number of drains running on this thread
    static DRAIN_DEPTH: Cell<usize> = const { Cell::new(0) };
}

fn in_callback() -> bool {
    DRAIN_DEPTH.with(|depth| depth.get() > 0)
}

struct DrainScope;

impl DrainScope {
    fn enter() -> Self {
        DRAIN_DEPTH.with(|depth| depth.set(depth.get() + 1));
        DrainScope
    }
}

impl Drop for DrainScope {
    fn drop(&mut self) {
        DRAIN_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// Position of a caller's last notification in the dispatch queue.
///
/// Zero means nothing was queued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Ticket(u64);

struct Notification {
    event: DescriptionEvent,
    recipients: Arc<[Arc<ListenerSlot>]>,
}

#[derive(Default)]
struct DispatchQueue {
    pending: VecDeque<Notification>,
    draining: bool,
    /// Notifications queued so far
    enqueued: u64,
    /// Notifications delivered so far
    delivered: u64,
}

/// FIFO notification queue shared by one publisher.
pub(crate) struct Dispatcher {
    name: String,
    queue: Mutex<DispatchQueue>,
    progress: Condvar,
    failures: AtomicU64,
}

impl Dispatcher {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: Mutex::new(DispatchQueue::default()),
            progress: Condvar::new(),
            failures: AtomicU64::new(0),
        }
    }

    /// Queue `events` for `recipients`.
    ///
    /// Call while holding the publisher's state lock so queue order matches
    /// commit order.
    pub(crate) fn enqueue<I>(&self, events: I, recipients: &[Arc<ListenerSlot>]) -> Ticket
    where
        I: IntoIterator<Item = DescriptionEvent>,
    {
        if recipients.is_empty() {
            return Ticket::default();
        }
        let recipients: Arc<[Arc<ListenerSlot>]> = recipients.into();
        let mut queue = self.queue.lock();
        for event in events {
            queue.pending.push_back(Notification {
                event,
                recipients: Arc::clone(&recipients),
            });
            queue.enqueued += 1;
        }
        Ticket(queue.enqueued)
    }

    /// Deliver queued notifications up to `ticket`.
    ///
    /// Returns once they have been delivered, unless called from inside a
    /// listener callback while another thread drains this queue. Must not be
    /// called while holding the publisher's state lock.
    pub(crate) fn drain(&self, ticket: Ticket) {
        {
            let mut queue = self.queue.lock();
            loop {
                if queue.delivered >= ticket.0 {
                    return;
                }
                if !queue.draining {
                    queue.draining = true;
                    break;
                }
                if in_callback() {
                    return;
                }
                self.progress.wait(&mut queue);
            }
        }

        let _scope = DrainScope::enter();
        loop {
            let notification = {
                let mut queue = self.queue.lock();
                match queue.pending.pop_front() {
                    Some(notification) => notification,
                    None => {
                        queue.draining = false;
                        self.progress.notify_all();
                        return;
                    }
                }
            };

            for slot in notification.recipients.iter() {
                self.deliver_one(slot, &notification.event);
            }

            self.queue.lock().delivered += 1;
            self.progress.notify_all();
        }
    }

    fn deliver_one(&self, slot: &ListenerSlot, event: &DescriptionEvent) {
        match slot.deliver(event) {
            Ok(true) => trace!(
                publisher = %self.name,
                listener = slot.key(),
                event = event.kind(),
                uri = event.description().uri(),
                "Delivered description event"
            ),
            Ok(false) => {}
            Err(message) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    publisher = %self.name,
                    listener = slot.key(),
                    event = event.kind(),
                    uri = event.description().uri(),
                    "Listener callback panicked: {}",
                    message
                );
            }
        }
    }

    /// Number of listener callbacks that panicked so far
    pub(crate) fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
