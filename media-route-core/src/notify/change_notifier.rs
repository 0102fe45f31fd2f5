use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::event::RouteEvent;
use crate::traits::route_observer::{self, RouteObserver};

/// Handle returned by [`ChangeNotifier::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Uuid);

impl SubscriptionHandle {
    pub fn id(&self) -> Uuid {
        self.0
    }
}

/// An event stamped with its position in the global publish order.
#[derive(Debug, Clone)]
struct Envelope {
    sequence: u64,
    event: RouteEvent,
}

struct Subscriber {
    handle: SubscriptionHandle,
    queue: Sender<Envelope>,
}

struct NotifierInner {
    subscribers: Vec<Subscriber>,
    next_sequence: u64,
}

/// Fans route events out to observers without ever blocking the publisher.
///
/// Each observer owns an unbounded queue drained by a dedicated delivery
/// thread. Publishing stamps the event and enqueues it for every observer
/// under a single lock, so all observers see events in the same order and a
/// stalled observer only delays itself.
pub struct ChangeNotifier {
    inner: Mutex<NotifierInner>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(NotifierInner {
                subscribers: Vec::new(),
                next_sequence: 0,
            }),
        }
    }

    /// Register `observer` on its own delivery thread.
    ///
    /// Returns `None`, and registers nothing, if that thread cannot be spawned.
    pub fn subscribe(&self, observer: Arc<dyn RouteObserver>) -> Option<SubscriptionHandle> {
        let handle = SubscriptionHandle(Uuid::new_v4());
        let (queue, receiver) = mpsc::channel::<Envelope>();

        let spawned = thread::Builder::new()
            .name(format!("route-observer-{}", &handle.0.simple().to_string()[..8]))
            .spawn(move || {
                let mut last_sequence = 0;
                // Ends when the sender is dropped by unsubscribe or notifier drop.
                for envelope in receiver {
                    debug_assert!(envelope.sequence > last_sequence);
                    last_sequence = envelope.sequence;
                    route_observer::dispatch(observer.as_ref(), &envelope.event);
                }
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn observer delivery thread: {}", e);
            return None;
        }

        self.inner.lock().subscribers.push(Subscriber { handle, queue });
        log::debug!("Route observer subscribed: {}", handle.0);
        Some(handle)
    }

    /// Stop delivering to `handle`. Events already queued are still delivered.
    ///
    /// Returns false if the handle was unknown.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.handle != handle);
        let removed = inner.subscribers.len() != before;
        if removed {
            log::debug!("Route observer unsubscribed: {}", handle.0);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Enqueue `event` for every current observer and return immediately.
    pub fn publish(&self, event: RouteEvent) {
        let mut inner = self.inner.lock();
        inner.next_sequence += 1;
        let sequence = inner.next_sequence;

        // A failed send means the delivery thread is gone (observer panicked).
        inner.subscribers.retain(|subscriber| {
            let delivered = subscriber
                .queue
                .send(Envelope {
                    sequence,
                    event: event.clone(),
                })
                .is_ok();
            if !delivered {
                log::warn!(
                    "Dropping route observer {} whose delivery thread exited",
                    subscriber.handle.0
                );
            }
            delivered
        });
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
