use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::Event;

/// The fixed set of topics events are published under. Each topic has its
/// own independent registry of subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Topic {
    Session = 0,
    Message = 1,
    FileHistory = 2,
    Permission = 3,
    Lsp = 4,
    Mcp = 5,
}

impl Topic {
    pub(crate) const COUNT: usize = 6;
}

struct Subscriber {
    id: u64,
    queue: Mutex<VecDeque<Event>>,
    notify: Notify,
    capacity: usize,
}

/// Per-topic subscriber registry. Lives inside `EventBus`'s `Inner`, one per
/// `Topic` variant, wrapped in an `Arc` so a `Subscription` can outlive any
/// particular borrow of the `EventBus` that created it.
pub(crate) struct TopicRegistry {
    state: Arc<RegistryState>,
}

struct RegistryState {
    subscribers: Mutex<Vec<Arc<Subscriber>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl TopicRegistry {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(RegistryState {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                capacity,
            }),
        }
    }

    /// Push `event` onto every live subscriber's queue. Returns `true` if
    /// any subscriber had to drop its oldest queued event to make room.
    pub(crate) fn publish(&self, event: Event) -> bool {
        let subs = self.state.subscribers.lock().unwrap();
        let mut any_dropped = false;
        for sub in subs.iter() {
            let mut q = sub.queue.lock().unwrap();
            if q.len() >= sub.capacity {
                q.pop_front();
                any_dropped = true;
            }
            q.push_back(event.clone());
            drop(q);
            sub.notify.notify_one();
        }
        any_dropped
    }

    pub(crate) fn subscribe(&self) -> Subscription {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        let sub = Arc::new(Subscriber {
            id,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity: self.state.capacity,
        });
        self.state.subscribers.lock().unwrap().push(sub.clone());
        Subscription {
            registry: self.state.clone(),
            sub,
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.state.subscribers.lock().unwrap().len()
    }
}

/// A handle to a single subscriber's event stream. Dropping it deregisters
/// the subscriber from its topic.
pub struct Subscription {
    registry: Arc<RegistryState>,
    sub: Arc<Subscriber>,
}

impl Subscription {
    /// Await the next event for this subscriber. The bus itself never
    /// closes a subscription from the publisher side, so this only ever
    /// returns `None` after the subscriber has unregistered, which can't
    /// happen while `self` is alive — callers can treat `Some` as the
    /// steady-state case and rely on `Drop` for cleanup.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            if let Some(ev) = self.sub.queue.lock().unwrap().pop_front() {
                return Some(ev);
            }
            self.sub.notify.notified().await;
        }
    }

    /// Non-blocking poll: returns the next queued event if one is already
    /// available, without suspending.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.sub.queue.lock().unwrap().pop_front()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry
            .subscribers
            .lock()
            .unwrap()
            .retain(|s| s.id != self.sub.id);
    }
}
