// SPDX-License-Identifier: Apache-2.0
//! The event bus (C1): a typed publish/subscribe registry over a closed set
//! of domain event kinds.
//!
//! Every mutation in `crush-store`, `crush-permission`, `crush-lsp`, and
//! `crush-mcp` is announced here so the UI (and any other subscriber) can
//! stay current without polling. Delivery is best-effort per subscriber: a
//! slow subscriber never blocks a publisher. Each subscriber owns a bounded
//! ring buffer; when it is full the oldest undelivered event is dropped and
//! a counter is incremented instead of blocking or erroring.

mod topic;

pub use topic::{Subscription, Topic};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The closed set of event payloads carried on the bus.
#[derive(Debug, Clone)]
pub enum Event {
    Session(SessionEvent),
    Message(MessageEvent),
    FileHistory(FileHistoryEvent),
    Permission(PermissionEvent),
    Lsp(LspEvent),
    Mcp(McpEvent),
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Created { session_id: String },
    Updated { session_id: String },
    Deleted { session_id: String },
}

#[derive(Debug, Clone)]
pub enum MessageEvent {
    Created { session_id: String, message_id: String },
    Updated { session_id: String, message_id: String },
    Deleted { session_id: String, message_id: String },
}

#[derive(Debug, Clone)]
pub enum FileHistoryEvent {
    Created { session_id: String, path: String, version: i64 },
    Updated { session_id: String, path: String },
}

#[derive(Debug, Clone)]
pub enum PermissionEvent {
    Requested { request_id: String, session_id: String },
    Resolved { request_id: String, allowed: bool },
}

#[derive(Debug, Clone)]
pub enum LspEvent {
    StateChanged { language: String, state: String },
}

#[derive(Debug, Clone)]
pub enum McpEvent {
    StateChanged { client: String, state: String },
    ToolsListChanged { client: String },
    PromptsListChanged { client: String },
    ResourcesListChanged { client: String },
}

impl Event {
    /// The topic this event belongs to. Ordering is only guaranteed within a
    /// topic per subscriber; there is no cross-topic ordering guarantee.
    pub fn topic(&self) -> Topic {
        match self {
            Event::Session(_) => Topic::Session,
            Event::Message(_) => Topic::Message,
            Event::FileHistory(_) => Topic::FileHistory,
            Event::Permission(_) => Topic::Permission,
            Event::Lsp(_) => Topic::Lsp,
            Event::Mcp(_) => Topic::Mcp,
        }
    }
}

/// Process-wide publish/subscribe bus.
///
/// Cloning is cheap (it clones an `Arc`); every clone talks to the same set
/// of subscribers.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

struct Inner {
    registries: [topic::TopicRegistry; Topic::COUNT],
    drops: AtomicU64,
}

/// Default depth of a subscriber's ring buffer before oldest-event drop
/// kicks in. Chosen generously: UI subscribers drain on every tick, so this
/// is a cushion against bursty publishers (e.g. LLM streaming deltas), not a
/// steady-state bound.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                registries: std::array::from_fn(|_| topic::TopicRegistry::new(DEFAULT_SUBSCRIBER_CAPACITY)),
                drops: AtomicU64::new(0),
            }),
        }
    }

    /// Publish an event. Never suspends: each subscriber's push is an
    /// `O(1)` buffer operation guarded by a short-lived lock.
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        let dropped = self.inner.registries[topic as usize].publish(event);
        if dropped {
            self.inner.drops.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(?topic, "event bus: dropped oldest undelivered event (subscriber full)");
        }
    }

    /// Subscribe to a single topic. The returned handle release its
    /// resources (deregisters from the registry) when dropped.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        self.inner.registries[topic as usize].subscribe()
    }

    /// Total number of events dropped across all subscribers since the bus
    /// was created. Observable for diagnostics; never fatal.
    pub fn dropped_count(&self) -> u64 {
        self.inner.drops.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(Topic::Session);
        bus.publish(Event::Session(SessionEvent::Created {
            session_id: "s1".into(),
        }));
        let ev = sub.recv().await.expect("bus open");
        assert!(matches!(ev, Event::Session(SessionEvent::Created { .. })));
    }

    #[tokio::test]
    async fn fifo_order_preserved_per_topic_per_subscriber() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(Topic::Message);
        for i in 0..5 {
            bus.publish(Event::Message(MessageEvent::Created {
                session_id: "s".into(),
                message_id: i.to_string(),
            }));
        }
        for i in 0..5 {
            let ev = sub.recv().await.unwrap();
            match ev {
                Event::Message(MessageEvent::Created { message_id, .. }) => {
                    assert_eq!(message_id, i.to_string());
                }
                _ => panic!("unexpected event"),
            }
        }
    }

    #[tokio::test]
    async fn subscriber_does_not_see_other_topics() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(Topic::Session);
        bus.publish(Event::Lsp(LspEvent::StateChanged {
            language: "rust".into(),
            state: "Ready".into(),
        }));
        bus.publish(Event::Session(SessionEvent::Created { session_id: "s1".into() }));
        let ev = sub.recv().await.unwrap();
        assert!(matches!(ev, Event::Session(_)));
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_increments_counter() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(Topic::Session);
        for i in 0..(DEFAULT_SUBSCRIBER_CAPACITY + 10) {
            bus.publish(Event::Session(SessionEvent::Updated {
                session_id: i.to_string(),
            }));
        }
        assert!(bus.dropped_count() >= 10);
        // The oldest entries were dropped, so the first delivered event
        // should not be session id "0".
        let ev = sub.recv().await.unwrap();
        match ev {
            Event::Session(SessionEvent::Updated { session_id }) => assert_ne!(session_id, "0"),
            _ => panic!("unexpected"),
        }
    }

    #[tokio::test]
    async fn closing_subscription_releases_resources() {
        let bus = EventBus::new();
        let sub = bus.subscribe(Topic::Session);
        assert_eq!(bus.inner.registries[Topic::Session as usize].subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.inner.registries[Topic::Session as usize].subscriber_count(), 0);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_all_events() {
        let bus = EventBus::new();
        let mut a = bus.subscribe(Topic::Permission);
        let mut b = bus.subscribe(Topic::Permission);
        bus.publish(Event::Permission(PermissionEvent::Requested {
            request_id: "r1".into(),
            session_id: "s1".into(),
        }));
        assert!(a.recv().await.is_some());
        assert!(b.recv().await.is_some());
    }

    #[tokio::test]
    async fn publish_is_non_suspending_with_no_subscribers() {
        let bus = EventBus::new();
        // Must not hang or panic.
        bus.publish(Event::Mcp(McpEvent::StateChanged {
            client: "c".into(),
            state: "Connected".into(),
        }));
    }
}
