//! Synchronous, typed publish/subscribe bus
//!
//! Delivery happens on the publishing thread, in registration order, with no
//! buffering or replay: a subscriber only sees events published after it
//! subscribed. The subscriber list is snapshotted before delivery, so handlers
//! may subscribe, unsubscribe, or publish again without deadlocking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::types::{Event, EventFilter, Handler, SubscriptionId, topic_matches};

struct Subscription<E> {
    id: SubscriptionId,
    filter: Option<EventFilter<E>>,
    handler: Handler<E>,
}

impl<E> Clone for Subscription<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            filter: self.filter.clone(),
            handler: self.handler.clone(),
        }
    }
}

/// Typed event bus
pub struct EventBus<E: Event> {
    subscribers: RwLock<Vec<Subscription<E>>>,
    next_id: AtomicU64,
}

impl<E: Event> EventBus<E> {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to every event on this bus
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.insert(None, Arc::new(handler))
    }

    /// Subscribe to events whose topic is `prefix` or nested below it
    pub fn subscribe_topic<F>(&self, prefix: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let prefix = prefix.into();
        let filter: EventFilter<E> = Arc::new(move |event: &E| topic_matches(&prefix, event.topic()));
        self.insert(Some(filter), Arc::new(handler))
    }

    /// Subscribe with an arbitrary predicate
    pub fn subscribe_filtered<P, F>(&self, predicate: P, handler: F) -> SubscriptionId
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.insert(Some(Arc::new(predicate)), Arc::new(handler))
    }

    /// Remove a subscription. Returns false if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        before != subscribers.len()
    }

    /// Deliver `event` to every matching subscriber and return how many saw it
    pub fn publish(&self, event: &E) -> usize {
        let snapshot: Vec<Subscription<E>> = self.subscribers.read().clone();
        let mut delivered = 0;
        for subscription in &snapshot {
            if let Some(filter) = &subscription.filter {
                if !filter(event) {
                    continue;
                }
            }
            (subscription.handler)(event);
            delivered += 1;
        }
        trace!(topic = event.topic(), delivered, "event published");
        delivered
    }

    /// Publish a batch in order
    pub fn publish_all<I>(&self, events: I) -> usize
    where
        I: IntoIterator<Item = E>,
    {
        events.into_iter().map(|event| self.publish(&event)).sum()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    fn insert(&self, filter: Option<EventFilter<E>>, handler: Handler<E>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscription { id, filter, handler });
        id
    }
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Collects every event published on a bus, for assertions in tests and
/// for simple UI polling.
pub struct EventRecorder<E: Event> {
    events: Arc<Mutex<Vec<E>>>,
}

impl<E: Event> EventRecorder<E> {
    /// Attach a new recorder to `bus`
    pub fn attach(bus: &EventBus<E>) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe(move |event: &E| sink.lock().push(event.clone()));
        Self { events }
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<E> {
        self.events.lock().clone()
    }

    /// Topics of everything recorded so far, in order
    pub fn topics(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.topic()).collect()
    }

    /// How many recorded events carry `topic`
    pub fn count(&self, topic: &str) -> usize {
        self.events.lock().iter().filter(|e| e.topic() == topic).count()
    }

    /// Forget recorded events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::Topic;

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Promoted(u32),
        Demoted(u32),
        Volume(f32),
    }

    impl Event for TestEvent {
        fn topic(&self) -> Topic {
            match self {
                TestEvent::Promoted(_) => "call.primary.promoted",
                TestEvent::Demoted(_) => "call.primary.demoted",
                TestEvent::Volume(_) => "audioEngine.ringer.channel.volume",
            }
        }
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let bus = EventBus::<TestEvent>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            bus.subscribe(move |_| order.lock().push(tag));
        }

        assert_eq!(bus.publish(&TestEvent::Promoted(1)), 3);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_topic_subscription_filters() {
        let bus = EventBus::<TestEvent>::new();
        let calls = EventRecorder::attach(&bus);
        let audio = Arc::new(Mutex::new(Vec::new()));
        let sink = audio.clone();
        bus.subscribe_topic("audioEngine", move |e| sink.lock().push(e.clone()));

        bus.publish(&TestEvent::Promoted(1));
        bus.publish(&TestEvent::Volume(0.5));

        assert_eq!(calls.events().len(), 2);
        assert_eq!(*audio.lock(), vec![TestEvent::Volume(0.5)]);
    }

    #[test]
    fn test_no_replay_for_late_subscribers() {
        let bus = EventBus::<TestEvent>::new();
        bus.publish(&TestEvent::Promoted(1));

        let recorder = EventRecorder::attach(&bus);
        assert!(recorder.events().is_empty());

        bus.publish(&TestEvent::Demoted(1));
        assert_eq!(recorder.topics(), vec!["call.primary.demoted"]);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::<TestEvent>::new();
        let id = bus.subscribe(|_| {});
        assert_eq!(bus.subscriber_count(), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.publish(&TestEvent::Promoted(2)), 0);
    }

    #[test]
    fn test_reentrant_publish_does_not_deadlock() {
        let bus = Arc::new(EventBus::<TestEvent>::new());
        let recorder = EventRecorder::attach(&bus);
        let inner = bus.clone();
        bus.subscribe_filtered(
            |e| matches!(e, TestEvent::Promoted(_)),
            move |e| {
                if let TestEvent::Promoted(n) = e {
                    inner.publish(&TestEvent::Demoted(*n));
                }
            },
        );

        bus.publish(&TestEvent::Promoted(7));
        assert_eq!(
            recorder.events(),
            vec![TestEvent::Promoted(7), TestEvent::Demoted(7)]
        );
    }
}
