use std::fmt;
use std::sync::Arc;
use serde::{Serialize, Deserialize};

/// Dot-namespaced topic string, e.g. `call.primary.promoted`
pub type Topic = &'static str;

/// Priority levels for events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventPriority {
    /// Low priority events
    Low = 0,
    /// Default priority events
    Normal = 1,
    /// High priority events
    High = 2,
    /// Critical events that must be processed immediately
    Critical = 3,
}

impl Default for EventPriority {
    fn default() -> Self {
        EventPriority::Normal
    }
}

/// Common trait for all events carried by an [`EventBus`](super::EventBus)
///
/// Events are closed enums; the topic is derived from the variant so
/// subscribers can select by namespace without matching on the payload.
pub trait Event: Clone + Send + Sync + fmt::Debug + 'static {
    /// Return the dot-namespaced topic of this event
    fn topic(&self) -> Topic;

    /// Return the priority of this event
    fn priority(&self) -> EventPriority {
        EventPriority::Normal
    }
}

/// Identifier handed out by `subscribe*` and accepted by `unsubscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub(crate) u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Subscriber callback
pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync + 'static>;

/// Predicate function for filtering events
pub type EventFilter<E> = Arc<dyn Fn(&E) -> bool + Send + Sync + 'static>;

/// Returns true when `topic` is `prefix` itself or lives below it.
///
/// `call.primary` matches `call.primary.promoted` but not `call.primaryx`.
pub fn topic_matches(prefix: &str, topic: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match topic.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}
