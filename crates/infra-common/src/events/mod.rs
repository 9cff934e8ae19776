/*!
Event System

Typed, synchronous publish/subscribe used by the phonekit crates to expose
state changes to the rendering layer. It includes:

- A generic [`EventBus`] over a closed event enum
- Dot-namespaced topics with prefix subscriptions
- An [`EventRecorder`] for tests and polling consumers
*/

pub mod bus;
pub mod types;

pub use bus::{EventBus, EventRecorder};
pub use types::{Event, EventFilter, EventPriority, Handler, SubscriptionId, Topic, topic_matches};
