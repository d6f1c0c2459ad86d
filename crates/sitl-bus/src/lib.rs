//! sitl-bus — in-process typed pub/sub dispatcher, capability-enforcing
//! publisher, and component subscription wiring.

pub mod bus;
pub mod component;
pub mod publisher;

pub use bus::MessageBus;
pub use component::{Component, Handle};
pub use publisher::TypedPublisher;

// Re-exports used by the `capabilities!` macro expansion.
#[doc(hidden)]
pub mod __private {
    pub use sitl_core::capability::{
        Capabilities, Publishes, PublishesLocal, Subscribes, SubscribesLocal,
    };
    pub use sitl_core::messages::{LocalMessage, Message, MsgId};
    pub use std::sync::Arc;
}
