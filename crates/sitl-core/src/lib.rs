//! sitl-core — message registry, capability declarations, wire framing, and
//! configuration. All other harness crates depend on this one.

pub mod capability;
pub mod config;
pub mod messages;
pub mod wire;

pub use capability::{Capabilities, Publishes, PublishesLocal, Subscribes, SubscribesLocal};
pub use messages::{LocalMessage, Message, MsgId, Severity, SystemState};
