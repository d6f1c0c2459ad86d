//! sitl-bridge — UDP relay between the in-process bus and one external
//! test driver.

pub mod bridge;
pub mod peer;
pub mod wake;

pub use bridge::{BridgeError, UdpBridge};
pub use peer::PeerCell;
