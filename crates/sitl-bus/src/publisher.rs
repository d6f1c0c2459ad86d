//! Per-component publishing handle enforcing declared capabilities.
//!
//! `TypedPublisher<C>` is the sole boundary between "opaque external bytes"
//! and "typed internal message": typed publishes are checked against `C`'s
//! declared sets at compile time, raw publishes at runtime.

use std::marker::PhantomData;
use std::sync::Arc;

use sitl_core::capability::{Capabilities, Publishes, PublishesLocal};
use sitl_core::messages::{LocalMessage, Message};

use crate::bus::MessageBus;

/// A wrapper around the bus that enforces `C`'s publish capabilities.
pub struct TypedPublisher<C: Capabilities> {
    bus: Arc<MessageBus>,
    _component: PhantomData<fn() -> C>,
}

impl<C: Capabilities> TypedPublisher<C> {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            bus,
            _component: PhantomData,
        }
    }

    /// Typed publish. Compiles only if `M` is in `C`'s declared publish set.
    pub fn publish<M: Message>(&self, msg: &M)
    where
        C: Publishes<M>,
    {
        self.bus.publish(msg);
    }

    /// Typed local publish. Compiles only if `M` is in `C`'s declared
    /// local publish set.
    pub fn publish_local<M: LocalMessage>(&self, msg: &M)
    where
        C: PublishesLocal<M>,
    {
        self.bus.publish_local(msg);
    }

    /// Runtime-checked publish for callers that have only bytes and a wire
    /// id (e.g. a network datagram).
    ///
    /// Scans `C`'s declared publish set for an id that matches `raw_id` AND
    /// whose registered payload size equals `payload.len()`. On the first
    /// match the bytes are dispatched and `true` is returned; otherwise
    /// nothing is dispatched and `false` is returned.
    pub fn publish_if_authorized(&self, raw_id: u16, payload: &[u8]) -> bool {
        for &id in C::PUBLISHES {
            if id as u16 == raw_id && id.wire_size() == Some(payload.len()) {
                self.bus.publish_raw(id, payload);
                return true;
            }
        }
        tracing::trace!(raw_id, len = payload.len(), "unauthorized raw publish dropped");
        false
    }

    /// Access the underlying bus for subscriptions.
    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }
}

impl<C: Capabilities> Clone for TypedPublisher<C> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            _component: PhantomData,
        }
    }
}
