//! Pure in-process pub/sub message dispatcher.
//!
//! `subscribe` appends a handler to the per-id list; `publish` delivers a
//! payload to every handler of that id, in registration order, synchronously
//! on the calling thread. Nothing is queued: a slow handler stalls every
//! consumer reachable from the publishing thread.
//!
//! Subscriptions belong to the initialization phase. Once the first
//! publishing thread has been started the handler table is treated as
//! frozen; the thread start is the memory barrier that makes it visible.
//! The lock below exists to make the registration phase itself safe — on
//! the dispatch path it is held only long enough to clone the handler list,
//! never across a handler invocation, so handlers are free to publish
//! further messages.
//!
//! Wire messages dispatch as raw bytes (the payload's exact wire image);
//! local-only messages dispatch through a separate table as `&dyn Any` and
//! never produce bytes at all.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use zerocopy::{AsBytes, FromBytes};

use sitl_core::messages::{LocalMessage, Message, MsgId};

type RawHandler = Arc<dyn Fn(MsgId, &[u8]) + Send + Sync>;
type LocalHandler = Arc<dyn Fn(&(dyn Any + Send + Sync)) + Send + Sync>;

/// The shared dispatcher. Cheap to share via `Arc`; all registration and
/// dispatch goes through the two handler tables.
pub struct MessageBus {
    wire: Mutex<HashMap<u16, Vec<RawHandler>>>,
    local: Mutex<HashMap<u16, Vec<LocalHandler>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            wire: Mutex::new(HashMap::new()),
            local: Mutex::new(HashMap::new()),
        }
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Register a raw handler for `id`. Handlers fire in registration order;
    /// duplicate registrations are delivered duplicate times.
    pub fn subscribe(&self, id: MsgId, handler: impl Fn(MsgId, &[u8]) + Send + Sync + 'static) {
        self.wire
            .lock()
            .entry(id as u16)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Register a typed handler for `M`. The thunk validates the payload
    /// size (discarding on mismatch, the same policy as the network
    /// boundary), copies the bytes into a typed payload, and invokes
    /// `handler`.
    pub fn subscribe_typed<M: Message>(&self, handler: impl Fn(&M) + Send + Sync + 'static) {
        self.subscribe(M::ID, move |_, bytes| match M::read_from(bytes) {
            Some(msg) => handler(&msg),
            None => tracing::trace!(
                message = M::NAME,
                len = bytes.len(),
                expected = M::WIRE_SIZE,
                "payload size mismatch, discarding"
            ),
        });
    }

    /// Register a handler for a local-only message.
    pub fn subscribe_local<M: LocalMessage>(&self, handler: impl Fn(&M) + Send + Sync + 'static) {
        self.local
            .lock()
            .entry(M::ID as u16)
            .or_default()
            .push(Arc::new(move |any| {
                if let Some(msg) = any.downcast_ref::<M>() {
                    handler(msg);
                }
            }));
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    /// Publish a typed wire message. Serializes to its wire image and
    /// dispatches to every handler registered for its id.
    pub fn publish<M: Message>(&self, msg: &M) {
        self.publish_raw(M::ID, msg.as_bytes());
    }

    /// Publish raw payload bytes under `id`.
    ///
    /// This is the unchecked entry point used by `TypedPublisher` after
    /// authorization; components go through the publisher, which adds the
    /// capability and size checks.
    pub fn publish_raw(&self, id: MsgId, payload: &[u8]) {
        let handlers = {
            let table = self.wire.lock();
            match table.get(&(id as u16)) {
                Some(list) => list.clone(),
                None => {
                    tracing::trace!(message = id.name(), "publish with no subscribers");
                    return;
                }
            }
        };
        for handler in &handlers {
            handler(id, payload);
        }
    }

    /// Publish a local-only message to its local handler list.
    pub fn publish_local<M: LocalMessage>(&self, msg: &M) {
        let handlers = {
            let table = self.local.lock();
            match table.get(&(M::ID as u16)) {
                Some(list) => list.clone(),
                None => return,
            }
        };
        for handler in &handlers {
            handler(msg);
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}
