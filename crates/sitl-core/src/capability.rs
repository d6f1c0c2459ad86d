//! Per-component capability declarations.
//!
//! Each component declares, as compile-time metadata, the message set it may
//! emit and the set it may consume. The declaration exists in two mirrored
//! forms:
//!
//! * marker traits ([`Publishes`], [`Subscribes`], …) — checked by the
//!   compiler on every typed publish/subscribe, so an undeclared typed
//!   publish is a build error;
//! * `&'static [MsgId]` slices on [`Capabilities`] — scanned at runtime by
//!   the raw-publish authorization path, where only opaque bytes and a wire
//!   id are available.
//!
//! The wire markers bound their message parameter on [`Message`], so a
//! local-only payload (which only implements [`LocalMessage`]) cannot appear
//! in a wire capability list at all.
//!
//! Capability sets are ordered and duplicate-tolerant; duplicates are not
//! deduplicated anywhere downstream.

use crate::messages::{LocalMessage, Message, MsgId};

/// Compile-time capability metadata for one component.
///
/// Normally generated by the `capabilities!` macro in the bus crate; the
/// bridge implements it by hand because its outbound handlers are raw, not
/// typed.
pub trait Capabilities {
    /// Wire messages this component may emit.
    const PUBLISHES: &'static [MsgId];
    /// Wire messages this component consumes.
    const SUBSCRIBES: &'static [MsgId];
    /// Local-only messages this component may emit.
    const PUBLISHES_LOCAL: &'static [MsgId] = &[];
    /// Local-only messages this component consumes.
    const SUBSCRIBES_LOCAL: &'static [MsgId] = &[];
}

/// Marker: component `Self` declared wire message `M` in its publish set.
pub trait Publishes<M: Message>: Capabilities {}

/// Marker: component `Self` declared wire message `M` in its subscribe set.
pub trait Subscribes<M: Message>: Capabilities {}

/// Marker: component `Self` declared local message `M` in its publish set.
pub trait PublishesLocal<M: LocalMessage>: Capabilities {}

/// Marker: component `Self` declared local message `M` in its subscribe set.
pub trait SubscribesLocal<M: LocalMessage>: Capabilities {}
