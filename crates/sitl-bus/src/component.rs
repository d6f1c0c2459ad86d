//! Compile-time component wiring: capability declaration and subscription
//! binding.
//!
//! A component declares its message sets once with [`capabilities!`]; the
//! macro generates the capability metadata, the marker impls that gate typed
//! publishing, and a [`Component::bind_subscriptions`] that registers one
//! validating thunk per declared subscription. Components therefore never
//! hand-write subscription boilerplate, and a declared subscription without
//! a matching [`Handle`] impl fails to compile.

use std::sync::Arc;

use sitl_core::capability::Capabilities;

use crate::bus::MessageBus;

/// Per-message handler. A component implements `Handle<M>` for every
/// message type in its subscribe sets.
pub trait Handle<M> {
    fn handle(&self, msg: &M);
}

/// A bus participant with generated subscription wiring.
///
/// Handlers registered by `bind_subscriptions` hold a `Weak` reference to
/// the component, so the bus never keeps a component alive by itself.
pub trait Component: Capabilities + Send + Sync + Sized + 'static {
    /// Register a handler thunk for every declared subscription.
    /// Call once per component instance, during the registration phase.
    fn bind_subscriptions(this: &Arc<Self>, bus: &MessageBus);
}

/// Declare a component's capability sets.
///
/// ```ignore
/// capabilities! {
///     MotorService {
///         publishes: [],
///         subscribes: [MotorSequencePayload, PhysicsTickPayload],
///         publishes_local: [MotorStatusPayload],
///         subscribes_local: [],
///     }
/// }
/// ```
///
/// Wire entries must implement `Message` and local entries `LocalMessage`;
/// listing a local-only payload in a wire set is a type error.
#[macro_export]
macro_rules! capabilities {
    (
        $component:ty {
            publishes: [ $( $pub_ty:ty ),* $(,)? ],
            subscribes: [ $( $sub_ty:ty ),* $(,)? ],
            publishes_local: [ $( $lpub_ty:ty ),* $(,)? ],
            subscribes_local: [ $( $lsub_ty:ty ),* $(,)? ] $(,)?
        }
    ) => {
        impl $crate::__private::Capabilities for $component {
            const PUBLISHES: &'static [$crate::__private::MsgId] = &[
                $( <$pub_ty as $crate::__private::Message>::ID, )*
            ];
            const SUBSCRIBES: &'static [$crate::__private::MsgId] = &[
                $( <$sub_ty as $crate::__private::Message>::ID, )*
            ];
            const PUBLISHES_LOCAL: &'static [$crate::__private::MsgId] = &[
                $( <$lpub_ty as $crate::__private::LocalMessage>::ID, )*
            ];
            const SUBSCRIBES_LOCAL: &'static [$crate::__private::MsgId] = &[
                $( <$lsub_ty as $crate::__private::LocalMessage>::ID, )*
            ];
        }

        $( impl $crate::__private::Publishes<$pub_ty> for $component {} )*
        $( impl $crate::__private::Subscribes<$sub_ty> for $component {} )*
        $( impl $crate::__private::PublishesLocal<$lpub_ty> for $component {} )*
        $( impl $crate::__private::SubscribesLocal<$lsub_ty> for $component {} )*

        impl $crate::Component for $component {
            #[allow(unused_variables)]
            fn bind_subscriptions(this: &$crate::__private::Arc<Self>, bus: &$crate::MessageBus) {
                $(
                    {
                        let weak = $crate::__private::Arc::downgrade(this);
                        bus.subscribe_typed::<$sub_ty>(move |msg| {
                            if let Some(this) = weak.upgrade() {
                                <$component as $crate::Handle<$sub_ty>>::handle(&this, msg);
                            }
                        });
                    }
                )*
                $(
                    {
                        let weak = $crate::__private::Arc::downgrade(this);
                        bus.subscribe_local::<$lsub_ty>(move |msg| {
                            if let Some(this) = weak.upgrade() {
                                <$component as $crate::Handle<$lsub_ty>>::handle(&this, msg);
                            }
                        });
                    }
                )*
            }
        }
    };
}
