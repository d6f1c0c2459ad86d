//! Dispatcher properties: round trip, fan-out, ordering, isolation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sitl_bus::MessageBus;
use sitl_core::messages::{Message, MsgId, StatePayload, SystemState};
use zerocopy::AsBytes;

use crate::{driver, motor_sequence};

/// Publishing a payload delivers a byte-for-byte identical payload to a
/// subscribed handler.
#[test]
fn round_trip_preserves_every_field() {
    let bus = Arc::new(MessageBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe_typed::<sitl_core::messages::MotorSequencePayload>(move |seq| {
        sink.lock().unwrap().push(*seq);
    });

    let original = motor_sequence(1, &[(1500, 500_000)]);
    driver(&bus).publish(&original);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let got = seen[0];
    let cmd_id = got.cmd_id;
    let num_steps = got.num_steps;
    let step0 = got.steps[0];
    let speed_rpm = step0.speed_rpm;
    let duration_us = step0.duration_us;
    assert_eq!(cmd_id, 1);
    assert_eq!(num_steps, 1);
    assert_eq!(speed_rpm, 1500);
    assert_eq!(duration_us, 500_000);
    assert_eq!(got.as_bytes(), original.as_bytes());
}

/// N independent subscribers each see exactly one invocation per publish.
#[test]
fn fan_out_hits_every_subscriber_exactly_once() {
    let bus = Arc::new(MessageBus::new());
    let counters: Vec<Arc<AtomicUsize>> = (0..5).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    for counter in &counters {
        let counter = counter.clone();
        bus.subscribe(MsgId::StateData, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }

    bus.publish(&StatePayload::new(SystemState::Ready));
    for counter in &counters {
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    bus.publish(&StatePayload::new(SystemState::Executing));
    for counter in &counters {
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}

/// A subscriber registered for one id never fires for any other registered
/// id.
#[test]
fn no_cross_dispatch_for_any_registered_id() {
    let bus = Arc::new(MessageBus::new());
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    bus.subscribe(MsgId::MotorSequence, move |_, _| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    // Publish a correctly sized raw payload for every other wire id.
    let all_wire_ids = [
        MsgId::Log,
        MsgId::PhysicsTick,
        MsgId::StateRequest,
        MsgId::StateData,
        MsgId::KinematicsRequest,
        MsgId::KinematicsData,
        MsgId::PowerRequest,
        MsgId::PowerData,
        MsgId::ThermalRequest,
        MsgId::ThermalData,
        MsgId::EnvironmentAck,
        MsgId::EnvironmentRequest,
        MsgId::EnvironmentData,
    ];
    for id in all_wire_ids {
        let size = id.wire_size().unwrap();
        bus.publish_raw(id, &vec![0u8; size]);
    }
    assert_eq!(count.load(Ordering::SeqCst), 0);

    bus.publish(&motor_sequence(1, &[]));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// Handlers for one id run in registration order, and duplicate
/// registrations are delivered duplicate times.
#[test]
fn dispatch_order_and_duplicates() {
    let bus = Arc::new(MessageBus::new());
    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second", "second-again"] {
        let order = order.clone();
        bus.subscribe(MsgId::StateData, move |_, _| {
            order.lock().unwrap().push(tag);
        });
    }

    bus.publish(&StatePayload::new(SystemState::Ready));
    assert_eq!(
        order.lock().unwrap().as_slice(),
        &["first", "second", "second-again"]
    );
}

/// The registered wire name/size metadata is reachable from handler context.
#[test]
fn handlers_receive_the_published_id() {
    let bus = Arc::new(MessageBus::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(MsgId::StateData, move |id, payload| {
        sink.lock().unwrap().push((id, payload.len()));
    });

    bus.publish(&StatePayload::new(SystemState::Fault));
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[(MsgId::StateData, StatePayload::WIRE_SIZE)]
    );
}
