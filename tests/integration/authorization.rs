//! Authorization containment: the raw-publish path dispatches if and only
//! if both the id and the payload size match a declared publish entry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sitl_bus::MessageBus;
use sitl_core::messages::{Message, MsgId, StatePayload, SystemState};
use zerocopy::AsBytes;

use crate::{driver, motor_sequence};

fn counting(bus: &MessageBus, id: MsgId) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    bus.subscribe(id, move |_, _| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    count
}

#[test]
fn matching_id_and_size_dispatches_exactly_once() {
    let bus = Arc::new(MessageBus::new());
    let count = counting(&bus, MsgId::MotorSequence);
    let publisher = driver(&bus);

    let seq = motor_sequence(42, &[(100, 1_000)]);
    assert!(publisher.publish_if_authorized(MsgId::MotorSequence as u16, seq.as_bytes()));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn undeclared_id_never_dispatches() {
    let bus = Arc::new(MessageBus::new());
    // StateData is registered on the bus but absent from TestDriver's
    // publish set.
    let count = counting(&bus, MsgId::StateData);
    let publisher = driver(&bus);

    let payload = StatePayload::new(SystemState::Ready);
    assert!(!publisher.publish_if_authorized(MsgId::StateData as u16, payload.as_bytes()));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn size_mismatch_never_dispatches() {
    let bus = Arc::new(MessageBus::new());
    let count = counting(&bus, MsgId::MotorSequence);
    let publisher = driver(&bus);

    let too_short = [0u8; 10];
    let too_long = [0u8; 64];
    assert!(!publisher.publish_if_authorized(MsgId::MotorSequence as u16, &too_short));
    assert!(!publisher.publish_if_authorized(MsgId::MotorSequence as u16, &too_long));
    assert!(!publisher.publish_if_authorized(MsgId::MotorSequence as u16, &[]));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn unknown_wire_id_never_dispatches() {
    let bus = Arc::new(MessageBus::new());
    let counts = [
        counting(&bus, MsgId::MotorSequence),
        counting(&bus, MsgId::StateRequest),
        counting(&bus, MsgId::EnvironmentData),
    ];
    let publisher = driver(&bus);

    assert!(!publisher.publish_if_authorized(0x4242, &[0u8; 4]));
    for count in &counts {
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}

#[test]
fn rejected_bytes_do_not_poison_later_publishes() {
    let bus = Arc::new(MessageBus::new());
    let count = counting(&bus, MsgId::StateRequest);
    let publisher = driver(&bus);

    assert!(!publisher.publish_if_authorized(MsgId::StateRequest as u16, &[0u8; 9]));
    assert!(publisher.publish_if_authorized(
        MsgId::StateRequest as u16,
        &[0u8; sitl_core::messages::StateRequestPayload::WIRE_SIZE],
    ));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
