//! End-to-end service flows on the bus, driven deterministically with
//! manual ticks where possible and with the real clock thread once.

use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use sitl_bus::MessageBus;
use sitl_core::messages::{
    EnvQueryPayload, KinematicsPayload, KinematicsRequestPayload, PowerPayload,
    PowerRequestPayload, StatePayload, StateRequestPayload, SystemState, ThermalPayload,
    ThermalRequestPayload,
};
use sitl_services::{
    EnvironmentService, KinematicsService, MotorService, PowerService, StateService,
    ThermalService, V_MAX,
};

use crate::{driver, motor_sequence, tick};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

#[test]
fn motor_kinematics_power_flow_with_manual_ticks() {
    let bus = Arc::new(MessageBus::new());
    let _motor = MotorService::new(bus.clone());
    let _kinematics = KinematicsService::new(bus.clone());
    let _power = PowerService::new(bus.clone());
    let _thermal = ThermalService::new(bus.clone());

    let (kin_tx, kin_rx) = mpsc::channel();
    bus.subscribe_typed::<KinematicsPayload>(move |k| {
        let _ = kin_tx.send(*k);
    });
    let (pow_tx, pow_rx) = mpsc::channel();
    bus.subscribe_typed::<PowerPayload>(move |p| {
        let _ = pow_tx.send(*p);
    });
    let (thermal_tx, thermal_rx) = mpsc::channel();
    bus.subscribe_typed::<ThermalPayload>(move |t| {
        let _ = thermal_tx.send(*t);
    });

    let publisher = driver(&bus);
    publisher.publish(&motor_sequence(1, &[(1500, 500_000)]));

    // Half a second of 10 ms ticks at the commanded speed.
    for _ in 0..50 {
        publisher.publish(&tick(1, 1500, 10_000));
    }

    publisher.publish(&KinematicsRequestPayload { reserved: 0 });
    let kin = kin_rx.recv_timeout(RECV_TIMEOUT).unwrap();
    let cmd_id = kin.cmd_id;
    let position_m = kin.position_m;
    let elapsed_us = kin.elapsed_us;
    assert_eq!(cmd_id, 1);
    assert_eq!(elapsed_us, 500_000);
    // 1500 RPM → 15 m/s for 0.5 s.
    assert!((position_m - 7.5).abs() < 1e-3);

    publisher.publish(&PowerRequestPayload { reserved: 0 });
    let power = pow_rx.recv_timeout(RECV_TIMEOUT).unwrap();
    let current_a = power.current_a;
    let voltage_v = power.voltage_v;
    // 1500 RPM → 7.5 A; 7.5 A × 0.5 Ω × 0.5 s = 1.875 V drained.
    assert!((current_a - 7.5).abs() < 1e-6);
    assert!((voltage_v - (V_MAX - 1.875)).abs() < 1e-3);

    publisher.publish(&ThermalRequestPayload { reserved: 0 });
    let thermal = thermal_rx.recv_timeout(RECV_TIMEOUT).unwrap();
    let motor_temp = thermal.motor_temp_c;
    assert!(motor_temp > 25.0);
}

#[test]
fn motor_completion_flips_state_back_to_ready() {
    let bus = Arc::new(MessageBus::new());
    let _motor = MotorService::new(bus.clone());
    let state = StateService::new(bus.clone(), 10_000);

    let publisher = driver(&bus);
    publisher.publish(&motor_sequence(2, &[(800, 20_000)]));
    assert_eq!(state.current_state(), SystemState::Executing);

    publisher.publish(&tick(2, 800, 10_000));
    assert_eq!(state.current_state(), SystemState::Executing);
    publisher.publish(&tick(2, 800, 10_000));
    assert_eq!(state.current_state(), SystemState::Ready);
}

/// The full feedback loop with the real clock: clock → motor → status →
/// state → clock, observed through kinematics snapshots.
#[test]
fn clocked_sequence_integrates_position() {
    let bus = Arc::new(MessageBus::new());
    let _motor = MotorService::new(bus.clone());
    let _kinematics = KinematicsService::new(bus.clone());
    let state = StateService::new(bus.clone(), 1_000);

    let (kin_tx, kin_rx) = mpsc::channel();
    bus.subscribe_typed::<KinematicsPayload>(move |k| {
        let _ = kin_tx.send(*k);
    });
    let (state_tx, state_rx) = mpsc::channel();
    bus.subscribe_typed::<StatePayload>(move |s| {
        let _ = state_tx.send(s.state);
    });

    let publisher = driver(&bus);
    publisher.publish(&motor_sequence(3, &[(600, 200_000)]));
    StateService::start(&state).unwrap();

    // Poll until the integrated position becomes visible.
    let deadline = Instant::now() + RECV_TIMEOUT;
    let mut position = 0.0f32;
    while position <= 0.0 {
        assert!(Instant::now() < deadline, "position never advanced");
        std::thread::sleep(Duration::from_millis(20));
        publisher.publish(&KinematicsRequestPayload { reserved: 0 });
        let snap = kin_rx.recv_timeout(RECV_TIMEOUT).unwrap();
        position = snap.position_m;
    }

    // 600 RPM → 6 m/s; the 200 ms sequence can never move further than
    // 1.2 m no matter how long we polled.
    assert!(position <= 1.2 + 1e-3);

    // Once the sequence completes the state machine reports Ready again.
    let deadline = Instant::now() + RECV_TIMEOUT;
    loop {
        assert!(Instant::now() < deadline, "state never returned to Ready");
        publisher.publish(&StateRequestPayload { reserved: 0 });
        let raw = state_rx.recv_timeout(RECV_TIMEOUT).unwrap();
        if SystemState::try_from(raw) == Ok(SystemState::Ready) {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    state.stop();
}

#[test]
fn environment_query_round_trip_with_local_snapshot() {
    let bus = Arc::new(MessageBus::new());
    let _environment = EnvironmentService::new(bus.clone());

    let (ack_tx, ack_rx) = mpsc::channel();
    bus.subscribe_typed::<sitl_core::messages::EnvironmentAckPayload>(move |ack| {
        let region_id = ack.region_id;
        let _ = ack_tx.send(region_id);
    });
    let (snap_tx, snap_rx) = mpsc::channel();
    bus.subscribe_local::<sitl_core::messages::EnvSnapshotPayload>(move |snap| {
        let _ = snap_tx.send(Arc::clone(&snap.region));
    });

    let publisher = driver(&bus);
    let mut region = sitl_core::messages::EnvironmentPayload {
        region_id: 11,
        bounds: sitl_core::messages::Rect2 {
            min_pt: sitl_core::messages::Point2 { x: 0.0, y: 0.0 },
            max_pt: sitl_core::messages::Point2 { x: 50.0, y: 50.0 },
        },
        ambient_temp_c: 18.5,
        incline_percent: 0.0,
        surface_friction: 0.9,
        max_speed_rpm: 2000.0,
    };
    publisher.publish(&region);
    assert_eq!(ack_rx.recv_timeout(RECV_TIMEOUT).unwrap(), 11);

    publisher.publish_local(&EnvQueryPayload { x: 25.0, y: 25.0 });
    let snapshot = snap_rx.recv_timeout(RECV_TIMEOUT).unwrap();
    let region_id = snapshot.region_id;
    let ambient = snapshot.ambient_temp_c;
    assert_eq!(region_id, 11);
    assert!((ambient - 18.5).abs() < 1e-6);

    // Updating the region does not disturb the held snapshot.
    region.ambient_temp_c = 30.0;
    publisher.publish(&region);
    assert_eq!(ack_rx.recv_timeout(RECV_TIMEOUT).unwrap(), 11);
    let ambient_after = snapshot.ambient_temp_c;
    assert!((ambient_after - 18.5).abs() < 1e-6);
}
