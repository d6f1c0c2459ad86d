//! SIL harness integration test suite.
//!
//! Everything here runs in-process against real sockets on the loopback
//! interface; no external environment is required. Bridge tests bind port 0
//! and discover the actual port, so the suite is safe to run in parallel.

use std::sync::Arc;

use sitl_bus::{capabilities, MessageBus, TypedPublisher};
use sitl_core::messages::{
    EnvQueryPayload, EnvironmentPayload, KinematicsRequestPayload, MotorSequencePayload,
    MotorStep, PhysicsTickPayload, PowerRequestPayload, StateRequestPayload,
    ThermalRequestPayload,
};

mod authorization;
mod bus;
mod services;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Stand-in for the external test driver on the bus side: allowed to inject
/// exactly what the bridge may inject, plus the tick stream for tests that
/// drive physics manually instead of running the clock thread.
pub struct TestDriver;

capabilities! {
    TestDriver {
        publishes: [
            MotorSequencePayload,
            PhysicsTickPayload,
            StateRequestPayload,
            KinematicsRequestPayload,
            PowerRequestPayload,
            ThermalRequestPayload,
            EnvironmentPayload,
        ],
        subscribes: [],
        publishes_local: [EnvQueryPayload],
        subscribes_local: [],
    }
}

pub fn driver(bus: &Arc<MessageBus>) -> TypedPublisher<TestDriver> {
    TypedPublisher::new(bus.clone())
}

/// Build a motor sequence from `(speed_rpm, duration_us)` pairs.
pub fn motor_sequence(cmd_id: u32, steps: &[(i16, u32)]) -> MotorSequencePayload {
    let mut seq = MotorSequencePayload::empty();
    seq.cmd_id = cmd_id;
    seq.num_steps = steps.len() as u8;
    for (i, &(speed_rpm, duration_us)) in steps.iter().enumerate() {
        seq.steps[i] = MotorStep {
            speed_rpm,
            duration_us,
        };
    }
    seq
}

pub fn tick(cmd_id: u32, speed_rpm: i16, dt_us: u32) -> PhysicsTickPayload {
    PhysicsTickPayload {
        cmd_id,
        speed_rpm,
        dt_us,
    }
}
