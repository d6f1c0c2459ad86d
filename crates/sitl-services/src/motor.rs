//! Motor sequence execution.
//!
//! Steps through the timed sub-commands of a `MotorSequence`, consuming the
//! shared `PhysicsTick` heartbeat for timing rather than owning a thread. On
//! every step transition it publishes the local-only `MotorStatus` message
//! that drives the state machine and the status log. A new sequence preempts
//! any running one.

use std::sync::Arc;

use parking_lot::Mutex;

use sitl_bus::{capabilities, Component, Handle, MessageBus, TypedPublisher};
use sitl_core::messages::{
    MotorSequencePayload, MotorStatusPayload, PhysicsTickPayload, MAX_MOTOR_STEPS,
};

use crate::MAX_SPEED_RPM;

/// Executes timed motor commands in tick time.
pub struct MotorService {
    bus: TypedPublisher<MotorService>,
    inner: Mutex<MotorState>,
}

struct MotorState {
    cmd: MotorSequencePayload,
    step_idx: u8,
    step_remaining_us: u32,
    active: bool,
}

capabilities! {
    MotorService {
        publishes: [],
        subscribes: [MotorSequencePayload, PhysicsTickPayload],
        publishes_local: [MotorStatusPayload],
        subscribes_local: [],
    }
}

impl MotorService {
    pub fn new(bus: Arc<MessageBus>) -> Arc<Self> {
        let svc = Arc::new(Self {
            bus: TypedPublisher::new(bus.clone()),
            inner: Mutex::new(MotorState {
                cmd: MotorSequencePayload::empty(),
                step_idx: 0,
                step_remaining_us: 0,
                active: false,
            }),
        });
        MotorService::bind_subscriptions(&svc, &bus);
        svc
    }
}

impl Handle<MotorSequencePayload> for MotorService {
    fn handle(&self, cmd: &MotorSequencePayload) {
        let mut seq = *cmd;
        seq.num_steps = seq.num_steps.min(MAX_MOTOR_STEPS as u8);
        for i in 0..seq.num_steps as usize {
            let rpm = seq.steps[i].speed_rpm;
            seq.steps[i].speed_rpm = rpm.clamp(-MAX_SPEED_RPM, MAX_SPEED_RPM);
        }

        let cmd_id = seq.cmd_id;
        let num_steps = seq.num_steps;
        tracing::info!(cmd_id, num_steps, "motor sequence received");

        let status;
        {
            let mut inner = self.inner.lock();
            inner.cmd = seq;
            inner.step_idx = 0;

            let first_duration = if num_steps > 0 { seq.steps[0].duration_us } else { 0 };
            if first_duration > 0 {
                inner.active = true;
                inner.step_remaining_us = first_duration;
                let speed_rpm = seq.steps[0].speed_rpm;
                status = MotorStatusPayload {
                    cmd_id,
                    speed_rpm,
                    active: true,
                };
            } else {
                inner.active = false;
                inner.step_remaining_us = 0;
                status = MotorStatusPayload {
                    cmd_id,
                    speed_rpm: 0,
                    active: false,
                };
                tracing::info!(cmd_id, "motor sequence stopped immediately (zero duration or empty)");
            }
        }
        self.bus.publish_local(&status);
    }
}

impl Handle<PhysicsTickPayload> for MotorService {
    fn handle(&self, tick: &PhysicsTickPayload) {
        let tick_cmd_id = tick.cmd_id;
        let dt_us = tick.dt_us;

        let status;
        {
            let mut inner = self.inner.lock();
            let current_cmd_id = inner.cmd.cmd_id;
            if !inner.active || tick_cmd_id != current_cmd_id {
                return;
            }
            if dt_us < inner.step_remaining_us {
                inner.step_remaining_us -= dt_us;
                return;
            }
            status = advance_step(&mut inner);
        }
        self.bus.publish_local(&status);
    }
}

fn advance_step(inner: &mut MotorState) -> MotorStatusPayload {
    let cmd_id = inner.cmd.cmd_id;
    inner.step_idx += 1;
    if (inner.step_idx as usize) < inner.cmd.num_steps as usize {
        let step = inner.cmd.steps[inner.step_idx as usize];
        inner.step_remaining_us = step.duration_us;
        let speed_rpm = step.speed_rpm;
        tracing::debug!(cmd_id, step = inner.step_idx, speed_rpm, "advancing motor step");
        MotorStatusPayload {
            cmd_id,
            speed_rpm,
            active: true,
        }
    } else {
        inner.active = false;
        inner.step_remaining_us = 0;
        tracing::info!(cmd_id, "motor sequence complete");
        MotorStatusPayload {
            cmd_id,
            speed_rpm: 0,
            active: false,
        }
    }
}
