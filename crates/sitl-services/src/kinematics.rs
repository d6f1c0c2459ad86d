//! Position/speed integration over the physics tick stream.

use std::sync::Arc;

use parking_lot::Mutex;

use sitl_bus::{capabilities, Component, Handle, MessageBus, TypedPublisher};
use sitl_core::messages::{KinematicsPayload, KinematicsRequestPayload, PhysicsTickPayload};

use crate::K_RPM_TO_MPS;

/// Integrates commanded speed into position; answers snapshot requests.
pub struct KinematicsService {
    bus: TypedPublisher<KinematicsService>,
    inner: Mutex<KinState>,
}

struct KinState {
    cmd_id: u32,
    elapsed_us: u32,
    position_m: f32,
    speed_mps: f32,
}

capabilities! {
    KinematicsService {
        publishes: [KinematicsPayload],
        subscribes: [PhysicsTickPayload, KinematicsRequestPayload],
        publishes_local: [],
        subscribes_local: [],
    }
}

impl KinematicsService {
    pub fn new(bus: Arc<MessageBus>) -> Arc<Self> {
        let svc = Arc::new(Self {
            bus: TypedPublisher::new(bus.clone()),
            inner: Mutex::new(KinState {
                cmd_id: 0,
                elapsed_us: 0,
                position_m: 0.0,
                speed_mps: 0.0,
            }),
        });
        KinematicsService::bind_subscriptions(&svc, &bus);
        svc
    }
}

impl Handle<PhysicsTickPayload> for KinematicsService {
    fn handle(&self, tick: &PhysicsTickPayload) {
        let cmd_id = tick.cmd_id;
        let speed_rpm = tick.speed_rpm;
        let dt_us = tick.dt_us;
        let dt_s = dt_us as f32 / 1e6;

        let mut inner = self.inner.lock();
        if cmd_id != inner.cmd_id {
            // Elapsed time is per-command; position persists across commands.
            inner.cmd_id = cmd_id;
            inner.elapsed_us = 0;
        }
        inner.speed_mps = speed_rpm as f32 * K_RPM_TO_MPS;
        inner.position_m += inner.speed_mps * dt_s;
        inner.elapsed_us = inner.elapsed_us.saturating_add(dt_us);
    }
}

impl Handle<KinematicsRequestPayload> for KinematicsService {
    fn handle(&self, _req: &KinematicsRequestPayload) {
        let snapshot = {
            let inner = self.inner.lock();
            KinematicsPayload {
                cmd_id: inner.cmd_id,
                elapsed_us: inner.elapsed_us,
                position_m: inner.position_m,
                speed_mps: inner.speed_mps,
            }
        };
        self.bus.publish(&snapshot);
    }
}
