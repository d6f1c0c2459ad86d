//! Battery model: internal-resistance drain driven by commanded speed.

use std::sync::Arc;

use parking_lot::Mutex;

use sitl_bus::{capabilities, Component, Handle, MessageBus, TypedPublisher};
use sitl_core::messages::{PhysicsTickPayload, PowerPayload, PowerRequestPayload};

use crate::{K_RPM_TO_AMPS, R_INT_OHM, V_MAX, V_MIN};

pub struct PowerService {
    bus: TypedPublisher<PowerService>,
    inner: Mutex<BatteryState>,
}

struct BatteryState {
    cmd_id: u32,
    voltage_v: f32,
    current_a: f32,
}

capabilities! {
    PowerService {
        publishes: [PowerPayload],
        subscribes: [PhysicsTickPayload, PowerRequestPayload],
        publishes_local: [],
        subscribes_local: [],
    }
}

impl PowerService {
    pub fn new(bus: Arc<MessageBus>) -> Arc<Self> {
        let svc = Arc::new(Self {
            bus: TypedPublisher::new(bus.clone()),
            inner: Mutex::new(BatteryState {
                cmd_id: 0,
                voltage_v: V_MAX,
                current_a: 0.0,
            }),
        });
        PowerService::bind_subscriptions(&svc, &bus);
        svc
    }
}

fn state_of_charge(voltage_v: f32) -> u8 {
    (((voltage_v - V_MIN) / (V_MAX - V_MIN) * 100.0).clamp(0.0, 100.0)) as u8
}

impl Handle<PhysicsTickPayload> for PowerService {
    fn handle(&self, tick: &PhysicsTickPayload) {
        let cmd_id = tick.cmd_id;
        let speed_rpm = tick.speed_rpm;
        let dt_s = tick.dt_us as f32 / 1e6;

        let mut inner = self.inner.lock();
        inner.cmd_id = cmd_id;
        inner.current_a = (speed_rpm as f32).abs() * K_RPM_TO_AMPS;
        let dv = inner.current_a * R_INT_OHM * dt_s;
        inner.voltage_v = (inner.voltage_v - dv).max(V_MIN);
    }
}

impl Handle<PowerRequestPayload> for PowerService {
    fn handle(&self, _req: &PowerRequestPayload) {
        let snapshot = {
            let inner = self.inner.lock();
            PowerPayload {
                cmd_id: inner.cmd_id,
                voltage_v: inner.voltage_v,
                current_a: inner.current_a,
                state_of_charge: state_of_charge(inner.voltage_v),
            }
        };
        self.bus.publish(&snapshot);
    }
}
