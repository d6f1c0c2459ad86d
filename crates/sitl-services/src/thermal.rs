//! First-order motor/battery temperature model.
//!
//! Heating is proportional to I², cooling to the distance from ambient,
//! integrated per physics tick.

use std::sync::Arc;

use parking_lot::Mutex;

use sitl_bus::{capabilities, Component, Handle, MessageBus, TypedPublisher};
use sitl_core::messages::{PhysicsTickPayload, ThermalPayload, ThermalRequestPayload};

use crate::{AMBIENT_C, K_RPM_TO_AMPS};

/// Motor winding heat coefficient, °C per A²·s.
const K_MOTOR_HEAT: f32 = 0.2;
/// Battery heat coefficient, °C per A²·s.
const K_BATTERY_HEAT: f32 = 0.05;
/// Fractional cooling toward ambient, per second.
const K_COOLING: f32 = 0.1;

pub struct ThermalService {
    bus: TypedPublisher<ThermalService>,
    inner: Mutex<ThermalState>,
}

struct ThermalState {
    motor_temp_c: f32,
    battery_temp_c: f32,
}

capabilities! {
    ThermalService {
        publishes: [ThermalPayload],
        subscribes: [PhysicsTickPayload, ThermalRequestPayload],
        publishes_local: [],
        subscribes_local: [],
    }
}

impl ThermalService {
    pub fn new(bus: Arc<MessageBus>) -> Arc<Self> {
        let svc = Arc::new(Self {
            bus: TypedPublisher::new(bus.clone()),
            inner: Mutex::new(ThermalState {
                motor_temp_c: AMBIENT_C,
                battery_temp_c: AMBIENT_C,
            }),
        });
        ThermalService::bind_subscriptions(&svc, &bus);
        svc
    }
}

impl Handle<PhysicsTickPayload> for ThermalService {
    fn handle(&self, tick: &PhysicsTickPayload) {
        let speed_rpm = tick.speed_rpm;
        let dt_s = tick.dt_us as f32 / 1e6;
        let current_a = (speed_rpm as f32).abs() * K_RPM_TO_AMPS;
        let i_sq = current_a * current_a;

        let mut inner = self.inner.lock();
        inner.motor_temp_c +=
            (K_MOTOR_HEAT * i_sq - K_COOLING * (inner.motor_temp_c - AMBIENT_C)) * dt_s;
        inner.battery_temp_c +=
            (K_BATTERY_HEAT * i_sq - K_COOLING * (inner.battery_temp_c - AMBIENT_C)) * dt_s;
    }
}

impl Handle<ThermalRequestPayload> for ThermalService {
    fn handle(&self, _req: &ThermalRequestPayload) {
        let snapshot = {
            let inner = self.inner.lock();
            ThermalPayload {
                motor_temp_c: inner.motor_temp_c,
                battery_temp_c: inner.battery_temp_c,
            }
        };
        self.bus.publish(&snapshot);
    }
}
