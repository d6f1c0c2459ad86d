//! Periodic status aggregation into in-band `Log` messages.
//!
//! Keeps a running shadow of the latest kinematics/power figures from the
//! tick stream and broadcasts one formatted line per period from its own
//! worker thread. The external driver receives these passively through the
//! bridge; process-side diagnostics go through `tracing` instead.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use sitl_bus::{capabilities, Component, Handle, MessageBus, TypedPublisher};
use sitl_core::messages::{LogPayload, MotorStatusPayload, PhysicsTickPayload, Severity};

use crate::{K_RPM_TO_AMPS, K_RPM_TO_MPS, R_INT_OHM, V_MAX, V_MIN};

pub struct LogService {
    bus: TypedPublisher<LogService>,
    period: Duration,
    inner: Mutex<Shadow>,
    running: AtomicBool,
    wait_mu: Mutex<()>,
    wait_cv: Condvar,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Shadow {
    active: bool,
    cmd_id: u32,
    speed_mps: f32,
    position_m: f32,
    current_a: f32,
    voltage_v: f32,
}

capabilities! {
    LogService {
        publishes: [LogPayload],
        subscribes: [PhysicsTickPayload],
        publishes_local: [],
        subscribes_local: [MotorStatusPayload],
    }
}

impl LogService {
    pub fn new(bus: Arc<MessageBus>, period: Duration) -> Arc<Self> {
        let svc = Arc::new(Self {
            bus: TypedPublisher::new(bus.clone()),
            period,
            inner: Mutex::new(Shadow {
                active: false,
                cmd_id: 0,
                speed_mps: 0.0,
                position_m: 0.0,
                current_a: 0.0,
                voltage_v: V_MAX,
            }),
            running: AtomicBool::new(false),
            wait_mu: Mutex::new(()),
            wait_cv: Condvar::new(),
            worker: Mutex::new(None),
        });
        LogService::bind_subscriptions(&svc, &bus);
        svc
    }

    pub fn start(this: &Arc<Self>) -> io::Result<()> {
        let mut slot = this.worker.lock();
        if slot.is_some() {
            return Ok(());
        }
        this.running.store(true, Ordering::Release);
        let svc = Arc::clone(this);
        *slot = Some(
            thread::Builder::new()
                .name("status-log".into())
                .spawn(move || svc.log_loop())?,
        );
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.wait_cv.notify_all();
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn log_loop(&self) {
        while self.running.load(Ordering::Acquire) {
            {
                let mut guard = self.wait_mu.lock();
                if self.running.load(Ordering::Acquire) {
                    let _ = self.wait_cv.wait_for(&mut guard, self.period);
                }
            }
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            let line = self.compose_status();
            self.bus
                .publish(&LogPayload::new(Severity::Info, "sim", &line));
        }
    }

    fn compose_status(&self) -> String {
        let inner = self.inner.lock();
        let state = if inner.active { "Executing" } else { "Ready" };
        format!(
            "[sim] state={} cmd={} pos={:.3}m v={:.2}V i={:.3}A",
            state, inner.cmd_id, inner.position_m, inner.voltage_v, inner.current_a
        )
    }
}

impl Handle<PhysicsTickPayload> for LogService {
    fn handle(&self, tick: &PhysicsTickPayload) {
        let speed_rpm = tick.speed_rpm;
        let dt_s = tick.dt_us as f32 / 1e6;

        let mut inner = self.inner.lock();
        inner.speed_mps = speed_rpm as f32 * K_RPM_TO_MPS;
        inner.position_m += inner.speed_mps * dt_s;
        inner.current_a = (speed_rpm as f32).abs() * K_RPM_TO_AMPS;
        let dv = inner.current_a * R_INT_OHM * dt_s;
        inner.voltage_v = (inner.voltage_v - dv).max(V_MIN);
    }
}

impl Handle<MotorStatusPayload> for LogService {
    fn handle(&self, status: &MotorStatusPayload) {
        let mut inner = self.inner.lock();
        inner.cmd_id = status.cmd_id;
        inner.active = status.active;
        if !status.active {
            inner.speed_mps = 0.0;
            inner.current_a = 0.0;
        }
    }
}
