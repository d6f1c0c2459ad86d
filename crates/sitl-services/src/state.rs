//! Lifecycle state machine and master simulation clock.
//!
//! Owns the thread that publishes the `PhysicsTick` heartbeat driving every
//! other simulation service. Tracks the coarse system state from local
//! `MotorStatus` updates and answers `StateRequest` snapshots.
//!
//! Starting the clock thread is the point at which the registration phase of
//! the whole harness must be over — the first tick dispatches through the
//! frozen handler table.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use sitl_bus::{capabilities, Component, Handle, MessageBus, TypedPublisher};
use sitl_core::messages::{
    MotorStatusPayload, PhysicsTickPayload, StatePayload, StateRequestPayload, SystemState,
};

/// State machine plus 100 Hz (configurable) clock source.
pub struct StateService {
    bus: TypedPublisher<StateService>,
    tick_interval_us: u32,
    inner: Mutex<MachineState>,
    running: AtomicBool,
    wait_mu: Mutex<()>,
    wait_cv: Condvar,
    clock_thread: Mutex<Option<JoinHandle<()>>>,
}

struct MachineState {
    state: SystemState,
    last_cmd_id: u32,
    last_rpm: i16,
}

capabilities! {
    StateService {
        publishes: [StatePayload, PhysicsTickPayload],
        subscribes: [StateRequestPayload],
        publishes_local: [],
        subscribes_local: [MotorStatusPayload],
    }
}

impl StateService {
    pub fn new(bus: Arc<MessageBus>, tick_interval_us: u32) -> Arc<Self> {
        let svc = Arc::new(Self {
            bus: TypedPublisher::new(bus.clone()),
            tick_interval_us,
            inner: Mutex::new(MachineState {
                state: SystemState::Ready,
                last_cmd_id: 0,
                last_rpm: 0,
            }),
            running: AtomicBool::new(false),
            wait_mu: Mutex::new(()),
            wait_cv: Condvar::new(),
            clock_thread: Mutex::new(None),
        });
        StateService::bind_subscriptions(&svc, &bus);
        svc
    }

    /// Spawn the clock thread. The thread keeps the service alive until
    /// [`StateService::stop`] is called.
    pub fn start(this: &Arc<Self>) -> io::Result<()> {
        let mut slot = this.clock_thread.lock();
        if slot.is_some() {
            return Ok(());
        }
        this.running.store(true, Ordering::Release);
        let svc = Arc::clone(this);
        *slot = Some(
            thread::Builder::new()
                .name("sim-clock".into())
                .spawn(move || svc.clock_loop())?,
        );
        Ok(())
    }

    /// Stop and join the clock thread. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.wait_cv.notify_all();
        let handle = self.clock_thread.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    pub fn current_state(&self) -> SystemState {
        self.inner.lock().state
    }

    fn clock_loop(&self) {
        let period = Duration::from_micros(self.tick_interval_us as u64);
        while self.running.load(Ordering::Acquire) {
            let started = Instant::now();

            let (cmd_id, speed_rpm) = {
                let inner = self.inner.lock();
                // Report RPM only while executing; idle listeners integrate
                // zeroes.
                let rpm = if inner.state == SystemState::Executing {
                    inner.last_rpm
                } else {
                    0
                };
                (inner.last_cmd_id, rpm)
            };
            self.bus.publish(&PhysicsTickPayload {
                cmd_id,
                speed_rpm,
                dt_us: self.tick_interval_us,
            });

            let elapsed = started.elapsed();
            if elapsed < period {
                let mut guard = self.wait_mu.lock();
                if self.running.load(Ordering::Acquire) {
                    let _ = self.wait_cv.wait_for(&mut guard, period - elapsed);
                }
            }
        }
    }
}

impl Handle<StateRequestPayload> for StateService {
    fn handle(&self, _req: &StateRequestPayload) {
        let state = self.inner.lock().state;
        self.bus.publish(&StatePayload::new(state));
    }
}

impl Handle<MotorStatusPayload> for StateService {
    fn handle(&self, status: &MotorStatusPayload) {
        let mut inner = self.inner.lock();
        inner.last_cmd_id = status.cmd_id;
        inner.last_rpm = status.speed_rpm;

        let next = if status.active {
            SystemState::Executing
        } else {
            SystemState::Ready
        };
        if next != inner.state {
            inner.state = next;
            tracing::info!(state = ?next, cmd_id = status.cmd_id, "state transition");
        }
    }
}
