//! sitld — SIL harness daemon.
//!
//! Threads:
//!   main        — heartbeat publisher; sleeps on a condvar between beats
//!   sim-clock   — inside StateService: periodic PhysicsTick heartbeat
//!   status-log  — inside LogService: periodic status line aggregation
//!   bridge-rx   — inside UdpBridge: UDP recv → authorized bus inject
//!
//! Construction is strictly two-phase: every component registers its
//! subscriptions first, then the publishing threads start. Teardown runs in
//! reverse: the bridge stops before the services it feeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::{Condvar, Mutex};

use sitl_bridge::UdpBridge;
use sitl_bus::{capabilities, MessageBus, TypedPublisher};
use sitl_core::config::SitlConfig;
use sitl_core::messages::{LogPayload, Severity};
use sitl_services::{
    EnvironmentService, KinematicsService, LogService, MotorService, PowerService, StateService,
    ThermalService,
};

/// The main thread's own bus identity: it only emits heartbeat log lines.
struct Heartbeat;

capabilities! {
    Heartbeat {
        publishes: [LogPayload],
        subscribes: [],
        publishes_local: [],
        subscribes_local: [],
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = SitlConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = SitlConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        SitlConfig::default()
    });

    let bus = Arc::new(MessageBus::new());

    // ── Registration phase ────────────────────────────────────────────────────
    let motor = MotorService::new(bus.clone());
    let state = StateService::new(bus.clone(), config.sim.tick_interval_us);
    let kinematics = KinematicsService::new(bus.clone());
    let power = PowerService::new(bus.clone());
    let thermal = ThermalService::new(bus.clone());
    let log = LogService::new(
        bus.clone(),
        Duration::from_millis(config.sim.status_log_period_ms),
    );
    let environment = EnvironmentService::new(bus.clone());
    let mut bridge = UdpBridge::new(bus.clone(), config.network.port)
        .context("failed to construct UDP bridge")?;

    // ── Publish phase — handler table is frozen from here on ──────────────────
    StateService::start(&state).context("failed to start sim clock")?;
    LogService::start(&log).context("failed to start status log worker")?;
    bridge.start().context("failed to start bridge rx thread")?;

    tracing::info!(
        port = config.network.port,
        tick_us = config.sim.tick_interval_us,
        "sitld started"
    );

    // ── Shutdown plumbing ─────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let beat = Arc::new((Mutex::new(()), Condvar::new()));
    {
        let running = running.clone();
        let beat = beat.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::Release);
            beat.1.notify_all();
        })
        .context("failed to install signal handler")?;
    }

    // ── Heartbeat loop on the main thread ─────────────────────────────────────
    let heartbeat = TypedPublisher::<Heartbeat>::new(bus.clone());
    let period = Duration::from_millis(config.sim.heartbeat_period_ms);
    let mut n: u32 = 0;
    while running.load(Ordering::Acquire) {
        {
            let mut guard = beat.0.lock();
            if running.load(Ordering::Acquire) {
                let _ = beat.1.wait_for(&mut guard, period);
            }
        }
        if !running.load(Ordering::Acquire) {
            break;
        }
        n += 1;
        heartbeat.publish(&LogPayload::new(
            Severity::Info,
            "main",
            &format!("[heartbeat] TICK {n}"),
        ));
    }

    tracing::info!("shutting down");

    // ── Teardown, reverse of construction ─────────────────────────────────────
    bridge.stop();
    log.stop();
    state.stop();
    drop((environment, thermal, power, kinematics, motor));

    Ok(())
}
