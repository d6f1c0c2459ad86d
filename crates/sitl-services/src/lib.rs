//! sitl-services — the simulation components wired onto the message bus.
//!
//! Each service is a thin closed-form numeric model. Physics constants are
//! deliberate round numbers so external assertions stay trivial:
//! 100 RPM → 1.0 m/s, 100 RPM → 0.5 A, ~0.25 V/s drain at 100 RPM.

pub mod environment;
pub mod kinematics;
pub mod log;
pub mod motor;
pub mod power;
pub mod state;
pub mod thermal;

pub use environment::EnvironmentService;
pub use kinematics::KinematicsService;
pub use log::LogService;
pub use motor::MotorService;
pub use power::PowerService;
pub use state::StateService;
pub use thermal::ThermalService;

/// Meters per second per RPM.
pub const K_RPM_TO_MPS: f32 = 0.01;
/// Amperes per RPM of commanded speed.
pub const K_RPM_TO_AMPS: f32 = 0.005;
/// Battery internal resistance, ohms.
pub const R_INT_OHM: f32 = 0.5;
/// Fully charged pack voltage.
pub const V_MAX: f32 = 12.6;
/// Depleted pack voltage.
pub const V_MIN: f32 = 10.5;
/// Commanded speeds are clamped to this magnitude.
pub const MAX_SPEED_RPM: i16 = 6000;
/// Ambient temperature for the thermal model, °C.
pub const AMBIENT_C: f32 = 25.0;
