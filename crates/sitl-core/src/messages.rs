//! Message registry — every message id, payload layout, and display name.
//!
//! These types ARE the wire protocol. Every payload is `#[repr(C, packed)]`
//! with zerocopy derives, so its in-memory layout is exactly its wire layout:
//! no implicit padding, no variable-length fields, no owning pointers. A
//! payload whose received byte count differs from `size_of::<Payload>()` is
//! discarded by every decode path in the system.
//!
//! The [`messages!`] table at the bottom is the single source of truth. An id
//! that is not listed there has no `MsgId` variant and no [`Message`] impl —
//! using it is a build error, never a silent default.
//!
//! Messages come in two structurally distinct categories:
//!
//! * **Wire messages** implement [`Message`] (zerocopy-bounded) and may cross
//!   the UDP bridge.
//! * **Local messages** implement [`LocalMessage`] only. They may carry
//!   shared-ownership pointers (`Arc`) and can never be listed in a wire
//!   capability set: the wire paths are bounded on [`Message`], so the
//!   exclusion is enforced by the type system, not by convention.

use std::sync::Arc;

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Message traits ────────────────────────────────────────────────────────────

/// A fixed-size, trivially copyable payload registered under exactly one
/// [`MsgId`]. The zerocopy bounds guarantee allocation-free, padding-free
/// serialization in both directions.
pub trait Message: AsBytes + FromBytes + Clone + Send + Sync + Sized + 'static {
    /// The registered identifier for this payload type.
    const ID: MsgId;
    /// Human-readable name, used in logs and generated documentation.
    const NAME: &'static str;
    /// Exact number of bytes this payload occupies on the wire.
    const WIRE_SIZE: usize = std::mem::size_of::<Self>();
}

/// An in-process-only payload. No layout guarantees, no zerocopy bounds —
/// local messages may carry `Arc` references to long-lived records. They
/// dispatch through a separate handler table and never reach the bridge.
pub trait LocalMessage: Clone + Send + Sync + 'static {
    const ID: MsgId;
    const NAME: &'static str;
}

// ── Registry macro ────────────────────────────────────────────────────────────

/// Declares the closed message set: generates the [`MsgId`] enum, a
/// [`Message`] impl per wire payload, a [`LocalMessage`] impl per local
/// payload, and the runtime lookup functions used by the raw-publish
/// authorization path.
macro_rules! messages {
    (
        wire {
            $( $wvariant:ident = $wvalue:literal => $wpayload:ty, )+
        }
        local {
            $( $lvariant:ident = $lvalue:literal => $lpayload:ty, )+
        }
    ) => {
        /// Message type selector. The `u16` value of a wire variant is the
        /// first two bytes of every UDP datagram.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum MsgId {
            $( $wvariant = $wvalue, )+
            $( $lvariant = $lvalue, )+
        }

        impl MsgId {
            /// Decode a wire discriminant. Local-only ids are not
            /// constructible from the network and return `None` here.
            pub fn from_wire(raw: u16) -> Option<MsgId> {
                match raw {
                    $( $wvalue => Some(MsgId::$wvariant), )+
                    _ => None,
                }
            }

            /// Display name of the registered payload.
            pub fn name(self) -> &'static str {
                match self {
                    $( MsgId::$wvariant => stringify!($wvariant), )+
                    $( MsgId::$lvariant => stringify!($lvariant), )+
                }
            }

            /// Registered payload size for wire messages, `None` for
            /// local-only messages (they have no wire representation).
            pub fn wire_size(self) -> Option<usize> {
                match self {
                    $( MsgId::$wvariant => Some(std::mem::size_of::<$wpayload>()), )+
                    $( MsgId::$lvariant => None, )+
                }
            }
        }

        $(
            impl Message for $wpayload {
                const ID: MsgId = MsgId::$wvariant;
                const NAME: &'static str = stringify!($wvariant);
            }
        )+

        $(
            impl LocalMessage for $lpayload {
                const ID: MsgId = MsgId::$lvariant;
                const NAME: &'static str = stringify!($lvariant);
            }
        )+
    };
}

// ── Supporting enums ─────────────────────────────────────────────────────────
// Enums never appear directly in payload fields: `FromBytes` requires every
// bit pattern to be valid, so payloads carry a `u8` and decode fallibly.

/// Log line severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Severity {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl TryFrom<u8> for Severity {
    type Error = RegistryError;

    fn try_from(value: u8) -> Result<Self, RegistryError> {
        match value {
            0 => Ok(Severity::Debug),
            1 => Ok(Severity::Info),
            2 => Ok(Severity::Warn),
            3 => Ok(Severity::Error),
            other => Err(RegistryError::UnknownSeverity(other)),
        }
    }
}

impl From<Severity> for u8 {
    fn from(s: Severity) -> u8 {
        s as u8
    }
}

/// Coarse lifecycle state reported by the state service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SystemState {
    Init = 0,
    Ready = 1,
    Executing = 2,
    Stopping = 3,
    Fault = 4,
}

impl TryFrom<u8> for SystemState {
    type Error = RegistryError;

    fn try_from(value: u8) -> Result<Self, RegistryError> {
        match value {
            0 => Ok(SystemState::Init),
            1 => Ok(SystemState::Ready),
            2 => Ok(SystemState::Executing),
            3 => Ok(SystemState::Stopping),
            4 => Ok(SystemState::Fault),
            other => Err(RegistryError::UnknownSystemState(other)),
        }
    }
}

impl From<SystemState> for u8 {
    fn from(s: SystemState) -> u8 {
        s as u8
    }
}

/// Errors from interpreting registry-adjacent byte values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown severity byte: 0x{0:02x}")]
    UnknownSeverity(u8),

    #[error("unknown system state byte: 0x{0:02x}")]
    UnknownSystemState(u8),
}

// ── Wire payloads ─────────────────────────────────────────────────────────────

/// Unidirectional log/trace line. Emitted by any component at any time; the
/// external driver receives these passively through the bridge.
///
/// Wire size: 288 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct LogPayload {
    /// NUL-padded UTF-8 text. Truncated on write, trimmed on read.
    pub text: [u8; 255],
    /// [`Severity`] as a raw byte. Decode via [`LogPayload::severity`].
    pub severity: u8,
    /// NUL-padded component name.
    pub component: [u8; 32],
}

assert_eq_size!(LogPayload, [u8; 288]);

impl LogPayload {
    /// Build a log payload from string data, truncating to the fixed buffers.
    pub fn new(severity: Severity, component: &str, text: &str) -> Self {
        let mut p = LogPayload {
            text: [0u8; 255],
            severity: severity.into(),
            component: [0u8; 32],
        };
        copy_truncated(&mut p.text, text.as_bytes());
        copy_truncated(&mut p.component, component.as_bytes());
        p
    }

    pub fn severity(&self) -> Result<Severity, RegistryError> {
        Severity::try_from(self.severity)
    }

    /// The text field with NUL padding removed.
    pub fn text_lossy(&self) -> String {
        trimmed(&self.text)
    }

    pub fn component_lossy(&self) -> String {
        trimmed(&self.component)
    }
}

fn copy_truncated(dst: &mut [u8], src: &[u8]) {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
}

fn trimmed(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Broadcast at the configured tick rate while the clock runs, driving
/// kinematics, power, and thermal integration.
///
/// Wire size: 10 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct PhysicsTickPayload {
    pub cmd_id: u32,
    pub speed_rpm: i16,
    pub dt_us: u32,
}

assert_eq_size!(PhysicsTickPayload, [u8; 10]);

/// One-byte sentinel. Send to request a `StateData` snapshot; the payload
/// value is ignored.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct StateRequestPayload {
    pub reserved: u8,
}

assert_eq_size!(StateRequestPayload, [u8; 1]);

/// State machine snapshot carrying the current coarse [`SystemState`].
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct StatePayload {
    /// [`SystemState`] as a raw byte. Decode via [`StatePayload::state`].
    pub state: u8,
}

assert_eq_size!(StatePayload, [u8; 1]);

impl StatePayload {
    pub fn new(state: SystemState) -> Self {
        StatePayload { state: state.into() }
    }

    pub fn state(&self) -> Result<SystemState, RegistryError> {
        SystemState::try_from(self.state)
    }
}

/// One timed motor command step, embedded in [`MotorSequencePayload`].
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct MotorStep {
    pub speed_rpm: i16,
    pub duration_us: u32,
}

assert_eq_size!(MotorStep, [u8; 6]);

/// Maximum number of steps in one motor sequence. Extra steps are clamped
/// away by the motor service.
pub const MAX_MOTOR_STEPS: usize = 5;

/// A sequence of up to [`MAX_MOTOR_STEPS`] timed motor sub-commands.
/// `steps[0..num_steps]` execute in order; a new sequence preempts any
/// currently running one.
///
/// Wire size: 35 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct MotorSequencePayload {
    pub cmd_id: u32,
    pub num_steps: u8,
    pub steps: [MotorStep; MAX_MOTOR_STEPS],
}

assert_eq_size!(MotorSequencePayload, [u8; 35]);

impl MotorSequencePayload {
    /// An inert sequence: command 0, zero steps.
    pub fn empty() -> Self {
        MotorSequencePayload {
            cmd_id: 0,
            num_steps: 0,
            steps: [MotorStep {
                speed_rpm: 0,
                duration_us: 0,
            }; MAX_MOTOR_STEPS],
        }
    }
}

/// One-byte sentinel requesting a `KinematicsData` snapshot.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct KinematicsRequestPayload {
    pub reserved: u8,
}

assert_eq_size!(KinematicsRequestPayload, [u8; 1]);

/// Kinematics snapshot reflecting physics integrated since the current
/// command began.
///
/// Wire size: 16 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct KinematicsPayload {
    pub cmd_id: u32,
    pub elapsed_us: u32,
    pub position_m: f32,
    pub speed_mps: f32,
}

assert_eq_size!(KinematicsPayload, [u8; 16]);

/// One-byte sentinel requesting a `PowerData` snapshot.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct PowerRequestPayload {
    pub reserved: u8,
}

assert_eq_size!(PowerRequestPayload, [u8; 1]);

/// Battery model snapshot: simple internal-resistance drain.
///
/// Wire size: 13 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct PowerPayload {
    pub cmd_id: u32,
    pub voltage_v: f32,
    pub current_a: f32,
    pub state_of_charge: u8,
}

assert_eq_size!(PowerPayload, [u8; 13]);

/// One-byte sentinel requesting a `ThermalData` snapshot.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct ThermalRequestPayload {
    pub reserved: u8,
}

assert_eq_size!(ThermalRequestPayload, [u8; 1]);

/// Motor and battery temperature model snapshot.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct ThermalPayload {
    pub motor_temp_c: f32,
    pub battery_temp_c: f32,
}

assert_eq_size!(ThermalPayload, [u8; 8]);

/// A 2D coordinate.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

/// An axis-aligned 2D bounding box.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct Rect2 {
    pub min_pt: Point2,
    pub max_pt: Point2,
}

impl Rect2 {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let min = self.min_pt;
        let max = self.max_pt;
        x >= min.x && x <= max.x && y >= min.y && y <= max.y
    }
}

/// Acknowledgement sent when new environment data has been accepted.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct EnvironmentAckPayload {
    pub region_id: u32,
}

assert_eq_size!(EnvironmentAckPayload, [u8; 4]);

/// Request environmental conditions for a specific location.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct EnvironmentRequestPayload {
    pub target_location: Point2,
}

assert_eq_size!(EnvironmentRequestPayload, [u8; 8]);

/// Environmental conditions delivered from the external driver, valid
/// inside `bounds`.
///
/// Wire size: 36 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct EnvironmentPayload {
    pub region_id: u32,
    pub bounds: Rect2,
    pub ambient_temp_c: f32,
    pub incline_percent: f32,
    pub surface_friction: f32,
    pub max_speed_rpm: f32,
}

assert_eq_size!(EnvironmentPayload, [u8; 36]);

// ── Local payloads ────────────────────────────────────────────────────────────

/// Periodic RPM/activity update from the motor service. In-process only.
#[derive(Debug, Clone, Copy)]
pub struct MotorStatusPayload {
    pub cmd_id: u32,
    pub speed_rpm: i16,
    pub active: bool,
}

/// In-process lookup of the environment region covering a point.
#[derive(Debug, Clone, Copy)]
pub struct EnvQueryPayload {
    pub x: f32,
    pub y: f32,
}

/// Shared-ownership answer to [`EnvQueryPayload`]: a stable snapshot of the
/// matching region. Carries an `Arc` and therefore can never be registered
/// in a wire capability set.
#[derive(Debug, Clone)]
pub struct EnvSnapshotPayload {
    pub region: Arc<EnvironmentPayload>,
}

// ── The registry ──────────────────────────────────────────────────────────────

messages! {
    wire {
        Log                = 0  => LogPayload,
        PhysicsTick        = 1  => PhysicsTickPayload,
        StateRequest       = 2  => StateRequestPayload,
        StateData          = 3  => StatePayload,
        MotorSequence      = 10 => MotorSequencePayload,
        KinematicsRequest  = 20 => KinematicsRequestPayload,
        KinematicsData     = 21 => KinematicsPayload,
        PowerRequest       = 30 => PowerRequestPayload,
        PowerData          = 31 => PowerPayload,
        ThermalRequest     = 40 => ThermalRequestPayload,
        ThermalData        = 41 => ThermalPayload,
        EnvironmentAck     = 50 => EnvironmentAckPayload,
        EnvironmentRequest = 51 => EnvironmentRequestPayload,
        EnvironmentData    = 52 => EnvironmentPayload,
    }
    local {
        MotorStatus = 11   => MotorStatusPayload,
        EnvQuery    = 1000 => EnvQueryPayload,
        EnvSnapshot = 1001 => EnvSnapshotPayload,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
