//! Prelude module for common re-exports.
//!
//! ```rust
//! use curtain_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, GuardConfig, LogLevel, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{IO_COUNT, MAX_IO_INDEX, NO_RESET_INPUT};

// ─── Safety Inputs ──────────────────────────────────────────────────
pub use crate::io::config::{InputEntry, IoConfigError, SafetyInputConfig};
pub use crate::io::registry::{IoRegistry, SafetyInput};

// ─── Actuators & State ──────────────────────────────────────────────
pub use crate::actuator::{ActuatorId, ActuatorState, ActuatorTable, RunMode};
pub use crate::state::SystemState;

// ─── Platform ───────────────────────────────────────────────────────
pub use crate::platform::{PlatformError, SafetyPlatform, Severity};
