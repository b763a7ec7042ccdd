//! Host platform contract and error types.
//!
//! This module defines:
//! - `SafetyPlatform` trait - Calls the supervisor makes into the host controller
//! - `PlatformError` enum - Failure of a controller call
//! - `Severity` enum - Level attached to reported events

use crate::actuator::{ActuatorId, RunMode};
use std::fmt;
use thiserror::Error;

/// Error returned by a host controller call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// Controller returned a non-zero status code.
    #[error("controller returned status {0}")]
    Status(i32),

    /// Controller could not be reached or the call is unsupported.
    #[error("controller unavailable: {0}")]
    Unavailable(String),
}

/// Severity of an event sent to the host's reporting sink.
///
/// Discriminants are the host's alarm levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    /// Routine, no-incident notification.
    Info = 0,
    /// A safety input caused an action.
    Warning = 1,
    /// Operator request could not be honoured.
    Alert = 2,
    /// An actuation command failed to take effect.
    Error = 3,
}

impl Severity {
    #[inline]
    pub const fn level(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Alert => "alert",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Capabilities the supervisor consumes from the host platform.
///
/// Implementations are shared between the evaluator thread and command
/// callers, so every method takes `&self`. All calls are synchronous.
///
/// # Timing Contracts
///
/// | Operation | Expected Duration |
/// |-----------|-------------------|
/// | `read_digital_input()` | microseconds |
/// | `run_mode()` / `active_job_name()` | one controller round trip |
/// | `pause_job()` / `resume_job()` | returns once the command is issued |
/// | `report_event()` | fire-and-forget |
pub trait SafetyPlatform: Send + Sync {
    /// Returns the platform's identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Instantaneous level of digital input `index` (`index < IO_COUNT`).
    fn read_digital_input(&self, index: usize) -> bool;

    /// Current program run mode of an actuator.
    fn run_mode(&self, id: ActuatorId) -> RunMode;

    /// Ask the controller to pause the actuator's running job.
    ///
    /// A successful return only means the command was accepted; callers
    /// confirm the outcome through [`SafetyPlatform::run_mode`].
    fn pause_job(&self, id: ActuatorId) -> Result<(), PlatformError>;

    /// Ask the controller to start (resume) the named job.
    fn resume_job(&self, job: &str) -> Result<(), PlatformError>;

    /// Name of the job currently open on the actuator.
    fn active_job_name(&self, id: ActuatorId) -> Result<String, PlatformError>;

    /// Send a notification to the host's alarm/report sink.
    fn report_event(&self, severity: Severity, message: &str);
}
