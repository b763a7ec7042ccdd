//! System-wide safety state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate safety classification.
///
/// `Limited` holds iff at least one configured input is latched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum SystemState {
    /// No latched input; actuators may run.
    #[default]
    Normal = 0,
    /// At least one input latched; actuators are held paused.
    Limited = 1,
}

impl SystemState {
    /// State required by the current latch set.
    #[inline]
    pub const fn from_latched(any_latched: bool) -> Self {
        if any_latched { Self::Limited } else { Self::Normal }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Limited => "LIMITED",
        }
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
