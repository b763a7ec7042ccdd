//! Per-actuator bookkeeping.
//!
//! The supervisor mirrors each managed actuator's run mode, remembers the
//! job it paused (so it can resume exactly that job) and keeps one-shot
//! notification flags scoped to the current actuation epoch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable actuator (robot) identifier on the host controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActuatorId(pub u32);

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Program run mode reported by the actuator controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum RunMode {
    /// No job executing.
    #[default]
    Stopped = 0,
    /// Job loaded but paused.
    Paused = 1,
    /// Job executing.
    Running = 2,
}

impl RunMode {
    /// Convert from the controller's raw status code. Returns `None` for
    /// unknown values.
    #[inline]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Stopped),
            1 => Some(Self::Paused),
            2 => Some(Self::Running),
            _ => None,
        }
    }

    /// Short lowercase name used in notifications.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Paused => "paused",
            Self::Running => "running",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping for one managed actuator.
///
/// `pause_notified` and `resume_notified` are never both set: marking one
/// clears the other, which opens a new notification epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActuatorState {
    /// Last run mode snapshot.
    pub run_mode: RunMode,
    /// Job this supervisor paused and intends to resume.
    pub resume_job: Option<String>,
    pause_notified: bool,
    resume_notified: bool,
}

impl ActuatorState {
    /// Fresh state seeded with the controller's current run mode.
    pub fn new(run_mode: RunMode) -> Self {
        Self {
            run_mode,
            ..Default::default()
        }
    }

    #[inline]
    pub const fn pause_notified(&self) -> bool {
        self.pause_notified
    }

    #[inline]
    pub const fn resume_notified(&self) -> bool {
        self.resume_notified
    }

    /// Record that the pause-side notification for this epoch was sent.
    pub fn mark_pause_notified(&mut self) {
        self.pause_notified = true;
        self.resume_notified = false;
    }

    /// Record that the resume-side notification for this epoch was sent.
    pub fn mark_resume_notified(&mut self) {
        self.resume_notified = true;
        self.pause_notified = false;
    }
}

/// Table of actuator states, keyed and iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct ActuatorTable {
    states: BTreeMap<ActuatorId, ActuatorState>,
}

impl ActuatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the state for `id`, creating it with `init` on first reference.
    pub fn get_or_insert_with(
        &mut self,
        id: ActuatorId,
        init: impl FnOnce() -> ActuatorState,
    ) -> &mut ActuatorState {
        self.states.entry(id).or_insert_with(init)
    }

    pub fn get(&self, id: ActuatorId) -> Option<&ActuatorState> {
        self.states.get(&id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActuatorId, &ActuatorState)> {
        self.states.iter().map(|(id, s)| (*id, s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_mode_from_code() {
        assert_eq!(RunMode::from_code(0), Some(RunMode::Stopped));
        assert_eq!(RunMode::from_code(1), Some(RunMode::Paused));
        assert_eq!(RunMode::from_code(2), Some(RunMode::Running));
        assert_eq!(RunMode::from_code(3), None);
        assert_eq!(RunMode::from_code(-1), None);
    }

    #[test]
    fn notification_flags_are_exclusive() {
        let mut s = ActuatorState::new(RunMode::Running);
        assert!(!s.pause_notified() && !s.resume_notified());

        s.mark_pause_notified();
        assert!(s.pause_notified());
        assert!(!s.resume_notified());

        s.mark_resume_notified();
        assert!(s.resume_notified());
        assert!(!s.pause_notified());
    }

    #[test]
    fn table_creates_lazily_once() {
        let mut table = ActuatorTable::new();
        let mut calls = 0;
        table.get_or_insert_with(ActuatorId(2), || {
            calls += 1;
            ActuatorState::new(RunMode::Paused)
        });
        table
            .get_or_insert_with(ActuatorId(2), || {
                calls += 1;
                ActuatorState::new(RunMode::Running)
            })
            .resume_job = Some("WELD_A".into());

        assert_eq!(calls, 1);
        assert_eq!(table.len(), 1);
        let s = table.get(ActuatorId(2)).unwrap();
        assert_eq!(s.run_mode, RunMode::Paused);
        assert_eq!(s.resume_job.as_deref(), Some("WELD_A"));
    }
}
