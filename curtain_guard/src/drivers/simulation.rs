//! In-memory simulation of the host platform.
//!
//! The `SimulatedPlatform` models:
//! - A bank of `IO_COUNT` digital inputs, all low at start
//! - Per-actuator controller run-mode code and open job
//! - Pause/resume commands that take effect immediately (or not at all,
//!   to exercise actuation failures)
//! - A bounded event log standing in for the alarm sink

use curtain_common::actuator::{ActuatorId, RunMode};
use curtain_common::consts::IO_COUNT;
use curtain_common::platform::{PlatformError, SafetyPlatform, Severity};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, trace, warn};

/// Events kept by the simulated alarm sink; older ones are dropped.
pub const EVENT_LOG_CAPACITY: usize = 256;

/// Event captured from [`SafetyPlatform::report_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedEvent {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
struct SimActuator {
    /// Raw controller status code.
    mode_code: i32,
    open_job: Option<String>,
}

impl SimActuator {
    fn run_mode(&self) -> RunMode {
        RunMode::from_code(self.mode_code).unwrap_or_else(|| {
            warn!("sim: unknown run mode code {}, treating as stopped", self.mode_code);
            RunMode::Stopped
        })
    }
}

#[derive(Debug)]
struct SimState {
    inputs: Vec<bool>,
    actuators: BTreeMap<ActuatorId, SimActuator>,
    commands_effective: bool,
    job_query_fails: bool,
    pause_calls: usize,
    resume_calls: usize,
    events: VecDeque<ReportedEvent>,
}

/// Simulated controller. Interior mutability lets tests change inputs
/// while the supervisor holds a shared reference.
#[derive(Debug)]
pub struct SimulatedPlatform {
    inner: Mutex<SimState>,
}

impl SimulatedPlatform {
    /// Platform with the given actuators, all stopped with no job open.
    pub fn new(ids: &[ActuatorId]) -> Self {
        let actuators = ids
            .iter()
            .map(|&id| (id, SimActuator::default()))
            .collect();
        debug!("SimulatedPlatform initialized: {} inputs, {} actuators", IO_COUNT, ids.len());
        Self {
            inner: Mutex::new(SimState {
                inputs: vec![false; IO_COUNT],
                actuators,
                commands_effective: true,
                job_query_fails: false,
                pause_calls: 0,
                resume_calls: 0,
                events: VecDeque::with_capacity(EVENT_LOG_CAPACITY),
            }),
        }
    }

    /// Set the physical level of one input. Out-of-range indices are ignored.
    pub fn set_input(&self, index: usize, level: bool) {
        if let Some(slot) = self.inner.lock().inputs.get_mut(index) {
            *slot = level;
        }
    }

    pub fn set_run_mode(&self, id: ActuatorId, mode: RunMode) {
        self.set_mode_code(id, mode as i32);
    }

    /// Set the raw controller code, including values outside the known modes.
    pub fn set_mode_code(&self, id: ActuatorId, code: i32) {
        self.inner.lock().actuators.entry(id).or_default().mode_code = code;
    }

    /// Open `job` on the actuator and mark it running.
    pub fn set_running_job(&self, id: ActuatorId, job: &str) {
        let mut inner = self.inner.lock();
        let act = inner.actuators.entry(id).or_default();
        act.open_job = Some(job.to_string());
        act.mode_code = RunMode::Running as i32;
    }

    /// When `false`, pause/resume commands are accepted but change nothing.
    pub fn set_commands_effective(&self, effective: bool) {
        self.inner.lock().commands_effective = effective;
    }

    /// When `true`, `active_job_name` fails.
    pub fn set_job_query_fails(&self, fails: bool) {
        self.inner.lock().job_query_fails = fails;
    }

    pub fn run_mode_of(&self, id: ActuatorId) -> RunMode {
        self.inner
            .lock()
            .actuators
            .get(&id)
            .map(SimActuator::run_mode)
            .unwrap_or_default()
    }

    pub fn pause_calls(&self) -> usize {
        self.inner.lock().pause_calls
    }

    pub fn resume_calls(&self) -> usize {
        self.inner.lock().resume_calls
    }

    /// Retained reported events, oldest first.
    pub fn events(&self) -> Vec<ReportedEvent> {
        self.inner.lock().events.iter().cloned().collect()
    }

    /// Reported events of one severity.
    pub fn events_at(&self, severity: Severity) -> Vec<ReportedEvent> {
        self.inner
            .lock()
            .events
            .iter()
            .filter(|e| e.severity == severity)
            .cloned()
            .collect()
    }

    pub fn clear_events(&self) {
        self.inner.lock().events.clear();
    }
}

impl SafetyPlatform for SimulatedPlatform {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn read_digital_input(&self, index: usize) -> bool {
        self.inner.lock().inputs.get(index).copied().unwrap_or(false)
    }

    fn run_mode(&self, id: ActuatorId) -> RunMode {
        self.run_mode_of(id)
    }

    fn pause_job(&self, id: ActuatorId) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        inner.pause_calls += 1;
        let effective = inner.commands_effective;
        let act = inner
            .actuators
            .get_mut(&id)
            .ok_or(PlatformError::Status(-1))?;
        if effective && act.run_mode() == RunMode::Running {
            act.mode_code = RunMode::Paused as i32;
        }
        trace!("sim: pause actuator {id} -> {}", act.run_mode());
        Ok(())
    }

    fn resume_job(&self, job: &str) -> Result<(), PlatformError> {
        let mut inner = self.inner.lock();
        inner.resume_calls += 1;
        let effective = inner.commands_effective;
        let act = inner
            .actuators
            .values_mut()
            .find(|a| a.open_job.as_deref() == Some(job))
            .ok_or(PlatformError::Status(-2))?;
        if effective && act.run_mode() == RunMode::Paused {
            act.mode_code = RunMode::Running as i32;
        }
        trace!("sim: resume job {job} -> {}", act.run_mode());
        Ok(())
    }

    fn active_job_name(&self, id: ActuatorId) -> Result<String, PlatformError> {
        let inner = self.inner.lock();
        if inner.job_query_fails {
            return Err(PlatformError::Status(-3));
        }
        inner
            .actuators
            .get(&id)
            .and_then(|a| a.open_job.clone())
            .ok_or_else(|| PlatformError::Unavailable(format!("no job open on actuator {id}")))
    }

    fn report_event(&self, severity: Severity, message: &str) {
        debug!("sim: alarm level {} ({severity}): {message}", severity.level());
        let mut inner = self.inner.lock();
        if inner.events.len() == EVENT_LOG_CAPACITY {
            inner.events.pop_front();
        }
        inner.events.push_back(ReportedEvent {
            severity,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: ActuatorId = ActuatorId(1);

    #[test]
    fn inputs_default_low_and_bounded() {
        let sim = SimulatedPlatform::new(&[A]);
        assert!(!sim.read_digital_input(0));
        sim.set_input(2048, true);
        assert!(sim.read_digital_input(2048));
        sim.set_input(5000, true);
        assert!(!sim.read_digital_input(5000));
    }

    #[test]
    fn pause_and_resume_cycle() {
        let sim = SimulatedPlatform::new(&[A]);
        sim.set_running_job(A, "PICK");
        assert_eq!(sim.active_job_name(A).unwrap(), "PICK");

        sim.pause_job(A).unwrap();
        assert_eq!(sim.run_mode(A), RunMode::Paused);
        sim.resume_job("PICK").unwrap();
        assert_eq!(sim.run_mode(A), RunMode::Running);
        assert_eq!((sim.pause_calls(), sim.resume_calls()), (1, 1));
    }

    #[test]
    fn ineffective_commands_change_nothing() {
        let sim = SimulatedPlatform::new(&[A]);
        sim.set_running_job(A, "PICK");
        sim.set_commands_effective(false);
        sim.pause_job(A).unwrap();
        assert_eq!(sim.run_mode(A), RunMode::Running);
    }

    #[test]
    fn unknown_targets_are_errors() {
        let sim = SimulatedPlatform::new(&[A]);
        assert_eq!(sim.pause_job(ActuatorId(9)), Err(PlatformError::Status(-1)));
        assert_eq!(sim.resume_job("NOPE"), Err(PlatformError::Status(-2)));
        assert!(sim.active_job_name(A).is_err());
        sim.set_job_query_fails(true);
        assert_eq!(sim.active_job_name(A), Err(PlatformError::Status(-3)));
    }

    #[test]
    fn events_recorded() {
        let sim = SimulatedPlatform::new(&[A]);
        sim.report_event(Severity::Alert, "still active");
        sim.report_event(Severity::Info, "fine");
        assert_eq!(sim.events().len(), 2);
        assert_eq!(sim.events_at(Severity::Alert)[0].message, "still active");
        sim.clear_events();
        assert!(sim.events().is_empty());
    }

    #[test]
    fn event_log_is_bounded() {
        let sim = SimulatedPlatform::new(&[A]);
        for n in 0..EVENT_LOG_CAPACITY + 10 {
            sim.report_event(Severity::Info, &format!("event {n}"));
        }
        let events = sim.events();
        assert_eq!(events.len(), EVENT_LOG_CAPACITY);
        assert_eq!(events[0].message, "event 10");
        assert_eq!(
            events[EVENT_LOG_CAPACITY - 1].message,
            format!("event {}", EVENT_LOG_CAPACITY + 9)
        );
    }

    #[test]
    fn run_mode_decoded_from_controller_code() {
        let sim = SimulatedPlatform::new(&[A]);
        sim.set_mode_code(A, 1);
        assert_eq!(sim.run_mode(A), RunMode::Paused);
        sim.set_mode_code(A, 7);
        assert_eq!(sim.run_mode(A), RunMode::Stopped);
        sim.set_running_job(A, "PICK");
        assert_eq!(sim.run_mode(A), RunMode::Running);
    }
}
