//! Actuation Engine — pause/resume sequencing with confirmation.
//!
//! Both sequences run while the caller holds the supervisor lock. Each
//! command is followed by a fixed confirmation wait and a run-mode
//! re-check; the outcome decides bookkeeping and notifications.
//!
//! Notification policy: routine outcomes are sent once per actuation
//! epoch (guarded by the `pause_notified`/`resume_notified` flags), while
//! failed commands are reported every time.

use curtain_common::actuator::{ActuatorId, ActuatorState, ActuatorTable, RunMode};
use curtain_common::platform::{SafetyPlatform, Severity};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Per-actuator result of [`ActuationEngine::pause_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PauseOutcome {
    /// Was running; now confirmed paused.
    Paused,
    /// Was already stopped or paused; nothing issued.
    AlreadySafe(RunMode),
    /// Pause issued but the run mode did not become `Paused`.
    Failed { before: RunMode, after: RunMode },
}

/// Per-actuator result of [`ActuationEngine::resume_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Recorded job resumed and confirmed running.
    Resumed,
    /// Paused, but not by this supervisor; left for the operator.
    NeedsManualResume,
    /// Already stopped or running; nothing issued.
    NoActionNeeded(RunMode),
    /// Resume issued but the run mode did not become `Running`.
    Failed { after: RunMode },
}

/// Sequences pause/resume commands over the managed actuators.
pub struct ActuationEngine<'a> {
    platform: &'a dyn SafetyPlatform,
    ids: &'a [ActuatorId],
    confirm_wait: Duration,
}

impl<'a> ActuationEngine<'a> {
    pub fn new(
        platform: &'a dyn SafetyPlatform,
        ids: &'a [ActuatorId],
        confirm_wait: Duration,
    ) -> Self {
        Self {
            platform,
            ids,
            confirm_wait,
        }
    }

    /// State for `id`, created from the controller's run mode on first use.
    pub fn state_for<'t>(
        &self,
        table: &'t mut ActuatorTable,
        id: ActuatorId,
    ) -> &'t mut ActuatorState {
        let platform = self.platform;
        table.get_or_insert_with(id, || {
            let mode = platform.run_mode(id);
            info!("Tracking actuator {id} (run mode {mode})");
            ActuatorState::new(mode)
        })
    }

    /// Refresh the run-mode snapshot of every managed actuator.
    pub fn refresh(&self, table: &mut ActuatorTable) {
        for &id in self.ids {
            let mode = self.platform.run_mode(id);
            self.state_for(table, id).run_mode = mode;
        }
    }

    /// Pause every running actuator.
    pub fn pause_all(&self, table: &mut ActuatorTable) -> Vec<(ActuatorId, PauseOutcome)> {
        info!("[action] Pausing actuators: system state LIMITED");
        self.ids
            .iter()
            .map(|&id| {
                let state = self.state_for(table, id);
                (id, self.pause_one(id, state))
            })
            .collect()
    }

    /// Resume every actuator this supervisor paused.
    pub fn resume_all(&self, table: &mut ActuatorTable) -> Vec<(ActuatorId, ResumeOutcome)> {
        info!("[action] Resuming actuators: system state NORMAL");
        self.ids
            .iter()
            .map(|&id| {
                let state = self.state_for(table, id);
                (id, self.resume_one(id, state))
            })
            .collect()
    }

    fn pause_one(&self, id: ActuatorId, state: &mut ActuatorState) -> PauseOutcome {
        let before = self.platform.run_mode(id);
        state.run_mode = before;

        if before != RunMode::Running {
            if !state.pause_notified() {
                self.notify(
                    Severity::Info,
                    &format!("Safety triggered: actuator {id} already {before}, no pause needed"),
                );
                state.mark_pause_notified();
            } else {
                debug!("Actuator {id} already {before}; pause notice already sent this epoch");
            }
            // A job recorded by an earlier pause stays valid while still paused.
            if before != RunMode::Paused {
                state.resume_job = None;
            }
            return PauseOutcome::AlreadySafe(before);
        }

        let job = match self.platform.active_job_name(id) {
            Ok(name) => {
                info!("Actuator {id} active job: {name}");
                Some(name)
            }
            Err(e) => {
                warn!("Failed to get active job of actuator {id}: {e}");
                None
            }
        };

        let command = self.platform.pause_job(id);
        info!("Pause command to actuator {id}: {command:?}");
        self.wait_confirm();

        let after = self.platform.run_mode(id);
        state.run_mode = after;
        info!(
            "Actuator {id} run mode {}ms after pause: {after}",
            self.confirm_wait.as_millis()
        );

        if after == RunMode::Paused {
            state.resume_job = job;
            if !state.pause_notified() {
                self.notify(
                    Severity::Warning,
                    &format!("Safety triggered: actuator {id} paused by safety input"),
                );
                state.mark_pause_notified();
            } else {
                debug!("Actuator {id} pause notice already sent this epoch");
            }
            PauseOutcome::Paused
        } else {
            let msg = format!(
                "Safety triggered: failed to pause actuator {id}! mode before: {before}, \
                 command result: {}, mode after: {after}",
                command_result(&command)
            );
            self.notify(Severity::Error, &msg);
            state.resume_job = None;
            PauseOutcome::Failed { before, after }
        }
    }

    fn resume_one(&self, id: ActuatorId, state: &mut ActuatorState) -> ResumeOutcome {
        let before = self.platform.run_mode(id);
        state.run_mode = before;

        if before != RunMode::Paused {
            if !state.resume_notified() {
                self.notify(
                    Severity::Info,
                    &format!("Safety cleared: actuator {id} already {before}, no resume needed"),
                );
                state.mark_resume_notified();
            } else {
                debug!("Actuator {id} already {before}; resume notice already sent this epoch");
            }
            state.resume_job = None;
            return ResumeOutcome::NoActionNeeded(before);
        }

        let Some(job) = state.resume_job.clone() else {
            if !state.resume_notified() {
                warn!("Actuator {id} paused without a recorded job");
                self.notify(
                    Severity::Info,
                    &format!(
                        "Safety cleared: actuator {id} is paused with no recorded job, \
                         resume it manually"
                    ),
                );
                state.mark_resume_notified();
            }
            return ResumeOutcome::NeedsManualResume;
        };

        info!("Resuming actuator {id} job {job}");
        let command = self.platform.resume_job(&job);
        info!("Resume command for job {job}: {command:?}");
        self.wait_confirm();

        let after = self.platform.run_mode(id);
        state.run_mode = after;
        info!(
            "Actuator {id} run mode {}ms after resume: {after}",
            self.confirm_wait.as_millis()
        );

        if after == RunMode::Running {
            if !state.resume_notified() {
                self.notify(
                    Severity::Info,
                    &format!("Safety cleared: actuator {id} job {job} resumed"),
                );
                state.mark_resume_notified();
            } else {
                debug!("Actuator {id} resume notice already sent this epoch");
            }
            state.resume_job = None;
            ResumeOutcome::Resumed
        } else {
            // Job kept so a later resume can retry.
            let msg = format!(
                "Safety cleared: failed to resume actuator {id} job {job}! mode before: \
                 {before}, command result: {}, mode after: {after}",
                command_result(&command)
            );
            self.notify(Severity::Error, &msg);
            ResumeOutcome::Failed { after }
        }
    }

    fn wait_confirm(&self) {
        if !self.confirm_wait.is_zero() {
            std::thread::sleep(self.confirm_wait);
        }
    }

    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Error => error!("{message}"),
            Severity::Alert | Severity::Warning => warn!("{message}"),
            Severity::Info => info!("{message}"),
        }
        self.platform.report_event(severity, message);
    }
}

fn command_result<E: std::fmt::Display>(r: &Result<(), E>) -> String {
    match r {
        Ok(()) => "ok".to_string(),
        Err(e) => e.to_string(),
    }
}
