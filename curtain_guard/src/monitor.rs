//! Safety Evaluator — per-cycle latch evaluation and the polling loop.
//!
//! Each cycle, under the supervisor lock:
//!
//! 1. Sample every configured input. A reading equal to its trigger level
//!    latches the input (edge only). A clear reading releases a latched
//!    input once its reset condition holds: the reset input reads high, or
//!    there is no reset input.
//! 2. Derive the required system state from the latch set.
//! 3. On a change of system state, pause (`LIMITED`) or resume (`NORMAL`).
//! 4. Refresh every actuator's run-mode snapshot.

use chrono::{DateTime, Utc};
use curtain_common::platform::SafetyPlatform;
use curtain_common::state::SystemState;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::actuation::ActuationEngine;
use crate::core::{GuardCore, GuardState};

/// What one evaluator cycle changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Inputs latched this cycle, in index order.
    pub newly_latched: Vec<usize>,
    /// Inputs released this cycle, in index order.
    pub released: Vec<usize>,
    /// `(from, to)` when the system state changed.
    pub transition: Option<(SystemState, SystemState)>,
}

impl CycleOutcome {
    pub fn is_quiet(&self) -> bool {
        self.newly_latched.is_empty() && self.released.is_empty() && self.transition.is_none()
    }
}

/// Evaluate one cycle against `state`. The caller holds the lock.
pub(crate) fn evaluate(
    state: &mut GuardState,
    platform: &dyn SafetyPlatform,
    engine: &ActuationEngine<'_>,
    now: DateTime<Utc>,
) -> CycleOutcome {
    let mut outcome = CycleOutcome::default();

    for input in state.registry.configured_mut() {
        let index = input.index();
        let level = platform.read_digital_input(index);

        if input.config().is_alarm(level) {
            if input.latch(now) {
                warn!(
                    "Input {index} ({}) triggered: level {} matches trigger level",
                    input.config().description,
                    u8::from(level)
                );
                outcome.newly_latched.push(index);
            }
        } else if input.is_triggered() {
            let reset_ok = match input.config().reset_input() {
                Some(reset) => platform.read_digital_input(reset),
                None => true,
            };
            if reset_ok {
                input.unlatch();
                info!("Input {index} ({}) reset", input.config().description);
                outcome.released.push(index);
            }
        }
    }

    let required = SystemState::from_latched(state.registry.any_latched());
    if required != state.system_state {
        let from = state.system_state;
        state.system_state = required;
        info!("System state {from} -> {required}");
        match required {
            SystemState::Limited => {
                engine.pause_all(&mut state.actuators);
            }
            SystemState::Normal => {
                engine.resume_all(&mut state.actuators);
            }
        }
        outcome.transition = Some((from, required));
    }

    engine.refresh(&mut state.actuators);
    outcome
}

// ─── Polling loop ───────────────────────────────────────────────────

/// Evaluator timing statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Cycles executed.
    pub cycle_count: u64,
    /// Cycles that took longer than the poll period.
    pub overruns: u64,
    /// Longest observed cycle.
    pub max_cycle_time_us: u64,
    /// Sum of cycle times, for the average.
    pub total_cycle_time_us: u64,
}

impl CycleStats {
    pub fn avg_cycle_time_us(&self) -> u64 {
        self.total_cycle_time_us
            .checked_div(self.cycle_count)
            .unwrap_or(0)
    }

    /// Account for one cycle; overruns are logged rate-limited.
    pub fn record(&mut self, elapsed: Duration, period: Duration) {
        let cycle_time_us = elapsed.as_micros() as u64;
        self.cycle_count += 1;
        self.total_cycle_time_us += cycle_time_us;
        self.max_cycle_time_us = self.max_cycle_time_us.max(cycle_time_us);

        if elapsed > period {
            self.overruns += 1;
            if self.overruns <= 10 || self.overruns % 1000 == 0 {
                warn!(
                    "Evaluator overrun #{}: cycle took {}us (period {}us)",
                    self.overruns,
                    cycle_time_us,
                    period.as_micros()
                );
            }
        }

        if self.cycle_count % 1000 == 0 {
            debug!(
                "Evaluator: {} cycles, avg={}us, max={}us, overruns={}",
                self.cycle_count,
                self.avg_cycle_time_us(),
                self.max_cycle_time_us,
                self.overruns
            );
        }
    }
}

/// Run cycles until the running flag drops. Blocks the calling thread.
pub(crate) fn run(core: &GuardCore) -> CycleStats {
    let period = core.poll_period();
    let running = core.running_flag();
    let mut stats = CycleStats::default();

    info!("Evaluator started (period={}ms)", period.as_millis());

    while running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();
        core.run_cycle();

        let elapsed = cycle_start.elapsed();
        stats.record(elapsed, period);
        if elapsed < period {
            std::thread::sleep(period - elapsed);
        }
    }

    info!(
        "Evaluator stopped after {} cycles (overruns: {})",
        stats.cycle_count, stats.overruns
    );
    stats
}
