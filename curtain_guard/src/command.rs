//! Command Handler — reconfiguration, manual reset and read operations.
//!
//! Requests are JSON objects carrying an `operation` field, either bare or
//! wrapped in a `reqCurtainSafetyControl` envelope:
//!
//! ```json
//! {"reqCurtainSafetyControl": {"operation": "update_config", "limitedSpeed": 30,
//!   "entries": [{"index": 5, "resetIndex": 0, "triggerLevel": 1, "description": "front"}]}}
//! ```
//!
//! Responses mirror the request form (`reqCurtainSafetyControlCB` for
//! wrapped requests). No operation returns an error to the caller; every
//! failure is a `{"status": false, "message": ...}` reply.

use chrono::{DateTime, Utc};
use curtain_common::consts::{IO_COUNT, MAX_LIMITED_SPEED};
use curtain_common::io::config::{entries_from_json, validate_entries, InputEntry};
use curtain_common::io::registry::SafetyInput;
use curtain_common::platform::Severity;
use curtain_common::state::SystemState;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::core::GuardCore;
use crate::store::StoreError;

/// Envelope key of wrapped requests.
pub const REQUEST_KEY: &str = "reqCurtainSafetyControl";
/// Envelope key of replies to wrapped requests.
pub const RESPONSE_KEY: &str = "reqCurtainSafetyControlCB";

/// `update_configuration` failure.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Rejected before any change was made.
    #[error("limitedSpeed {0} out of range 0..={MAX_LIMITED_SPEED}")]
    InvalidLimitedSpeed(i64),

    /// New configuration is active in memory but was not persisted.
    #[error("configuration applied but not saved: {0}")]
    Persist(#[from] StoreError),
}

/// Result of [`GuardCore::manual_reset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    /// No input is physically in alarm. `resumed` is set when the system
    /// left `LIMITED` and a resume was issued.
    Cleared { resumed: bool },
    /// The named input is still in alarm; latches were re-engaged.
    StillActive { index: usize, description: String },
}

impl ResetOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Cleared { .. })
    }
}

/// One input as reported by `get_config` and `get_triggered`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    pub index: usize,
    pub reset_index: usize,
    pub trigger_level: u8,
    pub description: String,
    pub is_triggered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_at: Option<DateTime<Utc>>,
}

impl EntryView {
    fn of(input: &SafetyInput, with_time: bool) -> Self {
        let cfg = input.config();
        Self {
            index: cfg.index,
            reset_index: cfg.reset_index,
            trigger_level: u8::from(cfg.trigger_level),
            description: cfg.description.clone(),
            is_triggered: input.is_triggered(),
            triggered_at: if with_time { input.triggered_at() } else { None },
        }
    }
}

// ─── Operations ─────────────────────────────────────────────────────

impl GuardCore {
    /// Replace every input definition and the limited speed, then persist.
    ///
    /// Invalid entries are dropped with a warning. All latches start
    /// released; the system state is left for the next evaluator cycle.
    ///
    /// # Errors
    /// - `UpdateError::InvalidLimitedSpeed`: nothing changed.
    /// - `UpdateError::Persist`: memory was updated, the store was not.
    pub fn update_configuration(
        &self,
        entries: &[InputEntry],
        limited_speed: i64,
    ) -> Result<usize, UpdateError> {
        let speed = u8::try_from(limited_speed)
            .ok()
            .filter(|s| i64::from(*s) <= MAX_LIMITED_SPEED)
            .ok_or(UpdateError::InvalidLimitedSpeed(limited_speed))?;

        let configs = validate_entries(entries);
        let mut state = self.lock_state();
        state.registry.replace(configs);
        state.limited_speed = speed;
        let active = state.registry.entries();
        info!(
            "Configuration replaced: {} of {} entr(ies) active, limited speed {}%",
            active.len(),
            entries.len(),
            speed
        );

        if let Err(e) = self.store().save(&active, speed) {
            error!("Failed to persist configuration: {e}");
            return Err(e.into());
        }
        Ok(active.len())
    }

    /// Clear every latch, re-check the physical inputs and either resume or
    /// re-latch, all within one critical section.
    pub fn manual_reset(&self) -> ResetOutcome {
        let mut guard = self.lock_state();
        let state = &mut *guard;
        let platform = self.platform().as_ref();

        info!("Manual reset requested (system state {})", state.system_state);
        let was_limited = state.system_state == SystemState::Limited;
        match state.registry.unlatch_all() {
            0 => info!("Manual reset: no latched inputs"),
            n => info!("Manual reset: cleared {n} latch(es)"),
        }

        // One read per input; the same snapshot picks the alert and re-latches.
        let in_alarm: Vec<usize> = state
            .registry
            .configured()
            .filter(|i| i.config().is_alarm(platform.read_digital_input(i.index())))
            .map(SafetyInput::index)
            .collect();

        let still_active = in_alarm.first().and_then(|&index| {
            state
                .registry
                .get(index)
                .map(|i| (index, i.config().description.clone()))
        });

        let Some((index, description)) = still_active else {
            if was_limited {
                state.system_state = SystemState::Normal;
                info!("Manual reset: all inputs clear, system state LIMITED -> NORMAL");
                self.engine().resume_all(&mut state.actuators);
                return ResetOutcome::Cleared { resumed: true };
            }
            info!("Manual reset: system already NORMAL");
            return ResetOutcome::Cleared { resumed: false };
        };

        let message = format!(
            "Safety reset received, but safety input {index} ({description}) is still \
             triggered; cannot resume"
        );
        warn!("{message}");
        platform.report_event(Severity::Alert, &message);

        let now = Utc::now();
        for &alarm in &in_alarm {
            let relatched = state
                .registry
                .get_mut(alarm)
                .is_some_and(|input| input.latch(now));
            if relatched {
                warn!("Manual reset: input {alarm} still in alarm, re-latched");
            }
        }
        if state.system_state != SystemState::Limited {
            info!("Manual reset: system state {} -> LIMITED", state.system_state);
            state.system_state = SystemState::Limited;
        }
        ResetOutcome::StillActive { index, description }
    }

    /// Limited speed and every configured input.
    pub fn get_configuration(&self) -> (u8, Vec<EntryView>) {
        let state = self.lock_state();
        let entries = state
            .registry
            .configured()
            .map(|i| EntryView::of(i, false))
            .collect();
        (state.limited_speed, entries)
    }

    /// System state and the latched inputs.
    pub fn triggered_inputs(&self) -> (SystemState, Vec<EntryView>) {
        let state = self.lock_state();
        let entries = state
            .registry
            .latched()
            .map(|i| EntryView::of(i, true))
            .collect();
        (state.system_state, entries)
    }

    /// Instantaneous level of every addressable input. Lock-free.
    pub fn io_levels(&self) -> Vec<bool> {
        let platform = self.platform();
        (0..IO_COUNT).map(|i| platform.read_digital_input(i)).collect()
    }
}

// ─── Request dispatch ───────────────────────────────────────────────

/// Reply to one request. Absent fields are omitted from the JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limited_speed: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_state: Option<SystemState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<EntryView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<bool>>,
}

impl Reply {
    fn ok() -> Self {
        Self {
            status: true,
            ..Default::default()
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Execute the operation named in `body` (an unwrapped request).
pub fn dispatch(core: &GuardCore, body: &Value) -> Reply {
    let Some(operation) = body.get("operation").and_then(Value::as_str) else {
        warn!("Request without a valid operation");
        return Reply::failure("invalid request: missing or invalid operation");
    };
    info!("Command request: {operation}");

    let mut reply = match operation {
        "update_config" => update_config(core, body),
        "reset_speed" => {
            let outcome = core.manual_reset();
            let reply = match &outcome {
                ResetOutcome::Cleared { .. } => {
                    Reply::ok().with_message("triggers cleared, resume attempted")
                }
                ResetOutcome::StillActive { index, .. } => Reply::failure(format!(
                    "triggers cleared, but safety input {index} is still active; resume refused"
                )),
            };
            Reply {
                limited_speed: Some(core.limited_speed()),
                ..reply
            }
        }
        "get_config" => {
            let (limited_speed, entries) = core.get_configuration();
            Reply {
                limited_speed: Some(limited_speed),
                entries: Some(entries),
                ..Reply::ok()
            }
        }
        "get_triggered" => {
            let (system_state, entries) = core.triggered_inputs();
            Reply {
                system_state: Some(system_state),
                entries: Some(entries),
                ..Reply::ok()
            }
        }
        "get_io_status" => Reply {
            levels: Some(core.io_levels()),
            ..Reply::ok()
        },
        other => {
            warn!("Unknown operation: {other}");
            Reply::failure("unknown operation")
        }
    };

    reply.operation = Some(operation.to_string());
    reply
}

fn update_config(core: &GuardCore, body: &Value) -> Reply {
    let limited_speed = body.get("limitedSpeed").and_then(Value::as_i64);
    let items = body.get("entries").and_then(Value::as_array);
    let (Some(limited_speed), Some(items)) = (limited_speed, items) else {
        warn!("update_config: missing or invalid parameters");
        return Reply::failure("missing or invalid parameters");
    };

    let entries = entries_from_json(items);
    match core.update_configuration(&entries, limited_speed) {
        Ok(_) => Reply::ok().with_message("configuration updated"),
        Err(e) => {
            warn!("update_config failed: {e}");
            Reply::failure(e.to_string())
        }
    }
}

/// Handle one request value, honouring the request envelope.
pub fn handle_request(core: &GuardCore, request: &Value) -> Value {
    let (body, wrapped) = match request.get(REQUEST_KEY) {
        Some(inner) => (inner, true),
        None => (request, false),
    };

    let reply = dispatch(core, body);
    let value = serde_json::to_value(&reply).unwrap_or_else(|e| {
        error!("Failed to encode reply: {e}");
        json!({ "status": false, "message": "internal error: failed to encode reply" })
    });

    if wrapped {
        let mut envelope = serde_json::Map::new();
        envelope.insert(RESPONSE_KEY.to_string(), value);
        Value::Object(envelope)
    } else {
        value
    }
}

/// Handle one line of JSON text and return one line of JSON text.
pub fn handle_line(core: &GuardCore, line: &str) -> String {
    let response = match serde_json::from_str::<Value>(line) {
        Ok(request) => handle_request(core, &request),
        Err(e) => {
            debug!("Unparseable request: {e}");
            json!({ "status": false, "message": format!("invalid request: {e}") })
        }
    };
    response.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::SimulatedPlatform;
    use curtain_common::actuator::{ActuatorId, RunMode};
    use curtain_common::config::GuardConfig;
    use curtain_common::platform::{PlatformError, SafetyPlatform};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<SimulatedPlatform>, GuardCore) {
        let tmp = TempDir::new().unwrap();
        let mut config = GuardConfig::default();
        config.store.path = tmp.path().join("store.json");
        config.monitor.confirm_wait_ms = 0;
        config.actuators.ids = vec![ActuatorId(1)];
        let sim = Arc::new(SimulatedPlatform::new(&[ActuatorId(1)]));
        let core = GuardCore::new(&config, sim.clone()).unwrap();
        (tmp, sim, core)
    }

    fn entry(index: i64) -> InputEntry {
        InputEntry {
            index,
            reset_index: 0,
            trigger_level: 1,
            description: format!("beam {index}"),
        }
    }

    #[test]
    fn update_rejects_speed_before_mutation() {
        let (_tmp, _sim, core) = setup();
        core.update_configuration(&[entry(1)], 40).unwrap();

        for bad in [-1, 101, 1000] {
            assert!(matches!(
                core.update_configuration(&[entry(2)], bad),
                Err(UpdateError::InvalidLimitedSpeed(v)) if v == bad
            ));
        }
        let (speed, entries) = core.get_configuration();
        assert_eq!(speed, 40);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 1);
    }

    #[test]
    fn update_persist_failure_keeps_memory() {
        let (tmp, _sim, _core) = setup();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let mut config = GuardConfig::default();
        config.store.path = blocker.join("store.json");
        let sim = Arc::new(SimulatedPlatform::new(&[ActuatorId(1), ActuatorId(2)]));
        let core = GuardCore::new(&config, sim).unwrap();

        assert!(matches!(
            core.update_configuration(&[entry(4)], 20),
            Err(UpdateError::Persist(_))
        ));
        assert_eq!(core.limited_speed(), 20);
        assert_eq!(core.is_triggered(4), Some(false));
    }

    #[test]
    fn reset_with_nothing_latched_succeeds() {
        let (_tmp, _sim, core) = setup();
        assert_eq!(core.manual_reset(), ResetOutcome::Cleared { resumed: false });
        assert_eq!(core.system_state(), SystemState::Normal);
    }

    #[test]
    fn reset_relatches_and_alerts() {
        let (_tmp, sim, core) = setup();
        core.update_configuration(&[entry(5), entry(6)], 30).unwrap();
        sim.set_input(5, true);
        sim.set_input(6, true);
        core.run_cycle();

        let outcome = core.manual_reset();
        assert_eq!(
            outcome,
            ResetOutcome::StillActive {
                index: 5,
                description: "beam 5".into()
            }
        );
        assert!(!outcome.is_success());
        assert_eq!(core.is_triggered(5), Some(true));
        assert_eq!(core.is_triggered(6), Some(true));
        assert_eq!(core.system_state(), SystemState::Limited);
        assert_eq!(sim.events_at(Severity::Alert).len(), 1);
    }

    #[test]
    fn reset_forces_limited_when_hazard_seen_first_time() {
        let (_tmp, sim, core) = setup();
        core.update_configuration(&[entry(5)], 30).unwrap();
        sim.set_input(5, true);
        // No evaluator cycle yet: state is still NORMAL.
        let outcome = core.manual_reset();
        assert!(!outcome.is_success());
        assert_eq!(core.system_state(), SystemState::Limited);
        assert_eq!(sim.pause_calls(), 0);
    }

    /// Input `index` reads high for the next `reads` reads, then follows
    /// the wrapped simulation.
    struct FadingHazard {
        sim: SimulatedPlatform,
        index: usize,
        reads: parking_lot::Mutex<u32>,
    }

    impl SafetyPlatform for FadingHazard {
        fn name(&self) -> &'static str {
            "fading"
        }

        fn read_digital_input(&self, index: usize) -> bool {
            if index == self.index {
                let mut left = self.reads.lock();
                if *left > 0 {
                    *left -= 1;
                    return true;
                }
            }
            self.sim.read_digital_input(index)
        }

        fn run_mode(&self, id: ActuatorId) -> RunMode {
            self.sim.run_mode(id)
        }

        fn pause_job(&self, id: ActuatorId) -> Result<(), PlatformError> {
            self.sim.pause_job(id)
        }

        fn resume_job(&self, job: &str) -> Result<(), PlatformError> {
            self.sim.resume_job(job)
        }

        fn active_job_name(&self, id: ActuatorId) -> Result<String, PlatformError> {
            self.sim.active_job_name(id)
        }

        fn report_event(&self, severity: Severity, message: &str) {
            self.sim.report_event(severity, message)
        }
    }

    #[test]
    fn reset_relatches_the_input_it_reports() {
        let tmp = TempDir::new().unwrap();
        let mut config = GuardConfig::default();
        config.store.path = tmp.path().join("store.json");
        config.monitor.confirm_wait_ms = 0;
        config.actuators.ids = vec![ActuatorId(1)];
        let platform = Arc::new(FadingHazard {
            sim: SimulatedPlatform::new(&[ActuatorId(1)]),
            index: 5,
            reads: parking_lot::Mutex::new(0),
        });
        platform.sim.set_running_job(ActuatorId(1), "WELD");
        let core = GuardCore::new(&config, platform.clone()).unwrap();
        let mut gated = entry(5);
        gated.reset_index = 9;
        core.update_configuration(&[gated], 30).unwrap();
        core.bootstrap_actuators();

        platform.sim.set_input(5, true);
        core.run_cycle();
        assert_eq!(core.system_state(), SystemState::Limited);
        assert_eq!(platform.sim.run_mode_of(ActuatorId(1)), RunMode::Paused);

        // Hazard gone, but the reset sees it one last time.
        platform.sim.set_input(5, false);
        *platform.reads.lock() = 1;
        assert!(matches!(
            core.manual_reset(),
            ResetOutcome::StillActive { index: 5, .. }
        ));
        assert_eq!(core.is_triggered(5), Some(true));

        // Reset input 9 never went high: the latch must hold.
        core.run_cycle();
        assert_eq!(core.system_state(), SystemState::Limited);
        assert_eq!(core.is_triggered(5), Some(true));
        assert_eq!(platform.sim.run_mode_of(ActuatorId(1)), RunMode::Paused);
        assert_eq!(platform.sim.resume_calls(), 0);

        platform.sim.set_input(9, true);
        core.run_cycle();
        assert_eq!(core.system_state(), SystemState::Normal);
        assert_eq!(platform.sim.run_mode_of(ActuatorId(1)), RunMode::Running);
    }

    #[test]
    fn triggered_inputs_lists_latched_only() {
        let (_tmp, sim, core) = setup();
        core.update_configuration(&[entry(5), entry(6)], 30).unwrap();
        sim.set_input(6, true);
        core.run_cycle();

        let (state, entries) = core.triggered_inputs();
        assert_eq!(state, SystemState::Limited);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].index, 6);
        assert!(entries[0].is_triggered);
        assert!(entries[0].triggered_at.is_some());
    }

    #[test]
    fn io_levels_cover_every_index() {
        let (_tmp, sim, core) = setup();
        sim.set_input(2048, true);
        let levels = core.io_levels();
        assert_eq!(levels.len(), IO_COUNT);
        assert!(levels[2048]);
        assert!(!levels[0]);
    }

    #[test]
    fn dispatch_rejects_missing_operation() {
        let (_tmp, _sim, core) = setup();
        let reply = dispatch(&core, &json!({ "limitedSpeed": 3 }));
        assert!(!reply.status);
        assert_eq!(reply.operation, None);
        assert_eq!(
            reply.message.as_deref(),
            Some("invalid request: missing or invalid operation")
        );
    }

    #[test]
    fn dispatch_unknown_operation() {
        let (_tmp, _sim, core) = setup();
        let reply = dispatch(&core, &json!({ "operation": "self_destruct" }));
        assert!(!reply.status);
        assert_eq!(reply.operation.as_deref(), Some("self_destruct"));
        assert_eq!(reply.message.as_deref(), Some("unknown operation"));
    }

    #[test]
    fn dispatch_update_requires_parameters() {
        let (_tmp, _sim, core) = setup();
        for body in [
            json!({ "operation": "update_config", "entries": [] }),
            json!({ "operation": "update_config", "limitedSpeed": 30 }),
            json!({ "operation": "update_config", "limitedSpeed": "30", "entries": [] }),
            json!({ "operation": "update_config", "limitedSpeed": 30, "entries": {} }),
        ] {
            let reply = dispatch(&core, &body);
            assert!(!reply.status);
            assert_eq!(reply.message.as_deref(), Some("missing or invalid parameters"));
        }
    }

    #[test]
    fn wrapped_request_gets_wrapped_reply() {
        let (_tmp, _sim, core) = setup();
        let response = handle_request(
            &core,
            &json!({ "reqCurtainSafetyControl": { "operation": "get_config" } }),
        );
        let inner = &response[RESPONSE_KEY];
        assert_eq!(inner["status"], json!(true));
        assert_eq!(inner["operation"], json!("get_config"));
        assert_eq!(inner["limitedSpeed"], json!(30));
        assert_eq!(inner["entries"], json!([]));
    }

    #[test]
    fn bare_request_gets_bare_reply() {
        let (_tmp, _sim, core) = setup();
        let response = handle_request(&core, &json!({ "operation": "reset_speed" }));
        assert_eq!(response["status"], json!(true));
        assert_eq!(response["limitedSpeed"], json!(30));
        assert!(response.get(RESPONSE_KEY).is_none());
    }

    #[test]
    fn handle_line_reports_parse_errors() {
        let (_tmp, _sim, core) = setup();
        let out: Value = serde_json::from_str(&handle_line(&core, "{oops")).unwrap();
        assert_eq!(out["status"], json!(false));
        assert!(out["message"].as_str().unwrap().starts_with("invalid request"));
    }
}
