//! Supervisor context and evaluator thread management.
//!
//! `GuardCore` owns everything the evaluator and the command handler share:
//! the IO registry, the actuator table, the limited speed and the system
//! state, all behind one lock. It also owns the platform handle, the store
//! and the evaluator's running flag.

use chrono::{DateTime, Utc};
use curtain_common::actuator::{ActuatorId, ActuatorState, ActuatorTable};
use curtain_common::config::{ConfigError, GuardConfig};
use curtain_common::consts::DEFAULT_LIMITED_SPEED;
use curtain_common::io::registry::IoRegistry;
use curtain_common::platform::SafetyPlatform;
use curtain_common::state::SystemState;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::actuation::{ActuationEngine, PauseOutcome, ResumeOutcome};
use crate::monitor::{self, CycleOutcome, CycleStats};
use crate::store::{ConfigStore, LoadOutcome, StoreError};

/// Startup and lifecycle errors.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Service configuration rejected.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Store could not be read or written.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// No platform driver with this name.
    #[error("platform driver not found: {0}")]
    PlatformNotFound(String),

    /// Evaluator thread could not be started.
    #[error("failed to spawn evaluator thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// Evaluator thread panicked.
    #[error("evaluator thread panicked")]
    MonitorPanicked,
}

/// State guarded by the supervisor lock.
#[derive(Debug)]
pub struct GuardState {
    pub(crate) registry: IoRegistry,
    pub(crate) actuators: ActuatorTable,
    pub(crate) limited_speed: u8,
    pub(crate) system_state: SystemState,
}

impl Default for GuardState {
    fn default() -> Self {
        Self {
            registry: IoRegistry::new(),
            actuators: ActuatorTable::new(),
            limited_speed: DEFAULT_LIMITED_SPEED,
            system_state: SystemState::Normal,
        }
    }
}

/// Supervisor context shared by the evaluator thread and command callers.
pub struct GuardCore {
    state: Mutex<GuardState>,
    platform: Arc<dyn SafetyPlatform>,
    store: ConfigStore,
    actuator_ids: Vec<ActuatorId>,
    poll_period: Duration,
    confirm_wait: Duration,
    /// Evaluator run flag; set from signal handlers without taking the lock.
    running: Arc<AtomicBool>,
}

impl GuardCore {
    /// Create a supervisor with an empty registry.
    ///
    /// # Errors
    /// Returns `GuardError::Config` if the configuration does not validate.
    pub fn new(config: &GuardConfig, platform: Arc<dyn SafetyPlatform>) -> Result<Self, GuardError> {
        config.validate()?;

        info!(
            "GuardCore created: platform={}, actuators={:?}, poll={}ms, confirm={}ms, store={:?}",
            platform.name(),
            config.actuators.ids,
            config.monitor.poll_period_ms,
            config.monitor.confirm_wait_ms,
            config.store.path
        );

        Ok(Self {
            state: Mutex::new(GuardState::default()),
            platform,
            store: ConfigStore::new(&config.store.path),
            actuator_ids: config.actuators.ids.clone(),
            poll_period: config.monitor.poll_period(),
            confirm_wait: config.monitor.confirm_wait(),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Load entries and limited speed from the store into the registry.
    ///
    /// On error the current (default) configuration is kept and the damaged
    /// file is left untouched.
    pub fn load_configuration(&self) -> Result<LoadOutcome, GuardError> {
        let outcome = self.store.load()?;
        let loaded = match &outcome {
            LoadOutcome::Loaded(c) | LoadOutcome::Created(c) => c.clone(),
        };

        let mut state = self.state.lock();
        state.registry.replace(loaded.inputs);
        state.limited_speed = loaded.limited_speed;
        info!(
            "Configuration active: {} input(s), limited speed {}%",
            state.registry.configured_count(),
            state.limited_speed
        );
        Ok(outcome)
    }

    /// Create a tracking entry for every managed actuator.
    pub fn bootstrap_actuators(&self) {
        let mut state = self.state.lock();
        let engine = self.engine();
        for &id in &self.actuator_ids {
            engine.state_for(&mut state.actuators, id);
        }
        info!("Tracking {} actuator(s)", state.actuators.len());
    }

    /// Running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Whether the evaluator is (or should keep) running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the evaluator to exit after its current cycle.
    pub fn request_stop(&self) {
        info!("Stop requested");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Start the evaluator on a dedicated thread.
    ///
    /// # Errors
    /// Returns `GuardError::ThreadSpawn` if the thread cannot be created.
    pub fn start_monitor(self: &Arc<Self>) -> Result<MonitorHandle, GuardError> {
        self.running.store(true, Ordering::SeqCst);
        let core = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("curtain-monitor".to_string())
            .spawn(move || monitor::run(&core))
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                GuardError::ThreadSpawn(e)
            })?;
        Ok(MonitorHandle {
            handle,
            running: self.running_flag(),
        })
    }

    /// Run one evaluator cycle now.
    pub fn run_cycle(&self) -> CycleOutcome {
        let mut state = self.state.lock();
        let engine = self.engine();
        monitor::evaluate(&mut state, self.platform.as_ref(), &engine, Utc::now())
    }

    /// Pause every managed actuator.
    pub fn pause_all_actuators(&self) -> Vec<(ActuatorId, PauseOutcome)> {
        let mut state = self.state.lock();
        self.engine().pause_all(&mut state.actuators)
    }

    /// Resume every actuator this supervisor paused.
    pub fn resume_all_actuators(&self) -> Vec<(ActuatorId, ResumeOutcome)> {
        let mut state = self.state.lock();
        self.engine().resume_all(&mut state.actuators)
    }

    pub fn system_state(&self) -> SystemState {
        self.state.lock().system_state
    }

    pub fn limited_speed(&self) -> u8 {
        self.state.lock().limited_speed
    }

    /// Latch of input `index`, or `None` if the slot is not configured.
    pub fn is_triggered(&self, index: usize) -> Option<bool> {
        self.state.lock().registry.get(index).map(|i| i.is_triggered())
    }

    /// When input `index` last latched.
    pub fn triggered_at(&self, index: usize) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .registry
            .get(index)
            .and_then(|i| i.triggered_at())
    }

    /// Snapshot of one actuator's bookkeeping.
    pub fn actuator_state(&self, id: ActuatorId) -> Option<ActuatorState> {
        self.state.lock().actuators.get(id).cloned()
    }

    pub fn actuator_ids(&self) -> &[ActuatorId] {
        &self.actuator_ids
    }

    pub fn platform(&self) -> &Arc<dyn SafetyPlatform> {
        &self.platform
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn poll_period(&self) -> Duration {
        self.poll_period
    }

    pub(crate) fn lock_state(&self) -> parking_lot::MutexGuard<'_, GuardState> {
        self.state.lock()
    }

    pub(crate) fn engine(&self) -> ActuationEngine<'_> {
        ActuationEngine::new(self.platform.as_ref(), &self.actuator_ids, self.confirm_wait)
    }
}

/// Handle to a running evaluator thread.
pub struct MonitorHandle {
    handle: JoinHandle<CycleStats>,
    running: Arc<AtomicBool>,
}

impl MonitorHandle {
    /// Signal the evaluator to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the evaluator to exit and return its statistics.
    ///
    /// Does not signal a stop; call [`MonitorHandle::stop`] first or clear
    /// the running flag elsewhere.
    pub fn join(self) -> Result<CycleStats, GuardError> {
        self.handle.join().map_err(|_| {
            warn!("Evaluator thread terminated by panic");
            GuardError::MonitorPanicked
        })
    }
}
