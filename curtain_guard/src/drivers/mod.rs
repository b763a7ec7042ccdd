//! Platform driver implementations and their registry.
//!
//! - [`simulation`] - In-memory platform for development and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `SafetyPlatform` trait from `curtain_common::platform`
//! 3. Register its factory in [`PlatformRegistry::with_builtin`]

pub mod simulation;

use curtain_common::actuator::ActuatorId;
use curtain_common::platform::SafetyPlatform;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::GuardError;

/// Builds a platform for the given managed actuators.
pub type PlatformFactory = fn(&[ActuatorId]) -> Arc<dyn SafetyPlatform>;

/// Registry of available platform drivers.
///
/// Constructed at startup and queried by name; no global state.
pub struct PlatformRegistry {
    factories: HashMap<&'static str, PlatformFactory>,
}

impl PlatformRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding every driver bundled with this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("simulation", create_simulation);
        registry
    }

    /// Register a factory. A second registration under the same name
    /// replaces the first.
    pub fn register(&mut self, name: &'static str, factory: PlatformFactory) {
        if self.factories.insert(name, factory).is_some() {
            warn!("Platform driver '{name}' registered twice, keeping the later one");
        }
    }

    /// Create a platform by name.
    ///
    /// # Errors
    /// `GuardError::PlatformNotFound` if no driver has that name.
    pub fn create(
        &self,
        name: &str,
        ids: &[ActuatorId],
    ) -> Result<Arc<dyn SafetyPlatform>, GuardError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| GuardError::PlatformNotFound(name.to_string()))?;
        let platform = factory(ids);
        info!("Created platform driver: {}", platform.name());
        Ok(platform)
    }

    /// Registered driver names, sorted.
    pub fn list(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn create_simulation(ids: &[ActuatorId]) -> Arc<dyn SafetyPlatform> {
    Arc::new(simulation::SimulatedPlatform::new(ids))
}
