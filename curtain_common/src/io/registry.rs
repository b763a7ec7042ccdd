//! IO Registry — indexed table of configured safety inputs and their latches.
//!
//! One slot per addressable index (`0..IO_COUNT`). A slot is either empty
//! (not configured) or holds a [`SafetyInput`]; the latch lives inside the
//! input, so an unconfigured slot can never be latched.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::config::{InputEntry, SafetyInputConfig};
use crate::consts::IO_COUNT;

// ─── SafetyInput ────────────────────────────────────────────────────

/// A configured safety input plus its latch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyInput {
    config: SafetyInputConfig,
    /// Set when the latch engaged; `None` = not triggered.
    triggered_at: Option<DateTime<Utc>>,
}

impl SafetyInput {
    fn new(config: SafetyInputConfig) -> Self {
        Self {
            config,
            triggered_at: None,
        }
    }

    #[inline]
    pub fn config(&self) -> &SafetyInputConfig {
        &self.config
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.config.index
    }

    /// Latched hazard flag.
    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.triggered_at.is_some()
    }

    /// When the latch last engaged.
    #[inline]
    pub fn triggered_at(&self) -> Option<DateTime<Utc>> {
        self.triggered_at
    }

    /// Engage the latch. Returns `true` if it was not already set.
    pub fn latch(&mut self, now: DateTime<Utc>) -> bool {
        if self.triggered_at.is_some() {
            return false;
        }
        self.triggered_at = Some(now);
        true
    }

    /// Release the latch. Returns `true` if it was set.
    pub fn unlatch(&mut self) -> bool {
        self.triggered_at.take().is_some()
    }
}

// ─── IoRegistry ─────────────────────────────────────────────────────

/// Indexed table of safety inputs.
#[derive(Debug, Clone)]
pub struct IoRegistry {
    slots: Vec<Option<SafetyInput>>,
}

impl Default for IoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IoRegistry {
    /// Empty registry: every slot unconfigured.
    pub fn new() -> Self {
        Self {
            slots: vec![None; IO_COUNT],
        }
    }

    /// Build a registry from validated definitions.
    pub fn from_configs(configs: impl IntoIterator<Item = SafetyInputConfig>) -> Self {
        let mut registry = Self::new();
        registry.replace(configs);
        registry
    }

    /// Replace the whole table. Every latch starts released.
    ///
    /// When two definitions share an index the later one wins.
    pub fn replace(&mut self, configs: impl IntoIterator<Item = SafetyInputConfig>) {
        self.slots.iter_mut().for_each(|s| *s = None);
        for cfg in configs {
            let index = cfg.index;
            let Some(slot) = self.slots.get_mut(index) else {
                continue;
            };
            if slot.is_some() {
                debug!("Input {index} defined twice, keeping the later definition");
            }
            *slot = Some(SafetyInput::new(cfg));
        }
    }

    /// Input at `index`, if configured.
    pub fn get(&self, index: usize) -> Option<&SafetyInput> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Mutable input at `index`, if configured.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut SafetyInput> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Configured inputs in index order.
    pub fn configured(&self) -> impl Iterator<Item = &SafetyInput> {
        self.slots.iter().flatten()
    }

    /// Configured inputs in index order, mutable.
    pub fn configured_mut(&mut self) -> impl Iterator<Item = &mut SafetyInput> {
        self.slots.iter_mut().flatten()
    }

    pub fn configured_count(&self) -> usize {
        self.configured().count()
    }

    /// Latched inputs in index order.
    pub fn latched(&self) -> impl Iterator<Item = &SafetyInput> {
        self.configured().filter(|i| i.is_triggered())
    }

    pub fn any_latched(&self) -> bool {
        self.latched().next().is_some()
    }

    /// Release every latch. Returns how many were set.
    pub fn unlatch_all(&mut self) -> usize {
        self.configured_mut().map(SafetyInput::unlatch).filter(|released| *released).count()
    }

    /// Wire/storage form of every configured input.
    pub fn entries(&self) -> Vec<InputEntry> {
        self.configured().map(|i| i.config.to_entry()).collect()
    }
}
