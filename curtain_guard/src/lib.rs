//! # Curtain Guard Library
//!
//! Safety-interlock supervisor for robot actuators guarded by light-curtain
//! inputs. Inputs latch on their trigger level, the latch set decides the
//! system state (`NORMAL` / `LIMITED`), and state changes pause or resume
//! the managed actuators' jobs.
//!
//! # Module Structure
//!
//! - [`core`] - GuardCore supervisor context, evaluator thread management
//! - [`monitor`] - Safety Evaluator cycle and polling loop
//! - [`actuation`] - Pause/resume sequencing with confirmation
//! - [`command`] - Reconfiguration, manual reset and request dispatch
//! - [`store`] - Durable JSON store for inputs and limited speed
//! - [`drivers`] - Platform drivers and their registry
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        curtain_guard                             │
//! │  ┌─────────────┐    ┌──────────────────┐    ┌────────────────┐   │
//! │  │  Command    │───►│    GuardCore     │◄───│   Evaluator    │   │
//! │  │  Handler    │    │ Mutex<GuardState>│    │ (own thread)   │   │
//! │  └──────┬──────┘    └────────┬─────────┘    └────────────────┘   │
//! │         │                    │                                   │
//! │         ▼                    ▼                                   │
//! │  ┌─────────────┐    ┌──────────────────┐                         │
//! │  │ ConfigStore │    │ ActuationEngine  │                         │
//! │  │   (JSON)    │    └────────┬─────────┘                         │
//! │  └─────────────┘             ▼                                   │
//! │                     ┌──────────────────┐                         │
//! │                     │ SafetyPlatform   │ (trait object)          │
//! │                     └──────────────────┘                         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod actuation;
pub mod command;
pub mod core;
pub mod drivers;
pub mod monitor;
pub mod store;

// Re-export key types for convenience
pub use crate::actuation::{ActuationEngine, PauseOutcome, ResumeOutcome};
pub use crate::command::{handle_line, handle_request, Reply, ResetOutcome, UpdateError};
pub use crate::core::{GuardCore, GuardError, MonitorHandle};
pub use crate::drivers::PlatformRegistry;
pub use crate::monitor::{CycleOutcome, CycleStats};
pub use crate::store::{ConfigStore, LoadOutcome, StoreError, StoredConfig};
