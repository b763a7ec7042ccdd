//! Curtain Common Library
//!
//! Shared constants, configuration loading and data model for the
//! light-curtain safety supervisor workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Index ranges, timing defaults and paths
//! - [`config`] - Configuration loading traits and the service config schema
//! - [`io`] - Safety-input definitions and the indexed IO registry
//! - [`actuator`] - Per-actuator run mode and notification bookkeeping
//! - [`state`] - System-wide safety state
//! - [`platform`] - Host platform contract (I/O read, job control, reporting)
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use curtain_common::prelude::*;
//! use curtain_common::config::{ConfigLoader, GuardConfig};
//! ```

pub mod actuator;
pub mod config;
pub mod consts;
pub mod io;
pub mod platform;
pub mod prelude;
pub mod state;
