//! Safety inputs — definitions and the indexed registry.
//!
//! Definitions arrive as loose [`config::InputEntry`] values (requests or
//! the store), are validated into [`config::SafetyInputConfig`], and live
//! in the [`registry::IoRegistry`] together with their latches.

pub mod config;
pub mod registry;
