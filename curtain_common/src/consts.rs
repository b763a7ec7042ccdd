//! System-wide constants for the curtain workspace.
//!
//! Single source of truth for index ranges, timing defaults and paths.

/// Number of addressable safety inputs (indices `0..IO_COUNT`).
pub const IO_COUNT: usize = 2049;

/// Highest valid input index.
pub const MAX_IO_INDEX: usize = IO_COUNT - 1;

/// Reset index meaning "no dedicated reset input".
pub const NO_RESET_INPUT: usize = 0;

/// Default limited-speed percentage written to a fresh store.
pub const DEFAULT_LIMITED_SPEED: u8 = 30;

/// Upper bound (inclusive) of the limited-speed percentage.
pub const MAX_LIMITED_SPEED: i64 = 100;

/// Default evaluator poll period in milliseconds.
pub const DEFAULT_POLL_PERIOD_MS: u64 = 50;

/// Default wait before re-checking run mode after a pause/resume command.
pub const DEFAULT_CONFIRM_WAIT_MS: u64 = 200;

/// Upper bound for both timing settings [ms].
pub const MAX_TIMING_MS: u64 = 10_000;

/// Actuator ids managed when the config names none.
pub const DEFAULT_ACTUATOR_IDS: [u32; 2] = [1, 2];

/// Default store location (relative to the working directory).
pub const DEFAULT_STORE_PATH: &str = "curtain_config/curtain_safety_config.json";

/// Default service name.
pub const SERVICE_NAME: &str = "curtain-guard";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert_eq!(MAX_IO_INDEX, 2048);
        assert!(NO_RESET_INPUT < IO_COUNT);
        assert!((DEFAULT_LIMITED_SPEED as i64) <= MAX_LIMITED_SPEED);
        assert!(DEFAULT_POLL_PERIOD_MS > 0 && DEFAULT_POLL_PERIOD_MS <= MAX_TIMING_MS);
        assert!(DEFAULT_CONFIRM_WAIT_MS <= MAX_TIMING_MS);
    }
}
