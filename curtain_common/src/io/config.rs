//! Safety-input definitions.
//!
//! [`InputEntry`] is the loose wire/storage form (camelCase JSON, integer
//! fields as received). [`SafetyInputConfig`] is the validated form stored
//! in the registry.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::consts::{MAX_IO_INDEX, NO_RESET_INPUT};

/// Entry validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoConfigError {
    /// `index` outside `0..=MAX_IO_INDEX`.
    #[error("input index {0} out of range 0..={MAX_IO_INDEX}")]
    IndexOutOfRange(i64),
}

/// One safety input as carried in requests, responses and the store.
///
/// # JSON Example
///
/// ```json
/// { "index": 12, "resetIndex": 40, "triggerLevel": 0, "description": "cell door" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputEntry {
    /// Input index.
    pub index: i64,
    /// Dedicated reset input; 0 = none.
    #[serde(default)]
    pub reset_index: i64,
    /// Hazard level, 0 or 1. Booleans are accepted on input; anything
    /// else is carried as -1 and normalized during validation.
    #[serde(default = "default_trigger_level", deserialize_with = "de_trigger_level")]
    pub trigger_level: i64,
    /// Free-text label.
    #[serde(default)]
    pub description: String,
}

fn default_trigger_level() -> i64 {
    1
}

fn de_trigger_level<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => i64::from(b),
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(-1),
        _ => -1,
    })
}

/// Validated definition of one configured safety input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyInputConfig {
    /// Input index, equal to its registry slot.
    pub index: usize,
    /// Dedicated reset input; [`NO_RESET_INPUT`] = none.
    pub reset_index: usize,
    /// Physical level that means "hazard present".
    pub trigger_level: bool,
    /// Free-text label.
    pub description: String,
}

impl SafetyInputConfig {
    /// Build a definition, validating the index.
    ///
    /// An out-of-range reset index is normalized to "none" and a trigger
    /// level other than 0/1 to high (1), each with a warning.
    ///
    /// # Errors
    ///
    /// `IoConfigError::IndexOutOfRange` if `entry.index` is not addressable.
    pub fn from_entry(entry: &InputEntry) -> Result<Self, IoConfigError> {
        let index = usize::try_from(entry.index)
            .ok()
            .filter(|i| *i <= MAX_IO_INDEX)
            .ok_or(IoConfigError::IndexOutOfRange(entry.index))?;

        let reset_index = match usize::try_from(entry.reset_index) {
            Ok(r) if r <= MAX_IO_INDEX => r,
            _ => {
                warn!(
                    "Input {index}: reset index {} out of range, using none",
                    entry.reset_index
                );
                NO_RESET_INPUT
            }
        };

        let trigger_level = match entry.trigger_level {
            0 => false,
            1 => true,
            other => {
                warn!("Input {index}: trigger level {other} invalid, using 1 (high)");
                true
            }
        };

        Ok(Self {
            index,
            reset_index,
            trigger_level,
            description: entry.description.clone(),
        })
    }

    /// Wire/storage form.
    pub fn to_entry(&self) -> InputEntry {
        InputEntry {
            index: self.index as i64,
            reset_index: self.reset_index as i64,
            trigger_level: i64::from(self.trigger_level),
            description: self.description.clone(),
        }
    }

    /// Dedicated reset input, if one is configured.
    #[inline]
    pub fn reset_input(&self) -> Option<usize> {
        (self.reset_index != NO_RESET_INPUT).then_some(self.reset_index)
    }

    /// Whether a physical reading means "hazard present".
    #[inline]
    pub fn is_alarm(&self, level: bool) -> bool {
        level == self.trigger_level
    }
}

/// Parse loosely-typed JSON items into entries.
///
/// Items that are not objects or lack an integer `index` are skipped with
/// a warning; one bad item never rejects the batch.
pub fn entries_from_json(items: &[serde_json::Value]) -> Vec<InputEntry> {
    items
        .iter()
        .enumerate()
        .filter_map(|(pos, item)| {
            if !item.is_object() {
                warn!("Skipping input entry #{pos}: not an object");
                return None;
            }
            match InputEntry::deserialize(item) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping input entry #{pos}: {e}");
                    None
                }
            }
        })
        .collect()
}

/// Validate a batch of entries, discarding (and logging) invalid ones.
pub fn validate_entries(entries: &[InputEntry]) -> Vec<SafetyInputConfig> {
    entries
        .iter()
        .filter_map(|e| match SafetyInputConfig::from_entry(e) {
            Ok(cfg) => Some(cfg),
            Err(err) => {
                warn!("Discarding input entry: {err}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: i64, reset_index: i64, trigger_level: i64) -> InputEntry {
        InputEntry {
            index,
            reset_index,
            trigger_level,
            description: format!("in {index}"),
        }
    }

    #[test]
    fn parses_with_defaults() {
        let e: InputEntry = serde_json::from_str(r#"{"index": 5}"#).unwrap();
        assert_eq!(e.index, 5);
        assert_eq!(e.reset_index, 0);
        assert_eq!(e.trigger_level, 1);
        assert_eq!(e.description, "");
    }

    #[test]
    fn trigger_level_accepts_bool_and_marks_garbage() {
        let e: InputEntry =
            serde_json::from_str(r#"{"index": 1, "triggerLevel": false}"#).unwrap();
        assert_eq!(e.trigger_level, 0);
        let e: InputEntry =
            serde_json::from_str(r#"{"index": 1, "triggerLevel": "high"}"#).unwrap();
        assert_eq!(e.trigger_level, -1);
    }

    #[test]
    fn missing_index_fails_to_parse() {
        assert!(serde_json::from_str::<InputEntry>(r#"{"resetIndex": 3}"#).is_err());
        assert!(serde_json::from_str::<InputEntry>(r#"{"index": "7"}"#).is_err());
    }

    #[test]
    fn index_range_checked() {
        assert!(SafetyInputConfig::from_entry(&entry(0, 0, 1)).is_ok());
        assert!(SafetyInputConfig::from_entry(&entry(2048, 0, 1)).is_ok());
        assert_eq!(
            SafetyInputConfig::from_entry(&entry(2049, 0, 1)),
            Err(IoConfigError::IndexOutOfRange(2049))
        );
        assert_eq!(
            SafetyInputConfig::from_entry(&entry(-1, 0, 1)),
            Err(IoConfigError::IndexOutOfRange(-1))
        );
    }

    #[test]
    fn reset_index_and_level_normalized() {
        let cfg = SafetyInputConfig::from_entry(&entry(3, 5000, 7)).unwrap();
        assert_eq!(cfg.reset_index, NO_RESET_INPUT);
        assert_eq!(cfg.reset_input(), None);
        assert!(cfg.trigger_level);

        let cfg = SafetyInputConfig::from_entry(&entry(3, 9, 0)).unwrap();
        assert_eq!(cfg.reset_input(), Some(9));
        assert!(!cfg.trigger_level);
        assert!(cfg.is_alarm(false));
        assert!(!cfg.is_alarm(true));
    }

    #[test]
    fn entry_round_trip_preserves_fields() {
        let original = entry(12, 40, 0);
        let cfg = SafetyInputConfig::from_entry(&original).unwrap();
        assert_eq!(cfg.to_entry(), original);
    }

    #[test]
    fn entries_from_json_skips_bad_items() {
        let items: Vec<serde_json::Value> = serde_json::from_str(
            r#"[{"index": 4, "description": "ok"}, 17, {"resetIndex": 2}, {"index": 6.5}, {"index": 8, "triggerLevel": 0}]"#,
        )
        .unwrap();
        let entries = entries_from_json(&items);
        let indices: Vec<i64> = entries.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![4, 8]);
        assert_eq!(entries[1].trigger_level, 0);
    }

    #[test]
    fn validate_entries_discards_invalid() {
        let cfgs = validate_entries(&[entry(1, 0, 1), entry(9999, 0, 1), entry(2, 0, 0)]);
        let indices: Vec<usize> = cfgs.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2]);
    }
}
