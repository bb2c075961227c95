use serde::{Deserialize, Serialize};

pub const DEFAULT_UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Stored as the error when a failed mutation carries no usable message.
    pub unknown_error_message: String,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            unknown_error_message: DEFAULT_UNKNOWN_ERROR_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub sequencer: SequencerConfig,
    /// Restore the optimistic lines touched by a failed mutation. Off by
    /// default: the failed delta stays until the caller reconciles it or
    /// authoritative data clears it.
    pub rollback_optimistic_on_failure: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.sequencer.unknown_error_message, "An unknown error occurred.");
        assert!(!config.rollback_optimistic_on_failure);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: CoordinatorConfig =
            serde_json::from_str(r#"{ "rollback_optimistic_on_failure": true }"#).unwrap();
        assert!(config.rollback_optimistic_on_failure);
        assert_eq!(config.sequencer, SequencerConfig::default());

        let config: CoordinatorConfig =
            serde_json::from_str(r#"{ "sequencer": { "unknown_error_message": "Oops." } }"#)
                .unwrap();
        assert_eq!(config.sequencer.unknown_error_message, "Oops.");
        assert!(!config.rollback_optimistic_on_failure);
    }
}
