//! Environment configuration loader — reads an env config JSON for the imitation task.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::angles::AngleRepresentation;
use crate::error::MimicError;
use crate::reward::RewardWeights;

/// Immutable settings for one imitation environment, loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Angle layout in observations.
    pub state_representation: AngleRepresentation,

    /// Angle layout in actions.
    pub action_representation: AngleRepresentation,

    pub p_gain: f64,
    pub d_gain: f64,

    /// Symmetric torque clamp per DOF.
    pub max_torque: f64,

    /// Action bounds are `±max_angle · π` per slot.
    pub max_angle: f64,

    /// Physics steps per control step.
    pub substeps: usize,

    /// Episodes end once the reward drops below this.
    pub reward_cutoff: f64,

    /// Std-dev of the Gaussian noise added to non-root positions on reset.
    pub pos_init_noise: f64,

    /// Std-dev of the Gaussian noise added to non-root velocities on reset.
    pub vel_init_noise: f64,

    pub weights: RewardWeights,

    /// Seed for reset sampling; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            state_representation: AngleRepresentation::Euler,
            action_representation: AngleRepresentation::Euler,
            p_gain: 300.0,
            d_gain: 30.0,
            max_torque: 90.0,
            max_angle: 5.0,
            substeps: 4,
            reward_cutoff: 0.1,
            pos_init_noise: 0.05,
            vel_init_noise: 0.05,
            weights: RewardWeights::default(),
            seed: None,
        }
    }
}

impl EnvConfig {
    /// Load configuration from a JSON file. Falls back to defaults if the file is missing.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).context("Failed to read env config file")?;

        let config: EnvConfig =
            serde_json::from_str(&contents).context("Failed to parse env config JSON")?;

        Ok(config)
    }

    /// Reject settings the controller or reward can't work with.
    pub fn validate(&self) -> std::result::Result<(), MimicError> {
        self.weights.validate()?;

        let non_negative = [
            ("p_gain", self.p_gain),
            ("d_gain", self.d_gain),
            ("max_torque", self.max_torque),
            ("pos_init_noise", self.pos_init_noise),
            ("vel_init_noise", self.vel_init_noise),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(MimicError::invalid_config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        if self.substeps == 0 {
            return Err(MimicError::invalid_config("substeps must be at least 1"));
        }
        if !(self.max_angle > 0.0) {
            return Err(MimicError::invalid_config(format!(
                "max_angle must be positive, got {}",
                self.max_angle
            )));
        }

        if self.reward_cutoff >= self.weights.max_reward() {
            tracing::warn!(
                reward_cutoff = self.reward_cutoff,
                max_reward = self.weights.max_reward(),
                "Reward cutoff is unreachable, every episode ends after one step"
            );
        }
        if self.p_gain == 0.0 {
            tracing::warn!("Proportional gain is zero, joints will not track targets");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EnvConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: EnvConfig = serde_json::from_str(
            r#"{"action_representation": "axis_angle", "weights": {"com": {"outer": 0.2, "inner": -5}}}"#,
        )
        .unwrap();

        assert_eq!(config.action_representation, AngleRepresentation::AxisAngle);
        assert_eq!(config.state_representation, AngleRepresentation::Euler);
        assert_eq!(config.weights.com.outer, 0.2);
        assert_eq!(config.weights.pose, RewardWeights::default().pose);
        assert_eq!(config.substeps, 4);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = EnvConfig {
            d_gain: -1.0,
            ..EnvConfig::default()
        };
        assert!(matches!(config.validate(), Err(MimicError::InvalidConfig(_))));

        let config = EnvConfig {
            substeps: 0,
            ..EnvConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = EnvConfig::default();
        config.weights.end_effector.inner = 1.0;
        assert!(matches!(
            config.validate(),
            Err(MimicError::InvalidWeightSign { .. })
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = EnvConfig::load(Path::new("/nonexistent/env_config.json")).unwrap();
        assert_eq!(config, EnvConfig::default());
    }

    #[test]
    fn test_unreachable_cutoff_still_validates() {
        let config = EnvConfig {
            reward_cutoff: 1.5,
            ..EnvConfig::default()
        };
        assert!(config.reward_cutoff >= config.weights.max_reward());
        assert!(config.validate().is_ok());
    }
}
