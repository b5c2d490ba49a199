use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{BeatDetectError, Result};

pub const DEFAULT_ATTACK: f32 = 0.6;
pub const DEFAULT_DECAY: f32 = 0.9;
pub const DEFAULT_VOLUME_SMOOTHING: f32 = 0.99;
pub const DEFAULT_BEAT_SENSITIVITY: f32 = 1.0;

/// Tuning for a [`BeatDetect`](crate::BeatDetect) engine.
///
/// Every field is optional in the JSON form; missing fields take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Smoothing coefficient applied while a band is rising.
    pub attack: f32,
    /// Smoothing coefficient applied while a band is falling.
    pub decay: f32,
    /// Smoothing coefficient of the long-run volume estimate.
    pub volume_smoothing: f32,
    /// Initial beat sensitivity. The live value is owned by the host.
    pub beat_sensitivity: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            attack: DEFAULT_ATTACK,
            decay: DEFAULT_DECAY,
            volume_smoothing: DEFAULT_VOLUME_SMOOTHING,
            beat_sensitivity: DEFAULT_BEAT_SENSITIVITY,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?;
        tracing::debug!(?path, ?config, "loaded engine configuration");
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        check_coefficient("attack", self.attack)?;
        check_coefficient("decay", self.decay)?;
        check_coefficient("volume_smoothing", self.volume_smoothing)?;

        if self.attack >= self.decay {
            return Err(BeatDetectError::invalid_config(format!(
                "attack ({}) must be smaller than decay ({})",
                self.attack, self.decay
            )));
        }

        if self.volume_smoothing < self.decay {
            return Err(BeatDetectError::invalid_config(format!(
                "volume_smoothing ({}) must not be faster than decay ({})",
                self.volume_smoothing, self.decay
            )));
        }

        if !self.beat_sensitivity.is_finite() {
            return Err(BeatDetectError::invalid_config(
                "beat_sensitivity must be a finite number",
            ));
        }

        Ok(())
    }
}

fn check_coefficient(name: &str, value: f32) -> Result<()> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(BeatDetectError::invalid_config(format!(
            "{name} must be in [0, 1), got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "beat_sensitivity": 2.5 }"#).unwrap();
        assert_eq!(config.beat_sensitivity, 2.5);
        assert_eq!(config.attack, DEFAULT_ATTACK);
        assert_eq!(config.decay, DEFAULT_DECAY);
    }

    #[test]
    fn rejects_attack_slower_than_decay() {
        let err = EngineConfig::from_json_str(r#"{ "attack": 0.95, "decay": 0.9 }"#).unwrap_err();
        assert!(matches!(err, BeatDetectError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_out_of_range_coefficients() {
        let config = EngineConfig {
            decay: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EngineConfig {
            attack: -0.1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_volume_history_faster_than_decay() {
        let config = EngineConfig {
            volume_smoothing: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = EngineConfig::from_json_str("{ attack: ").unwrap_err();
        assert!(matches!(err, BeatDetectError::Json(_)));
    }

    #[test]
    fn loads_from_file() {
        let path = std::env::temp_dir().join(format!(
            "beat-detect-config-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{ "decay": 0.95 }"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.decay, 0.95);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, BeatDetectError::Io(_)));
    }
}
