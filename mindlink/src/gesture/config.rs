use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tuning of the selection engine. Every field has a default, so a YAML
/// file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum power of a "push" command for it to count towards a hold.
    #[serde(default = "default_push_threshold")]
    pub push_threshold: f64,
    /// Accumulated push time needed to lock a selection.
    #[serde(default = "default_hold_duration_ms")]
    pub hold_duration_ms: u64,
    /// Seconds of hold progress lost per second without a qualifying push.
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
    /// A holding device that sent nothing for this long decays on `tick`.
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
    /// Normalized tilt beyond which a frame counts towards a move.
    #[serde(default = "default_tilt_threshold")]
    pub tilt_threshold: f64,
    /// Consecutive tilted frames needed to move focus by one cell.
    #[serde(default = "default_sustain_frames")]
    pub sustain_frames: u32,
    /// Tilt in degrees that maps to a full-scale axis value.
    #[serde(default = "default_max_tilt_deg")]
    pub max_tilt_deg: f64,
    #[serde(default = "default_grid_columns")]
    pub grid_columns: usize,
    #[serde(default = "default_grid_cells")]
    pub grid_cells: usize,
}

fn default_push_threshold() -> f64 {
    0.5
}

fn default_hold_duration_ms() -> u64 {
    8000
}

fn default_decay_rate() -> f64 {
    1.0
}

fn default_stale_after_ms() -> u64 {
    500
}

fn default_tilt_threshold() -> f64 {
    0.35
}

fn default_sustain_frames() -> u32 {
    6
}

fn default_max_tilt_deg() -> f64 {
    20.0
}

fn default_grid_columns() -> usize {
    3
}

fn default_grid_cells() -> usize {
    9
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            push_threshold: default_push_threshold(),
            hold_duration_ms: default_hold_duration_ms(),
            decay_rate: default_decay_rate(),
            stale_after_ms: default_stale_after_ms(),
            tilt_threshold: default_tilt_threshold(),
            sustain_frames: default_sustain_frames(),
            max_tilt_deg: default_max_tilt_deg(),
            grid_columns: default_grid_columns(),
            grid_cells: default_grid_cells(),
        }
    }
}

impl EngineConfig {
    /// Hold duration in seconds, the unit of event timestamps.
    pub fn hold_duration(&self) -> f64 {
        self.hold_duration_ms as f64 / 1000.0
    }

    pub fn stale_after(&self) -> f64 {
        self.stale_after_ms as f64 / 1000.0
    }

    pub fn from_yaml_str(text: &str) -> Result<EngineConfig, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |name: &'static str, value: String| Err(ConfigError::Invalid { name, value });
        if self.hold_duration_ms == 0 {
            return invalid("hold_duration_ms", self.hold_duration_ms.to_string());
        }
        if !(self.decay_rate >= 0.0) {
            return invalid("decay_rate", self.decay_rate.to_string());
        }
        if self.sustain_frames == 0 {
            return invalid("sustain_frames", self.sustain_frames.to_string());
        }
        if !(self.max_tilt_deg > 0.0) {
            return invalid("max_tilt_deg", self.max_tilt_deg.to_string());
        }
        if self.grid_columns == 0 || self.grid_columns > self.grid_cells {
            return invalid("grid_columns", self.grid_columns.to_string());
        }
        if self.grid_cells % self.grid_columns != 0 {
            return invalid("grid_cells", self.grid_cells.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml_str("hold_duration_ms: 3000\ngrid_columns: 4\ngrid_cells: 12\n").unwrap();
        assert_eq!(config.hold_duration(), 3.0);
        assert_eq!(config.grid_cells, 12);
        assert_eq!(config.push_threshold, 0.5);
        assert_eq!(config.sustain_frames, 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let config = EngineConfig {
            sustain_frames: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "sustain_frames", .. })
        ));
        let config = EngineConfig {
            grid_columns: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let config = EngineConfig {
            grid_cells: 8,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { name: "grid_cells", .. })
        ));
    }

    #[test]
    fn missing_file() {
        let err = EngineConfig::from_yaml_file("/nonexistent/engine.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
