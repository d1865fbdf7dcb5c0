use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid engine config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize engine config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Engine settings, read from `<config dir>/beatgraph/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Requested device rate; `None` uses the device default.
    pub sample_rate: Option<u32>,
    /// Largest block the render graph processes at once.
    pub max_block_frames: usize,
    /// Frames of drift tolerated before a time-stretch source is corrected.
    pub drift_tolerance_frames: u64,
    /// Tempo for mixes that don't set one.
    pub default_tempo: f64,
    pub delay_beats: f64,
    pub delay_feedback: f64,
    /// Longest delay line allocated per delay node, seconds.
    pub max_delay_secs: f64,
    pub graph_queue_capacity: usize,
    pub event_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            max_block_frames: 512,
            drift_tolerance_frames: 512,
            default_tempo: 128.0,
            delay_beats: 0.75,
            delay_feedback: 0.35,
            max_delay_secs: 4.0,
            graph_queue_capacity: 4,
            event_queue_capacity: 256,
        }
    }
}

impl EngineConfig {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("beatgraph").join("config.toml"))
    }

    /// Load from the user config dir, falling back to defaults when missing or invalid.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(ConfigError::Read { .. }) => Self::default(),
            Err(err) => {
                log::warn!("{err}, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Frames rendered per graph pass. Never larger than the drift tolerance, so a source
    /// stopping mid-block can't read as drift.
    pub fn block_frames(&self) -> usize {
        let tolerance = usize::try_from(self.drift_tolerance_frames).unwrap_or(usize::MAX);
        self.max_block_frames.min(tolerance).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = EngineConfig::from_toml_str("max_block_frames = 256\nsample_rate = 48000\n").unwrap();
        assert_eq!(config.max_block_frames, 256);
        assert_eq!(config.sample_rate, Some(48000));
        assert_eq!(config.drift_tolerance_frames, 512);
        assert_eq!(config.default_tempo, 128.0);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        assert!(matches!(
            EngineConfig::from_toml_str("max_block_frames = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_block_frames_capped_by_tolerance() {
        let config = EngineConfig {
            max_block_frames: 2048,
            drift_tolerance_frames: 512,
            ..EngineConfig::default()
        };
        assert_eq!(config.block_frames(), 512);

        let config = EngineConfig {
            max_block_frames: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.block_frames(), 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = EngineConfig {
            delay_feedback: 0.5,
            ..EngineConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(EngineConfig::load_from(&path).unwrap(), config);
    }
}
