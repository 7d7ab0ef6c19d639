// SPDX-License-Identifier: MIT OR Apache-2.0
//! Navigator settings, stored as RON.

use marquee_playlist::{Frame, TrackIndex, FRAMES_PER_SECOND};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings file format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Errors loading or saving navigator settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The text is not valid settings RON
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// Serializing the settings failed
    #[error("Failed to write settings: {0}")]
    Serialize(#[from] ron::Error),
    /// The file was written by a newer player
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build understands
        supported: u32,
    },
    /// Two roles share one track
    #[error("Track {0} is used for more than one role")]
    TrackConflict(TrackIndex),
}

/// Settings of a playback navigator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Format version
    pub version: u32,
    /// How long a navigation override stays pending without a new request
    pub navigation_timeout: Duration,
    /// Master playlist track carrying scheduled content
    pub schedule_track: TrackIndex,
    /// Master playlist track carrying navigation overrides
    pub navigation_track: TrackIndex,
    /// Shortest trailing loop fragment worth splicing
    pub min_loop_fragment: Frame,
    /// How far behind the current frame already played items are kept
    pub history_frames: Frame,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            navigation_timeout: Duration::from_secs(30),
            schedule_track: 1,
            navigation_track: 2,
            min_loop_fragment: 5,
            history_frames: FRAMES_PER_SECOND * 60 * 60,
        }
    }
}

impl NavigatorConfig {
    /// Parse settings from RON text; missing fields take their defaults
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: NavigatorConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_ron_str(&content)?;
        tracing::info!("Loaded navigator settings from {:?}", path);
        Ok(config)
    }

    /// Render the settings as pretty RON
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Save the settings to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    /// Check version and track assignment
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }
        if self.schedule_track == 0 || self.schedule_track == self.navigation_track {
            return Err(ConfigError::TrackConflict(self.schedule_track));
        }
        if self.navigation_track == 0 {
            return Err(ConfigError::TrackConflict(self.navigation_track));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NavigatorConfig::default();
        assert_eq!(config.navigation_timeout, Duration::from_secs(30));
        assert_eq!(config.history_frames, 90_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_roundtrip() {
        let config = NavigatorConfig {
            navigation_timeout: Duration::from_millis(1_500),
            min_loop_fragment: 12,
            ..NavigatorConfig::default()
        };
        let text = config.to_ron_string().unwrap();
        assert_eq!(NavigatorConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = NavigatorConfig::from_ron_str("(navigation_track: 4)").unwrap();
        assert_eq!(config.navigation_track, 4);
        assert_eq!(config.schedule_track, 1);
        assert_eq!(config.min_loop_fragment, 5);
    }

    #[test]
    fn test_rejects_shared_tracks() {
        let err =
            NavigatorConfig::from_ron_str("(schedule_track: 2, navigation_track: 2)").unwrap_err();
        assert!(matches!(err, ConfigError::TrackConflict(2)));

        let err = NavigatorConfig::from_ron_str("(navigation_track: 0)").unwrap_err();
        assert!(matches!(err, ConfigError::TrackConflict(0)));
    }

    #[test]
    fn test_rejects_newer_version() {
        let err = NavigatorConfig::from_ron_str("(version: 99)").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { found: 99, .. }));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            NavigatorConfig::from_ron_str("(schedule_track: \"one\")"),
            Err(ConfigError::Parse(_))
        ));
    }
}
