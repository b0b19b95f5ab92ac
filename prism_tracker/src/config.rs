//! Tracker configuration.

use std::time::Duration;

use geocom::{EdmMode, InclinationMode};
use serde::{Deserialize, Serialize};

/// Angular extent of a search window [rad].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSize {
    pub hz: f64,
    pub v: f64,
}

/// PowerSearch distance restriction [m].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceLimits {
    pub min: i32,
    pub max: i32,
}

/// Configuration for the tracking controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Consecutive bad measurements tolerated before searching again
    pub failure_threshold: usize,
    /// How long the instrument waits for a distance [ms]
    pub measurement_wait_ms: u32,
    pub inclination_mode: InclinationMode,
    /// EDM mode configured once the prism is locked
    pub edm_mode: EdmMode,
    /// Search centre used before any prism position is known [rad]
    pub home_hz: f64,
    pub home_v: f64,
    /// Window of the first search attempt
    pub narrow_window: WindowSize,
    /// Window of every later attempt
    pub wide_window: WindowSize,
    /// Fine adjust search ranges [rad]
    pub fine_adjust_hz: f64,
    pub fine_adjust_v: f64,
    pub distance_limits: Option<DistanceLimits>,
    /// Pause between failed search attempts while acquiring [ms]
    pub acquire_retry_ms: u64,
    /// Pause between failed search attempts while recovering a lost prism [ms]
    pub recover_retry_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 100,
            measurement_wait_ms: 150,
            inclination_mode: InclinationMode::Automatic,
            edm_mode: EdmMode::ContFast,
            home_hz: 0.0,
            home_v: 1.57,
            narrow_window: WindowSize { hz: 1.0, v: 1.0 },
            wide_window: WindowSize { hz: 6.28, v: 2.0 },
            fine_adjust_hz: 20f64.to_radians(),
            fine_adjust_v: 20f64.to_radians(),
            distance_limits: Some(DistanceLimits { min: 5, max: 100 }),
            acquire_retry_ms: 100,
            recover_retry_ms: 2000,
        }
    }
}

impl TrackerConfig {
    pub fn acquire_retry(&self) -> Duration {
        Duration::from_millis(self.acquire_retry_ms)
    }

    pub fn recover_retry(&self) -> Duration {
        Duration::from_millis(self.recover_retry_ms)
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from JSON file. Missing fields take their default value.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.failure_threshold, 100);
        assert_eq!(config.edm_mode, EdmMode::ContFast);
        assert_relative_eq!(config.fine_adjust_hz, 0.349_065_850_4, epsilon = 1e-9);
        assert_eq!(config.acquire_retry(), Duration::from_millis(100));
        assert_eq!(config.recover_retry(), Duration::from_secs(2));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");

        let config = TrackerConfig {
            failure_threshold: 20,
            distance_limits: None,
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();

        let loaded = TrackerConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        std::fs::write(&path, r#"{ "failure_threshold": 5 }"#).unwrap();

        let loaded = TrackerConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.failure_threshold, 5);
        assert_eq!(loaded.measurement_wait_ms, 150);
    }

    #[test]
    fn test_invalid_file_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        std::fs::write(&path, "not json").unwrap();

        let err = TrackerConfig::load_from_file(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
