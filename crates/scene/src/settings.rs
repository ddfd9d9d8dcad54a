use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors from loading the settings file.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Load(#[from] std::io::Error),
    #[error("malformed settings file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Process-wide configuration consumed at loop construction.
///
/// Every key is optional in the stored file; a missing key falls back to its
/// hard-coded default. The loop copies these values at construction, so
/// mutating a `Settings` afterwards never affects an existing loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Width of the display viewport in pixels.
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    /// Height of the display viewport in pixels.
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    /// Speed of the blocking run driver as a fraction of real time.
    #[serde(default = "default_simulation_speed")]
    pub simulation_speed: f64,
    /// Length of one physics sub-step in seconds.
    #[serde(default = "default_update_delta_time")]
    pub update_delta_time: f64,
}

fn default_window_width() -> u32 {
    800
}

fn default_window_height() -> u32 {
    600
}

fn default_simulation_speed() -> f64 {
    1.0
}

fn default_update_delta_time() -> f64 {
    0.005
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_width: default_window_width(),
            window_height: default_window_height(),
            simulation_speed: default_simulation_speed(),
            update_delta_time: default_update_delta_time(),
        }
    }
}

impl Settings {
    /// The well-known per-user settings file location.
    pub fn default_path() -> PathBuf {
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("HOMEPATH"))
            .unwrap_or_else(|| "/".into());
        PathBuf::from(home).join(".roadsim.yaml")
    }

    /// Load settings from the well-known location.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(Self::default_path())
    }

    /// Load settings from an explicit path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading settings");
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.window_width, 800);
        assert_eq!(s.window_height, 600);
        assert_eq!(s.simulation_speed, 1.0);
        assert_eq!(s.update_delta_time, 0.005);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"window_width: 1024\n").unwrap();

        let s = Settings::load_from(file.path()).unwrap();
        assert_eq!(s.window_width, 1024);
        assert_eq!(s.window_height, 600);
        assert_eq!(s.update_delta_time, 0.005);
    }

    #[test]
    fn full_file_roundtrips() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"window_width: 640\nwindow_height: 480\nsimulation_speed: 0.25\nupdate_delta_time: 0.01\n",
        )
        .unwrap();

        let s = Settings::load_from(file.path()).unwrap();
        assert_eq!(s.window_width, 640);
        assert_eq!(s.window_height, 480);
        assert_eq!(s.simulation_speed, 0.25);
        assert_eq!(s.update_delta_time, 0.01);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = Settings::load_from("/nonexistent/.roadsim.yaml").unwrap_err();
        assert!(matches!(err, SettingsError::Load(_)));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"window_width: [not a number\n").unwrap();

        let err = Settings::load_from(file.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
