//! On-disk configuration.
//
// A single TOML file under the platform config directory. Missing file gets
// the defaults written out; an unreadable or malformed file logs a warning
// and falls back to defaults rather than refusing to start.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use arrangement::WindowArrangement;
use stereo_render::RenderConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub render: RenderSection,
    pub arrangement: ArrangementSection,
    pub session: SessionSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSection {
    pub eye_width: u32,
    pub eye_height: u32,
    pub sample_count: u32,
    /// Composite from one shared texture array instead of discrete
    /// per-window textures.
    pub layered_windows: bool,
    pub layer_width: u32,
    pub layer_height: u32,
    pub max_layers: u32,
    pub frames_in_flight: usize,
}

impl Default for RenderSection {
    fn default() -> Self {
        let defaults = RenderConfig::default();
        Self {
            eye_width: defaults.eye_width,
            eye_height: defaults.eye_height,
            sample_count: defaults.sample_count,
            layered_windows: defaults.layered_windows,
            layer_width: defaults.layer_width,
            layer_height: defaults.layer_height,
            max_layers: defaults.max_layers,
            frames_in_flight: defaults.frames_in_flight,
        }
    }
}

impl RenderSection {
    pub fn to_render_config(&self) -> RenderConfig {
        RenderConfig {
            eye_width: self.eye_width,
            eye_height: self.eye_height,
            sample_count: self.sample_count,
            layered_windows: self.layered_windows,
            layer_width: self.layer_width,
            layer_height: self.layer_height,
            max_layers: self.max_layers,
            frames_in_flight: self.frames_in_flight,
            ..RenderConfig::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrangementSection {
    pub mode: WindowArrangement,
}

impl Default for ArrangementSection {
    fn default() -> Self {
        Self {
            mode: WindowArrangement::Grid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Simulated display refresh rate.
    pub refresh_hz: f64,
    /// Frames the simulated session runs before terminating; 0 runs until
    /// interrupted.
    pub demo_frames: u64,
    /// Synthetic windows fed by the built-in capture source.
    pub window_count: u32,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            refresh_hz: 90.0,
            demo_frames: 900,
            window_count: 4,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "deskstream", "deskstream")?;
        Some(proj_dirs.config_dir().join("deskstream.toml"))
    }

    /// Load from `path`, writing the defaults there first if nothing exists.
    pub fn load_or_init(path: &Path) -> Config {
        if !path.exists() {
            let config = Config::default();
            config.save(path);
            return config;
        }
        match fs::read_to_string(path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "malformed config, using defaults"
                    );
                    Config::default()
                }
            },
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "could not read config, using defaults"
                );
                Config::default()
            }
        }
    }

    pub fn save(&self, path: &Path) {
        let serialized = match toml::to_string_pretty(self) {
            Ok(serialized) => serialized,
            Err(err) => {
                tracing::error!(error = %err, "could not serialize config");
                return;
            }
        };
        if let Some(parent) = path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                tracing::error!(
                    path = %parent.display(),
                    error = %err,
                    "could not create config directory"
                );
                return;
            }
        }
        if let Err(err) = fs::write(path, serialized) {
            tracing::error!(path = %path.display(), error = %err, "could not write config");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskstream.toml");

        let config = Config::load_or_init(&path);
        assert!(path.exists());
        assert_eq!(config.session.window_count, 4);
        assert_eq!(config.arrangement.mode, WindowArrangement::Grid);
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskstream.toml");

        let mut config = Config::default();
        config.arrangement.mode = WindowArrangement::Curved;
        config.render.sample_count = 8;
        config.save(&path);

        let loaded = Config::load_or_init(&path);
        assert_eq!(loaded.arrangement.mode, WindowArrangement::Curved);
        assert_eq!(loaded.render.sample_count, 8);
    }

    #[test]
    fn test_malformed_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskstream.toml");
        fs::write(&path, "render = \"not a table\"").unwrap();

        let config = Config::load_or_init(&path);
        assert_eq!(config.render.sample_count, RenderSection::default().sample_count);
    }

    #[test]
    fn test_partial_file_fills_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deskstream.toml");
        fs::write(&path, "[session]\nwindow_count = 9\n").unwrap();

        let config = Config::load_or_init(&path);
        assert_eq!(config.session.window_count, 9);
        assert_eq!(config.render.eye_width, RenderSection::default().eye_width);
    }
}
