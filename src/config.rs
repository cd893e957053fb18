use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File looked up in the working directory on startup.
pub const CONFIG_FILE: &str = "vox_viewer.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything the viewer lets you tune without recompiling.
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Model loaded on startup (overridden by the first CLI argument).
    pub default_model: PathBuf,
    /// Largest extent of a normalized model, in world units.
    pub target_size: f32,
    /// 0xRRGGBB
    pub background: u32,
    pub outline: OutlineConfig,
    pub highlight: HighlightConfig,
    pub snap: SnapConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineConfig {
    pub enabled: bool,
    /// 0xRRGGBB
    pub color: u32,
    /// Relative growth of the outline shell (0.0 => invisible).
    pub width: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Linear RGB written to the emissive channel of highlighted materials.
    pub emissive_tint: [f32; 3],
    /// Base color multiplier for materials without an emissive channel.
    pub brighten: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    pub translate: f32,
    pub rotate_degrees: f32,
    pub scale: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            default_model: PathBuf::from("assets/models/john.vox"),
            target_size: 60.0,
            background: 0x0b0e14,
            outline: OutlineConfig::default(),
            highlight: HighlightConfig::default(),
            snap: SnapConfig::default(),
        }
    }
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            color: 0x3388ff,
            width: 0.04,
        }
    }
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            // faint tint, not a neon sign
            emissive_tint: [0.10, 0.12, 0.18],
            brighten: 1.12,
        }
    }
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            translate: 0.1,
            rotate_degrees: 5.0,
            scale: 0.1,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(text: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text, path)
    }

    /// Config file when present and valid, defaults otherwise. A CLI model
    /// path wins. Runs before logging exists, so a bad file is handed back
    /// for [`warn_config_fallback`] to report.
    pub fn load(model_arg: Option<PathBuf>) -> (Self, Option<ConfigError>) {
        Self::load_from(Path::new(CONFIG_FILE), model_arg)
    }

    pub fn load_from(path: &Path, model_arg: Option<PathBuf>) -> (Self, Option<ConfigError>) {
        let (mut config, error) = if path.exists() {
            match Self::read(path) {
                Ok(config) => (config, None),
                Err(err) => (Self::default(), Some(err)),
            }
        } else {
            (Self::default(), None)
        };
        if let Some(model) = model_arg {
            config.default_model = model;
        }
        (config, error)
    }
}

/// Why the config file was ignored, waiting for the logger.
#[derive(Resource, Debug)]
pub struct ConfigFallback(pub ConfigError);

pub fn warn_config_fallback(mut commands: Commands, fallback: Option<Res<ConfigFallback>>) {
    if let Some(fallback) = fallback {
        warn!("{}; using defaults", fallback.0);
        commands.remove_resource::<ConfigFallback>();
    }
}

/// 0xRRGGBB -> sRGB color.
pub fn hex_color(rgb: u32) -> Color {
    Color::srgb_u8((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let config = ViewerConfig::from_json(
            r#"{ "target_size": 30.0, "snap": { "translate": 0.5 } }"#,
            Path::new("test.json"),
        )
        .unwrap();
        assert_eq!(config.target_size, 30.0);
        assert_eq!(config.snap.translate, 0.5);
        assert_eq!(config.snap.rotate_degrees, 5.0);
        assert_eq!(config.outline.color, 0x3388ff);
        assert_eq!(config.highlight.brighten, 1.12);
    }

    #[test]
    fn malformed_config_reports_path() {
        let err = ViewerConfig::from_json("{ nope", Path::new("broken.json")).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn broken_config_file_falls_back_and_keeps_the_error() {
        let path = std::env::temp_dir().join("vox_viewer_broken_config.json");
        std::fs::write(&path, "{ \"target_size\": ").unwrap();

        let (config, error) = ViewerConfig::load_from(&path, Some("cli.vox".into()));
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.target_size, 60.0);
        assert_eq!(config.default_model, PathBuf::from("cli.vox"));
        assert!(matches!(error, Some(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_config_file_is_not_an_error() {
        let path = std::env::temp_dir().join("vox_viewer_no_such_config.json");
        let (config, error) = ViewerConfig::load_from(&path, None);
        assert!(error.is_none());
        assert_eq!(config.default_model, PathBuf::from("assets/models/john.vox"));
    }

    #[test]
    fn fallback_is_reported_once() {
        let mut world = World::new();
        let err = ViewerConfig::from_json("{ nope", Path::new("broken.json")).unwrap_err();
        world.insert_resource(ConfigFallback(err));

        world.run_system_once(warn_config_fallback).unwrap();

        assert!(!world.contains_resource::<ConfigFallback>());
    }

    #[test]
    fn hex_color_splits_channels() {
        let c = hex_color(0x3388ff).to_srgba();
        assert!((c.red - 0x33 as f32 / 255.0).abs() < 1e-6);
        assert!((c.green - 0x88 as f32 / 255.0).abs() < 1e-6);
        assert!((c.blue - 1.0).abs() < 1e-6);
    }
}
