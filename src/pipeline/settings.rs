//! Export settings consulted on every pipeline pass.

use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::item::ItemId;

/// Output bitmap format for exported layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Bmp,
    Tiff,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Bmp => "bmp",
            Self::Tiff => "tiff",
        }
    }

    pub fn to_image_format(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Bmp => image::ImageFormat::Bmp,
            Self::Tiff => image::ImageFormat::Tiff,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "bmp" => Ok(Self::Bmp),
            "tif" | "tiff" => Ok(Self::Tiff),
            other => anyhow::bail!("Unknown image format: {other}"),
        }
    }
}

/// Settings driving filtering, naming scope and output of the export
/// pipeline. The preview layer reads these every pass and overrides them
/// scope-locally when rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Export only the layers in `selected_ids`.
    pub export_only_selected_layers: bool,
    /// Treat tagged layers specially: they are withheld from normal export.
    pub process_tagged_layers: bool,
    /// Mirror layer groups as output directories (collision scope follows).
    pub layer_groups_as_folders: bool,
    /// Skip layers that are not effectively visible.
    pub ignore_invisible: bool,
    pub image_format: OutputFormat,
    /// Current selection, maintained by the preview layer.
    #[serde(skip)]
    pub selected_ids: HashSet<ItemId>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            export_only_selected_layers: false,
            process_tagged_layers: false,
            layer_groups_as_folders: true,
            ignore_invisible: false,
            image_format: OutputFormat::Png,
            selected_ids: HashSet::new(),
        }
    }
}

impl ExportSettings {
    /// Load persisted defaults from `~/.config/layerex/settings.json`.
    /// Missing or unreadable files fall back to the built-in defaults.
    pub fn load_defaults() -> Self {
        let Some(path) = settings_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                debug!(path = %path.display(), %err, "ignoring malformed settings file");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persist the current settings as the defaults for future runs.
    pub fn save_defaults(&self) -> Result<()> {
        let path = settings_path().context("Failed to determine config directory")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, text)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        Ok(())
    }
}

fn settings_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "layerex")
        .map(|dirs| dirs.config_dir().join("settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ExportSettings::default();
        assert!(!settings.export_only_selected_layers);
        assert!(!settings.process_tagged_layers);
        assert!(settings.layer_groups_as_folders);
        assert!(!settings.ignore_invisible);
        assert_eq!(settings.image_format, OutputFormat::Png);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("png".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("JPEG".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("tif".parse::<OutputFormat>().unwrap(), OutputFormat::Tiff);
        assert!("webp".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_settings_json_roundtrip() {
        let mut settings = ExportSettings::default();
        settings.process_tagged_layers = true;
        settings.image_format = OutputFormat::Jpeg;

        let text = serde_json::to_string(&settings).unwrap();
        let back: ExportSettings = serde_json::from_str(&text).unwrap();

        assert!(back.process_tagged_layers);
        assert_eq!(back.image_format, OutputFormat::Jpeg);
        assert!(back.layer_groups_as_folders);
    }

    #[test]
    fn test_partial_settings_file_uses_defaults() {
        let back: ExportSettings = serde_json::from_str(r#"{"ignore_invisible": true}"#).unwrap();
        assert!(back.ignore_invisible);
        assert!(back.layer_groups_as_folders);
        assert_eq!(back.image_format, OutputFormat::Png);
    }
}
