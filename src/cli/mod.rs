mod export;
mod list;

pub use export::run_export;
pub use list::run_list;

use crate::pipeline::{ExportSettings, OutputFormat};

/// Shared pipeline flags for the export/list commands.
#[derive(Debug, Default, Clone)]
pub struct PipelineOptions {
    /// Flatten groups: no output subdirectories, global name scope.
    pub flat: bool,
    /// Withhold tagged layers from the export.
    pub skip_tagged: bool,
    /// Skip layers that are not effectively visible.
    pub only_visible: bool,
    pub format: Option<OutputFormat>,
}

impl PipelineOptions {
    /// Build pipeline settings from the built-in defaults plus these flags.
    pub fn build_settings(&self) -> ExportSettings {
        let mut settings = ExportSettings::default();
        if self.flat {
            settings.layer_groups_as_folders = false;
        }
        if self.skip_tagged {
            settings.process_tagged_layers = true;
        }
        if self.only_visible {
            settings.ignore_invisible = true;
        }
        if let Some(format) = self.format {
            settings.image_format = format;
        }
        settings
    }
}
