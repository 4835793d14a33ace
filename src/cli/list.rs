use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::instrument;

use crate::document::Document;
use crate::pipeline::LayerExporter;

use super::PipelineOptions;

/// Resolve the export names of a document without writing any files.
#[instrument(skip_all, fields(source = %source.display()))]
pub fn run_list(source: &Path, options: &PipelineOptions) -> Result<Vec<PathBuf>> {
    let document = Document::load(source)?;
    let mut exporter = LayerExporter::new(document, options.build_settings());
    exporter.export_paths()
}
