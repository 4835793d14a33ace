use std::path::Path;

use anyhow::Result;
use tracing::instrument;

use crate::document::Document;
use crate::pipeline::{ExportStats, LayerExporter};

use super::PipelineOptions;

/// Export every included layer of a document to `out_dir`.
#[instrument(skip_all, fields(source = %source.display()))]
pub fn run_export(source: &Path, out_dir: &Path, options: &PipelineOptions) -> Result<ExportStats> {
    let document = Document::load(source)?;
    let mut exporter = LayerExporter::new(document, options.build_settings());
    exporter.export(out_dir, true)
}
