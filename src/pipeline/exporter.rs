//! The export pipeline: regenerates the item tree, renders single items and
//! writes batch exports.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use image::DynamicImage;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::document::Document;

use super::item::ItemId;
use super::naming;
use super::settings::ExportSettings;
use super::tree::ItemTree;

/// Pipeline failures the preview layer needs to classify. All of them are
/// routine from the preview's perspective: it falls back to a placeholder.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no item tree has been generated")]
    NoTree,
    #[error("item is no longer present in the layer tree")]
    ItemNotFound,
    #[error("item has no renderable content")]
    NoContent,
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to read dimensions of {}: {source}", path.display())]
    Dimensions {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },
}

/// Scoped override of a subset of [`ExportSettings`], restored when the
/// wrapped call returns.
#[derive(Debug, Default)]
pub struct SettingsOverride {
    pub export_only_selected_layers: Option<bool>,
    pub process_tagged_layers: Option<bool>,
    pub selected_ids: Option<HashSet<ItemId>>,
}

impl SettingsOverride {
    /// Restrict the pipeline to a single item.
    pub fn restrict_to(id: ItemId) -> Self {
        Self {
            export_only_selected_layers: Some(true),
            selected_ids: Some([id].into_iter().collect()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExportStats {
    pub exported: usize,
    pub failed: usize,
    pub total: usize,
}

/// Drives the export pipeline over one document.
pub struct LayerExporter {
    pub document: Document,
    pub settings: ExportSettings,
    tree: Option<ItemTree>,
}

impl LayerExporter {
    pub fn new(document: Document, settings: ExportSettings) -> Self {
        Self {
            document,
            settings,
            tree: None,
        }
    }

    /// The item tree from the most recent pipeline run, if any.
    pub fn tree(&self) -> Option<&ItemTree> {
        self.tree.as_ref()
    }

    pub fn tree_mut(&mut self) -> Option<&mut ItemTree> {
        self.tree.as_mut()
    }

    /// Re-run the pipeline: rebuild or refresh the item tree, assign export
    /// names and install the settings-driven filter rules.
    ///
    /// With `reset` the tree is rebuilt from the document; otherwise an
    /// existing tree keeps its structure and only element fields are
    /// refreshed. Ids are stable either way.
    pub fn regenerate(&mut self, reset: bool) -> &mut ItemTree {
        self.regenerate_with(reset, None)
    }

    /// Like [`regenerate`](Self::regenerate), but optionally adopting a
    /// caller-supplied tree instead of the exporter's own.
    pub fn regenerate_with(&mut self, reset: bool, adopt: Option<ItemTree>) -> &mut ItemTree {
        let mut tree = match adopt {
            Some(tree) => tree,
            None => match self.tree.take() {
                Some(mut tree) if !reset => {
                    tree.refresh_from_document(&self.document);
                    tree
                }
                _ => ItemTree::from_document(&self.document),
            },
        };

        naming::assign_export_names(&mut tree, self.settings.layer_groups_as_folders);
        self.install_filter_rules(&mut tree);

        debug!(items = tree.len_all(), reset, "pipeline regenerated item tree");
        self.tree.insert(tree)
    }

    fn install_filter_rules(&self, tree: &mut ItemTree) {
        use super::filter::{rules, FilterRule};

        tree.filter.push(FilterRule::LeavesOnly);

        if self.settings.ignore_invisible {
            tree.filter.push(FilterRule::VisibleOnly);
        } else {
            tree.filter.remove(rules::VISIBLE_ONLY);
        }

        if self.settings.export_only_selected_layers {
            tree.filter
                .push(FilterRule::InSelection(self.settings.selected_ids.clone()));
        } else {
            tree.filter.remove(rules::IN_SELECTION);
        }

        if self.settings.process_tagged_layers {
            tree.filter.push(FilterRule::HasNoTags);
        } else {
            tree.filter.remove(rules::HAS_NO_TAGS);
        }
    }

    /// Run `f` with some settings overridden, restoring the previous values
    /// afterwards regardless of the outcome.
    pub fn with_overridden_settings<T>(
        &mut self,
        overrides: SettingsOverride,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let saved = self.settings.clone();

        if let Some(value) = overrides.export_only_selected_layers {
            self.settings.export_only_selected_layers = value;
        }
        if let Some(value) = overrides.process_tagged_layers {
            self.settings.process_tagged_layers = value;
        }
        if let Some(value) = overrides.selected_ids {
            self.settings.selected_ids = value;
        }

        let result = f(self);
        self.settings = saved;
        result
    }

    /// Natural pixel dimensions of an item's source bitmap, read from the
    /// file header without decoding.
    pub fn natural_size(&self, id: ItemId) -> Result<(u32, u32), PipelineError> {
        let tree = self.tree.as_ref().ok_or(PipelineError::NoTree)?;
        let item = tree.get(id).ok_or(PipelineError::ItemNotFound)?;
        let source = item.source.as_ref().ok_or(PipelineError::NoContent)?;
        let path = self.resolve_source(source);

        let size = imagesize::size(&path).map_err(|source| PipelineError::Dimensions {
            path: path.clone(),
            source,
        })?;
        Ok((size.width as u32, size.height as u32))
    }

    /// Run the pipeline restricted to a single item and return its decoded
    /// bitmap. The exporter's settings and the tree's filter stack are
    /// restored before returning, even on failure.
    pub fn render_item(&mut self, id: ItemId) -> Result<DynamicImage, PipelineError> {
        let saved_filter = self.tree.as_ref().map(|tree| tree.filter.clone());

        let result = self.with_overridden_settings(SettingsOverride::restrict_to(id), |exporter| {
            exporter.regenerate(false);
            let tree = exporter.tree.as_ref().ok_or(PipelineError::NoTree)?;
            let item = tree.get(id).ok_or(PipelineError::ItemNotFound)?;
            let source = item.source.clone().ok_or(PipelineError::NoContent)?;
            let path = exporter.resolve_source(&source);

            image::open(&path).map_err(|source| PipelineError::Decode { path, source })
        });

        if let (Some(filter), Some(tree)) = (saved_filter, self.tree.as_mut()) {
            tree.filter = filter;
        }

        result
    }

    /// Export every included leaf to `out_dir`. Layer groups become
    /// subdirectories when `layer_groups_as_folders` is set; otherwise the
    /// output is flat with globally uniquified names.
    #[instrument(skip(self, out_dir), fields(out_dir = %out_dir.display()))]
    pub fn export(&mut self, out_dir: &Path, show_progress: bool) -> Result<ExportStats> {
        self.regenerate(true);

        let jobs = self.collect_jobs()?;
        let total = jobs.len();
        info!(total, "starting export");

        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

        let progress = if show_progress {
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("    {bar:40.cyan/blue} {pos}/{len} ({percent}%) | {msg}")
                    .unwrap()
                    .progress_chars("██░"),
            );
            bar.set_message("exporting layers");
            bar
        } else {
            ProgressBar::hidden()
        };

        let format = self.settings.image_format;
        let failed = AtomicUsize::new(0);

        jobs.par_iter().for_each(|job| {
            if let Err(err) = write_layer(job, out_dir, format) {
                warn!(layer = %job.relative_path.display(), error = %err, "failed to export layer");
                failed.fetch_add(1, Ordering::Relaxed);
            }
            progress.inc(1);
        });

        let failed = failed.load(Ordering::Relaxed);
        let stats = ExportStats {
            exported: total - failed,
            failed,
            total,
        };

        progress.finish_and_clear();
        info!(exported = stats.exported, failed = stats.failed, "export complete");

        Ok(stats)
    }

    /// Relative output paths of every leaf the current settings would
    /// export, in display order.
    pub fn export_paths(&mut self) -> Result<Vec<PathBuf>> {
        Ok(self
            .collect_jobs()?
            .into_iter()
            .map(|job| job.relative_path)
            .collect())
    }

    fn collect_jobs(&mut self) -> Result<Vec<ExportJob>> {
        if self.tree.is_none() {
            self.regenerate(true);
        }
        let folders = self.settings.layer_groups_as_folders;
        let extension = self.settings.image_format.extension();
        let base_dir = self.document.base_dir.clone();
        let tree = self.tree.as_ref().ok_or(PipelineError::NoTree)?;

        let mut jobs = Vec::new();
        for item in tree.iter() {
            let Some(source) = item.source.as_ref() else {
                continue;
            };

            let mut relative_path = PathBuf::new();
            if folders {
                for ancestor in tree.ancestors(item.id).into_iter().rev() {
                    if let Some(parent) = tree.get(ancestor) {
                        relative_path.push(&parent.name);
                    }
                }
            }
            relative_path.push(format!("{}.{}", item.name, extension));

            jobs.push(ExportJob {
                relative_path,
                source: resolve_against(&base_dir, source),
            });
        }
        Ok(jobs)
    }

    fn resolve_source(&self, source: &Path) -> PathBuf {
        resolve_against(&self.document.base_dir, source)
    }
}

struct ExportJob {
    relative_path: PathBuf,
    source: PathBuf,
}

fn resolve_against(base_dir: &Path, source: &Path) -> PathBuf {
    if source.is_absolute() {
        source.to_path_buf()
    } else {
        base_dir.join(source)
    }
}

fn write_layer(job: &ExportJob, out_dir: &Path, format: super::OutputFormat) -> Result<()> {
    let dest = out_dir.join(&job.relative_path);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let img = image::open(&job.source)
        .with_context(|| format!("Failed to decode {}", job.source.display()))?;

    // Formats without an alpha channel need flattening first
    let img = match format {
        super::OutputFormat::Jpeg | super::OutputFormat::Bmp => {
            DynamicImage::ImageRgb8(img.to_rgb8())
        }
        _ => img,
    };

    img.save_with_format(&dest, format.to_image_format())
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    Ok(())
}
