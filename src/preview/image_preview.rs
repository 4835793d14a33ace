//! Scaled single-layer thumbnail preview.
//!
//! Renders one selected item by running the export pipeline restricted to
//! that item, scales the result to fit the draw area while preserving
//! aspect ratio, and caches the last scaled dimensions so no-op resize
//! events skip the rescale entirely.

use image::{imageops::FilterType, DynamicImage};
use tracing::debug;

use crate::pipeline::{ItemId, LayerExporter};

use super::gate::UpdateGate;

/// Upper bound on either preview axis, in pixels.
pub const MAX_PREVIEW_SIZE: u32 = 1024;

/// A successfully rendered preview bitmap.
pub struct RenderedPreview {
    pub item_id: ItemId,
    /// Export name of the previewed item at render time.
    pub name: String,
    /// Full-resolution bitmap from the pipeline, kept for cheap rescales.
    source: DynamicImage,
    /// Scaled copy sized for the draw area.
    pub scaled: DynamicImage,
}

impl RenderedPreview {
    pub fn source_size(&self) -> (u32, u32) {
        (self.source.width(), self.source.height())
    }
}

/// The rendered-image preview of a single selected item.
///
/// `rendered() == None` is the placeholder state: nothing selected, the item
/// filtered out, or the pipeline failed.
pub struct ImagePreview {
    gate: UpdateGate,
    sensitive: bool,
    item_id: Option<ItemId>,
    /// Applied on the first update, then discarded.
    initial_item_id: Option<ItemId>,
    rendered: Option<RenderedPreview>,
    last_scaled_size: Option<(u32, u32)>,
}

impl ImagePreview {
    pub fn new(initial_item_id: Option<ItemId>) -> Self {
        Self {
            gate: UpdateGate::new(),
            sensitive: true,
            item_id: None,
            initial_item_id,
            rendered: None,
            last_scaled_size: None,
        }
    }

    // ==================== Gate & sensitivity ====================

    pub fn lock(&mut self, key: Option<&str>) {
        self.gate.lock(key);
    }

    pub fn unlock(&mut self, key: Option<&str>) {
        self.gate.unlock(key);
    }

    pub fn is_locked(&self) -> bool {
        self.gate.is_locked()
    }

    pub fn set_sensitive(&mut self, sensitive: bool) {
        self.sensitive = sensitive;
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    // ==================== Accessors ====================

    pub fn item_id(&self) -> Option<ItemId> {
        self.item_id
    }

    /// Change the previewed item. Clearing the item also clears the cache.
    pub fn set_item(&mut self, item_id: Option<ItemId>) {
        self.item_id = item_id;
        if item_id.is_none() {
            self.rendered = None;
            self.last_scaled_size = None;
        }
    }

    pub fn rendered(&self) -> Option<&RenderedPreview> {
        self.rendered.as_ref()
    }

    /// True when the draw area is larger than the current preview bitmap on
    /// both axes (nothing to shrink).
    pub fn is_larger_than_image(&self, draw_width: u32, draw_height: u32) -> bool {
        self.rendered
            .as_ref()
            .map(|r| draw_width > r.scaled.width() && draw_height > r.scaled.height())
            .unwrap_or(false)
    }

    // ==================== Update protocol ====================

    /// Re-render the previewed item for a draw area of the given size.
    /// No observable effect while the gate is locked. Pipeline failures fall
    /// back to the placeholder state and clear the cache.
    pub fn update(
        &mut self,
        exporter: &mut LayerExporter,
        draw_width: u32,
        draw_height: u32,
        force_sensitive: bool,
    ) {
        if self.gate.is_locked() {
            return;
        }

        if force_sensitive {
            self.sensitive = true;
        }

        if self.item_id.is_none() {
            let initial = self.initial_item_id.take();
            if let Some(id) = initial {
                if exporter.tree().map(|tree| tree.contains(id)).unwrap_or(false) {
                    self.item_id = Some(id);
                }
            }
        } else {
            self.initial_item_id = None;
        }

        let Some(id) = self.item_id else {
            return;
        };

        // An item hidden by the current filters has no preview
        let matches = exporter
            .tree()
            .and_then(|tree| tree.get(id).map(|item| tree.filter.is_match(item)))
            .unwrap_or(false);
        if !matches {
            self.set_item(None);
            return;
        }

        // Cheap header read decides whether the cached scale still fits;
        // an unreadable header falls back to the cached bitmap's dimensions
        let natural = exporter.natural_size(id).ok().or_else(|| {
            self.rendered
                .as_ref()
                .filter(|r| r.item_id == id)
                .map(|r| r.source_size())
        });
        if let Some((natural_width, natural_height)) = natural {
            let target =
                compute_preview_size(draw_width, draw_height, natural_width, natural_height);
            let cache_hit = self.rendered.as_ref().is_some_and(|r| r.item_id == id)
                && self.last_scaled_size == Some(target)
                && draw_width >= target.0
                && draw_height >= target.1;
            if cache_hit {
                return;
            }
        }

        let image = match exporter.render_item(id) {
            Ok(image) => image,
            Err(err) => {
                debug!(error = %err, "preview render failed, falling back to placeholder");
                self.rendered = None;
                self.last_scaled_size = None;
                return;
            }
        };

        // The pipeline may hand back different dimensions than the header
        // promised; compute the final size from the actual bitmap
        let target = compute_preview_size(draw_width, draw_height, image.width(), image.height());
        let scaled = image.resize_exact(target.0, target.1, FilterType::Nearest);

        let name = exporter
            .tree()
            .and_then(|tree| tree.get(id))
            .map(|item| item.name.clone())
            .unwrap_or_default();

        self.rendered = Some(RenderedPreview {
            item_id: id,
            name,
            source: image,
            scaled,
        });
        self.last_scaled_size = Some(target);
    }

    /// Shrink the preview to a smaller draw area without re-running the
    /// pipeline. A no-op when the widget is not smaller than the bitmap or
    /// the target size matches the cached one.
    pub fn resize(&mut self, draw_width: u32, draw_height: u32) {
        let Some(rendered) = self.rendered.as_ref() else {
            return;
        };
        if draw_width >= rendered.scaled.width() && draw_height >= rendered.scaled.height() {
            return;
        }

        let (source_width, source_height) = rendered.source_size();
        let target = compute_preview_size(draw_width, draw_height, source_width, source_height);
        if self.last_scaled_size == Some(target) {
            return;
        }

        if let Some(rendered) = self.rendered.as_mut() {
            rendered.scaled = rendered
                .source
                .resize_exact(target.0, target.1, FilterType::Nearest);
        }
        self.last_scaled_size = Some(target);
    }

    /// Refresh the previewed item's display name after an in-place tree
    /// update, when the item is still present and passes the filters.
    pub fn refresh_item(&mut self, exporter: &LayerExporter) {
        let Some(id) = self.item_id else {
            return;
        };
        let Some(tree) = exporter.tree() else {
            return;
        };
        if let Some(item) = tree.get(id) {
            if tree.filter.is_match(item) {
                if let Some(rendered) = self.rendered.as_mut() {
                    rendered.name = item.name.clone();
                }
            }
        }
    }

    /// Drop the previewed item and return to the placeholder state.
    pub fn clear(&mut self) {
        self.set_item(None);
    }
}

/// Fit `width`×`height` into a draw area, preserving aspect ratio.
///
/// The dominant draw-area axis is bounded by the draw area, the natural
/// size and [`MAX_PREVIEW_SIZE`]; the other axis follows by ratio. If the
/// derived axis overflows the draw area the computation reruns with that
/// axis as the bound, so both axes always fit. Dimensions never reach zero.
pub fn compute_preview_size(
    draw_width: u32,
    draw_height: u32,
    width: u32,
    height: u32,
) -> (u32, u32) {
    let width = width.max(1) as f64;
    let height = height.max(1) as f64;

    let (mut preview_width, mut preview_height);
    if draw_width > draw_height {
        preview_height = f64::from(draw_height.min(MAX_PREVIEW_SIZE)).min(height);
        preview_width = (preview_height / height * width).round();

        if preview_width > f64::from(draw_width) {
            preview_width = f64::from(draw_width);
            preview_height = (preview_width / width * height).round();
        }
    } else {
        preview_width = f64::from(draw_width.min(MAX_PREVIEW_SIZE)).min(width);
        preview_height = (preview_width / width * height).round();

        if preview_height > f64::from(draw_height) {
            preview_height = f64::from(draw_height);
            preview_width = (preview_height / height * width).round();
        }
    }

    ((preview_width as u32).max(1), (preview_height as u32).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, LayerNode};
    use crate::pipeline::{ExportSettings, FilterRule};
    use tempfile::TempDir;

    // ==================== Size computation ====================

    #[test]
    fn test_size_fits_wide_draw_area() {
        // Wide draw area, landscape source: height is the bound
        let (w, h) = compute_preview_size(300, 200, 800, 600);
        assert_eq!((w, h), (267, 200));
    }

    #[test]
    fn test_size_two_pass_clamp_keeps_both_axes_inside() {
        // First pass would overflow the narrow axis; the second pass rebinds
        let (w, h) = compute_preview_size(2000, 10, 800, 600);
        assert!(w <= 2000 && h <= 10);
        // 800:600 ratio preserved at the clamped height
        assert_eq!((w, h), (13, 10));
    }

    #[test]
    fn test_size_never_zero() {
        let (w, h) = compute_preview_size(300, 200, 8000, 10);
        assert!(w >= 1 && h >= 1);
        assert!(w <= 300 && h <= 200);

        let (w, h) = compute_preview_size(1, 1, 10_000, 10);
        assert_eq!((w, h), (1, 1));

        // Degenerate natural sizes are floored, not divided by zero
        let (w, h) = compute_preview_size(100, 50, 0, 0);
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn test_size_capped_at_max_preview_size() {
        let (w, h) = compute_preview_size(5000, 4000, 3000, 2000);
        assert_eq!(h, MAX_PREVIEW_SIZE);
        assert_eq!(w, 1536);
    }

    #[test]
    fn test_size_small_source_not_upscaled_past_natural() {
        let (w, h) = compute_preview_size(300, 200, 40, 30);
        assert_eq!((w, h), (40, 30));
    }

    // ==================== Update & cache ====================

    fn backed_exporter(temp: &TempDir) -> LayerExporter {
        let root = temp.path();
        let img = image::RgbaImage::new(80, 60);
        img.save(root.join("sky.png")).unwrap();

        let doc = Document::new(
            "backed",
            root.to_path_buf(),
            vec![
                LayerNode::leaf("sky", root.join("sky.png")),
                LayerNode::group("empty", Vec::new()),
            ],
        );
        let mut exporter = LayerExporter::new(doc, ExportSettings::default());
        exporter.regenerate(true);
        exporter
    }

    fn sky_id(exporter: &LayerExporter) -> ItemId {
        exporter
            .tree()
            .unwrap()
            .iter_all()
            .find(|item| item.source_name == "sky")
            .unwrap()
            .id
    }

    #[test]
    fn test_update_renders_scaled_bitmap() {
        let temp = TempDir::new().unwrap();
        let mut exporter = backed_exporter(&temp);
        let id = sky_id(&exporter);

        let mut preview = ImagePreview::new(None);
        preview.set_item(Some(id));
        preview.update(&mut exporter, 40, 40, false);

        let rendered = preview.rendered().unwrap();
        assert_eq!(rendered.item_id, id);
        assert_eq!(rendered.name, "sky");
        // 80x60 fits 40x40 as 40x30
        assert_eq!(rendered.scaled.width(), 40);
        assert_eq!(rendered.scaled.height(), 30);
    }

    #[test]
    fn test_update_locked_is_noop() {
        let temp = TempDir::new().unwrap();
        let mut exporter = backed_exporter(&temp);
        let id = sky_id(&exporter);

        let mut preview = ImagePreview::new(None);
        preview.set_item(Some(id));
        preview.lock(Some("export"));
        preview.update(&mut exporter, 40, 40, true);

        assert!(preview.rendered().is_none());
        // force_sensitive does not apply while locked
        assert!(preview.is_sensitive());
        preview.set_sensitive(false);
        preview.update(&mut exporter, 40, 40, true);
        assert!(!preview.is_sensitive());
    }

    #[test]
    fn test_initial_item_applied_once() {
        let temp = TempDir::new().unwrap();
        let mut exporter = backed_exporter(&temp);
        let id = sky_id(&exporter);

        let mut preview = ImagePreview::new(Some(id));
        preview.update(&mut exporter, 40, 40, false);
        assert_eq!(preview.item_id(), Some(id));
        assert!(preview.rendered().is_some());

        // Clearing and updating again does not resurrect the initial item
        preview.clear();
        preview.update(&mut exporter, 40, 40, false);
        assert_eq!(preview.item_id(), None);
        assert!(preview.rendered().is_none());
    }

    #[test]
    fn test_filtered_out_item_clears_preview() {
        let temp = TempDir::new().unwrap();
        let mut exporter = backed_exporter(&temp);
        let id = sky_id(&exporter);

        let mut preview = ImagePreview::new(None);
        preview.set_item(Some(id));
        preview.update(&mut exporter, 40, 40, false);
        assert!(preview.rendered().is_some());

        // Hide the item behind a selection filter
        exporter
            .tree_mut()
            .unwrap()
            .filter
            .push(FilterRule::InSelection(Default::default()));
        preview.update(&mut exporter, 40, 40, false);

        assert_eq!(preview.item_id(), None);
        assert!(preview.rendered().is_none());
    }

    #[test]
    fn test_pipeline_failure_falls_back_to_placeholder() {
        let temp = TempDir::new().unwrap();
        let mut exporter = backed_exporter(&temp);
        let id = sky_id(&exporter);

        let mut preview = ImagePreview::new(None);
        preview.set_item(Some(id));
        preview.update(&mut exporter, 40, 40, false);
        assert!(preview.rendered().is_some());

        // Break the source bitmap, then force a differently-sized render
        std::fs::write(temp.path().join("sky.png"), b"junk").unwrap();
        preview.update(&mut exporter, 20, 20, false);

        assert!(preview.rendered().is_none());
        // The caller is not crashed and the item stays selected
        assert_eq!(preview.item_id(), Some(id));
    }

    #[test]
    fn test_same_size_update_skips_rerender() {
        let temp = TempDir::new().unwrap();
        let mut exporter = backed_exporter(&temp);
        let id = sky_id(&exporter);

        let mut preview = ImagePreview::new(None);
        preview.set_item(Some(id));
        preview.update(&mut exporter, 40, 40, false);

        // Delete the backing file: a re-render would now fail, so a
        // surviving preview proves the cache was used
        std::fs::remove_file(temp.path().join("sky.png")).unwrap();
        preview.update(&mut exporter, 40, 40, false);

        assert!(preview.rendered().is_some());
    }

    #[test]
    fn test_resize_shrinks_from_kept_source() {
        let temp = TempDir::new().unwrap();
        let mut exporter = backed_exporter(&temp);
        let id = sky_id(&exporter);

        let mut preview = ImagePreview::new(None);
        preview.set_item(Some(id));
        preview.update(&mut exporter, 80, 80, false);
        assert_eq!(preview.rendered().unwrap().scaled.width(), 80);

        // Shrinking re-derives from the kept full-resolution bitmap
        preview.resize(40, 40);
        let rendered = preview.rendered().unwrap();
        assert_eq!(rendered.scaled.width(), 40);
        assert_eq!(rendered.scaled.height(), 30);

        // Growing the widget is not a resize
        preview.resize(200, 200);
        assert_eq!(preview.rendered().unwrap().scaled.width(), 40);
    }

    #[test]
    fn test_is_larger_than_image() {
        let temp = TempDir::new().unwrap();
        let mut exporter = backed_exporter(&temp);
        let id = sky_id(&exporter);

        let mut preview = ImagePreview::new(None);
        assert!(!preview.is_larger_than_image(100, 100));

        preview.set_item(Some(id));
        preview.update(&mut exporter, 40, 40, false);
        assert!(preview.is_larger_than_image(100, 100));
        assert!(!preview.is_larger_than_image(40, 30));
    }

    #[test]
    fn test_group_item_yields_placeholder() {
        let temp = TempDir::new().unwrap();
        let mut exporter = backed_exporter(&temp);
        let group = exporter
            .tree()
            .unwrap()
            .iter_all()
            .find(|item| item.source_name == "empty")
            .unwrap()
            .id;

        let mut preview = ImagePreview::new(None);
        preview.set_item(Some(group));
        preview.update(&mut exporter, 40, 40, false);

        // Groups are filtered out of the pipeline run, so no preview
        assert!(preview.rendered().is_none());
    }
}
