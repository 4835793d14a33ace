//! Main TUI application state and key-driven mutations.

use anyhow::Result;
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tracing::{info, warn};

use crate::pipeline::{ItemId, LayerExporter};
use crate::preview::{ImagePreview, NamePreview, UpdateRequest};

use super::dialogs::TagInputState;
use super::widgets::preview_panel::PreviewProtocol;

/// Gate key used while a batch export runs from inside the TUI.
const EXPORT_LOCK_KEY: &str = "tui-export";

/// Main application state.
pub struct AppState {
    pub exporter: LayerExporter,
    pub name_preview: NamePreview,
    pub image_preview: ImagePreview,
    /// Cursor index into the visible tree rows.
    pub cursor: usize,
    pub list_state: ListState,
    pub tag_input: Option<TagInputState>,
    pub show_help: bool,
    /// Status message to show temporarily.
    pub status_message: Option<String>,
    /// Force a full terminal redraw on the next frame (needed after closing
    /// overlays that cover image protocol content).
    pub force_redraw: bool,
    /// Preview pane inner area saved each frame, for image sizing.
    pub preview_area: Rect,
    /// Terminal image protocol for the current preview bitmap.
    pub protocol_cache: Option<PreviewProtocol>,
}

impl AppState {
    pub fn new(exporter: LayerExporter) -> Self {
        let mut state = Self {
            exporter,
            name_preview: NamePreview::new(),
            image_preview: ImagePreview::new(None),
            cursor: 0,
            list_state: ListState::default().with_selected(Some(0)),
            tag_input: None,
            show_help: false,
            status_message: None,
            force_redraw: false,
            preview_area: Rect::default(),
            protocol_cache: None,
        };

        state.name_preview.update(
            &mut state.exporter,
            UpdateRequest {
                reset_items: true,
                ..UpdateRequest::default()
            },
        );
        state.sync_cursor();
        state.select_current();
        state
    }

    // ==================== Core getters ====================

    /// Visible tree rows in display order.
    pub fn visible_rows(&self) -> Vec<ItemId> {
        self.name_preview.display().visible_rows()
    }

    /// The item under the cursor.
    pub fn cursor_id(&self) -> Option<ItemId> {
        self.visible_rows().get(self.cursor).copied()
    }

    /// Clamp the cursor to the current rows and honor a pending scroll
    /// request from the synchronizer.
    pub fn sync_cursor(&mut self) {
        let rows = self.visible_rows();

        if let Some(target) = self.name_preview.take_pending_scroll() {
            if let Some(index) = rows.iter().position(|id| *id == target) {
                self.cursor = index;
            }
        }

        if !rows.is_empty() && self.cursor >= rows.len() {
            self.cursor = rows.len() - 1;
        }
        self.list_state.select(if rows.is_empty() {
            None
        } else {
            Some(self.cursor)
        });
    }

    // ==================== Navigation ====================

    pub fn move_down(&mut self) {
        let rows = self.visible_rows();
        if self.cursor + 1 < rows.len() {
            self.cursor += 1;
        }
        self.select_current();
    }

    pub fn move_up(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
        self.select_current();
    }

    /// Propagate the cursor row as the interactive selection.
    fn select_current(&mut self) {
        self.sync_cursor();
        let Some(id) = self.cursor_id() else {
            return;
        };
        self.name_preview
            .on_selection_changed(&mut self.exporter, vec![id]);
        self.image_preview.set_item(Some(id));
    }

    /// Collapse the cursor row (or move to its parent when already
    /// collapsed or a leaf).
    pub fn collapse_current(&mut self) {
        let Some(id) = self.cursor_id() else {
            return;
        };
        let node = self.name_preview.display().get(id);
        let collapsible = node.map(|n| n.is_group && n.expanded).unwrap_or(false);

        if collapsible {
            self.name_preview.on_row_collapsed(id);
        } else if let Some(parent) = node.and_then(|n| n.parent) {
            let rows = self.visible_rows();
            if let Some(index) = rows.iter().position(|row| *row == parent) {
                self.cursor = index;
            }
        }
        self.select_current();
    }

    /// Expand the cursor row if it is a collapsed group.
    pub fn expand_current(&mut self) {
        let Some(id) = self.cursor_id() else {
            return;
        };
        let expandable = self
            .name_preview
            .display()
            .get(id)
            .map(|n| n.is_group && !n.expanded)
            .unwrap_or(false);
        if expandable {
            self.name_preview.on_row_expanded(id);
        }
        self.select_current();
    }

    /// Toggle expansion of the cursor row.
    pub fn toggle_expand(&mut self) {
        let Some(id) = self.cursor_id() else {
            return;
        };
        match self.name_preview.display().get(id) {
            Some(node) if node.is_group && node.expanded => self.collapse_current(),
            Some(node) if node.is_group => self.expand_current(),
            _ => {}
        }
    }

    // ==================== Settings toggles ====================

    pub fn toggle_only_selected(&mut self) {
        let on = !self.exporter.settings.export_only_selected_layers;
        self.exporter.settings.export_only_selected_layers = on;
        self.after_settings_change(format!(
            "Only selected layers: {}",
            if on { "on" } else { "off" }
        ));
    }

    pub fn toggle_tagged(&mut self) {
        let on = !self.exporter.settings.process_tagged_layers;
        self.exporter.settings.process_tagged_layers = on;
        self.after_settings_change(format!(
            "Withhold tagged layers: {}",
            if on { "on" } else { "off" }
        ));
    }

    pub fn toggle_folders(&mut self) {
        let on = !self.exporter.settings.layer_groups_as_folders;
        self.exporter.settings.layer_groups_as_folders = on;
        self.after_settings_change(format!(
            "Groups as folders: {}",
            if on { "on" } else { "off" }
        ));
    }

    pub fn toggle_only_visible(&mut self) {
        let on = !self.exporter.settings.ignore_invisible;
        self.exporter.settings.ignore_invisible = on;
        self.after_settings_change(format!(
            "Skip invisible layers: {}",
            if on { "on" } else { "off" }
        ));
    }

    fn after_settings_change(&mut self, message: String) {
        self.name_preview.update(
            &mut self.exporter,
            UpdateRequest {
                reset_items: true,
                ..UpdateRequest::default()
            },
        );
        self.sync_cursor();
        self.select_current();
        self.status_message = Some(message);
    }

    /// Persist the current settings as defaults for the next session.
    pub fn persist_settings(&self) {
        if let Err(err) = self.exporter.settings.save_defaults() {
            warn!(error = %err, "failed to persist settings");
        }
    }

    // ==================== Tag popup ====================

    /// Open the tag popup seeded with the document's tags and the tags
    /// shared by the whole selection.
    pub fn open_tag_input(&mut self) {
        let all_tags = self.exporter.document.all_tags();
        let current = self.shared_selection_tags();
        self.tag_input = Some(TagInputState::new(all_tags, current));
    }

    pub fn close_tag_input(&mut self) {
        self.tag_input = None;
        self.force_redraw = true;
    }

    /// Toggle the highlighted (or typed) tag on the selection. Keeps the
    /// popup open for multi-tag editing; closes on empty input.
    pub fn toggle_tag(&mut self) {
        let Some(tag) = self.tag_input.as_ref().and_then(|t| t.active_tag()) else {
            self.close_tag_input();
            return;
        };

        let was_applied = self
            .tag_input
            .as_ref()
            .is_some_and(|input| input.is_applied(&tag));

        self.name_preview
            .toggle_tag_on_selection(&mut self.exporter, &tag, !was_applied);
        self.image_preview.refresh_item(&self.exporter);

        if let Some(input) = self.tag_input.as_mut() {
            input.apply_toggle(&tag, was_applied);
        }
    }

    /// Tags applied to every selected item.
    fn shared_selection_tags(&self) -> Vec<String> {
        let Some(tree) = self.exporter.tree() else {
            return Vec::new();
        };
        let selected = self.name_preview.selected_items();
        let mut shared: Option<Vec<String>> = None;

        for id in selected {
            let Some(item) = tree.get(*id) else { continue };
            let tags: Vec<String> = item.tags.iter().cloned().collect();
            shared = Some(match shared {
                None => tags,
                Some(prev) => prev.into_iter().filter(|t| tags.contains(t)).collect(),
            });
        }
        shared.unwrap_or_default()
    }

    /// Revert the most recent tag edit group.
    pub fn undo_tag_edit(&mut self) {
        if self.exporter.document.undo() {
            self.name_preview.update(
                &mut self.exporter,
                UpdateRequest {
                    incremental_only: true,
                    ..UpdateRequest::default()
                },
            );
            self.image_preview.refresh_item(&self.exporter);
            self.status_message = Some("Undid tag edit".to_string());
        } else {
            self.status_message = Some("Nothing to undo".to_string());
        }
    }

    // ==================== Export ====================

    /// Run a batch export next to the document, with both previews locked
    /// for the duration.
    pub fn run_export(&mut self) -> Result<()> {
        let out_dir = self
            .exporter
            .document
            .base_dir
            .join(format!("{}_layers", self.exporter.document.name));

        self.name_preview.lock(Some(EXPORT_LOCK_KEY));
        self.image_preview.lock(Some(EXPORT_LOCK_KEY));

        info!(out_dir = %out_dir.display(), "export requested from TUI");
        let result = self.exporter.export(&out_dir, false);

        self.name_preview.unlock(Some(EXPORT_LOCK_KEY));
        self.image_preview.unlock(Some(EXPORT_LOCK_KEY));

        match result {
            Ok(stats) => {
                self.status_message = Some(format!(
                    "Exported {} layers to {} ({} failed)",
                    stats.exported,
                    out_dir.display(),
                    stats.failed
                ));
            }
            Err(err) => {
                self.status_message = Some(format!("Export failed: {err:#}"));
            }
        }

        // The export pass reshuffled the pipeline filters; resynchronize
        self.name_preview.update(
            &mut self.exporter,
            UpdateRequest {
                reset_items: true,
                ..UpdateRequest::default()
            },
        );
        self.sync_cursor();
        Ok(())
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
        self.force_redraw = true;
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }
}
