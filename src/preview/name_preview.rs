//! Synchronizes the pipeline's item tree against the displayed layer-name
//! tree, preserving expand/collapse and selection state across updates.

use std::collections::HashSet;

use tracing::debug;

use crate::pipeline::{
    rules, FilterRule, ItemId, ItemTree, ItemType, LayerExporter, SettingsOverride,
};

use super::gate::UpdateGate;
use super::tree_model::DisplayTree;

/// What a preview update should do.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateRequest {
    /// Make the preview interactable again. Applied only while the gate is
    /// open; callers that need it while locked use `set_sensitive`.
    pub force_sensitive: bool,
    /// Rebuild the item tree from the document instead of refreshing the
    /// existing one.
    pub reset_items: bool,
    /// Update mirrored fields of existing nodes only: no inserts, removals
    /// or reparenting, even if the underlying hierarchy changed shape.
    pub incremental_only: bool,
}

/// The layer-name preview: a debounced, re-entrant-safe synchronizer between
/// the export pipeline's item tree and a displayed tree.
///
/// Interactive changes (expand/collapse/select from the host) and the
/// programmatic changes of a reconciliation pass share one dispatch path;
/// a suspension counter keeps the programmatic pass from corrupting the
/// collapse and selection state it is restoring.
pub struct NamePreview {
    gate: UpdateGate,
    tree: DisplayTree,
    collapsed: HashSet<ItemId>,
    selected: Vec<ItemId>,
    /// Caller-supplied tree consumed by the first non-reset update.
    initial_tree: Option<ItemTree>,
    /// Scroll-to-selection fires on the first reconciliation only.
    scroll_armed: bool,
    pending_scroll: Option<ItemId>,
    suspended: u32,
    sensitive: bool,
    on_after_update: Option<Box<dyn FnMut()>>,
}

impl Default for NamePreview {
    fn default() -> Self {
        Self::new()
    }
}

impl NamePreview {
    pub fn new() -> Self {
        Self::with_state(None, HashSet::new(), Vec::new())
    }

    /// Create a preview with persisted collapse/selection state and an
    /// optional pre-built item tree that the first update reuses.
    pub fn with_state(
        initial_tree: Option<ItemTree>,
        collapsed: HashSet<ItemId>,
        selected: Vec<ItemId>,
    ) -> Self {
        Self {
            gate: UpdateGate::new(),
            tree: DisplayTree::new(),
            collapsed,
            selected,
            initial_tree,
            scroll_armed: true,
            pending_scroll: None,
            suspended: 0,
            sensitive: true,
            on_after_update: None,
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

    pub fn display(&self) -> &DisplayTree {
        &self.tree
    }

    pub fn collapsed_items(&self) -> &HashSet<ItemId> {
        &self.collapsed
    }

    pub fn selected_items(&self) -> &[ItemId] {
        &self.selected
    }

    /// The one-shot scroll target produced by the first reconciliation.
    pub fn take_pending_scroll(&mut self) -> Option<ItemId> {
        self.pending_scroll.take()
    }

    /// Callback invoked at the end of every completed update pass.
    pub fn set_on_after_update(&mut self, callback: Box<dyn FnMut()>) {
        self.on_after_update = Some(callback);
    }

    // ==================== Update protocol ====================

    /// Synchronize the displayed tree with a fresh pipeline run.
    /// No observable effect while the gate is locked.
    pub fn update(&mut self, exporter: &mut LayerExporter, request: UpdateRequest) {
        if self.gate.is_locked() {
            return;
        }

        if request.force_sensitive {
            self.sensitive = true;
        }

        if !request.incremental_only {
            self.clear();
        }

        self.regenerate_items(exporter, request.reset_items);

        // Selection/tag rules would hide items the reconciliation still has
        // to mirror; lift them for the duration of the pass.
        self.lift_preview_filters(exporter);

        if !request.incremental_only {
            self.insert_items(exporter);
            self.restore_expansion(exporter);
        } else {
            self.update_items(exporter);
        }

        self.apply_selection();
        self.apply_sensitivity(exporter);

        self.engage_preview_filters(exporter);

        debug!(
            nodes = self.tree.len(),
            incremental = request.incremental_only,
            "name preview updated"
        );

        if let Some(callback) = self.on_after_update.as_mut() {
            callback();
        }
    }

    /// Drop every display node.
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Replace the collapsed set and re-apply expansion state.
    pub fn set_collapsed_items(&mut self, exporter: &LayerExporter, collapsed: HashSet<ItemId>) {
        self.collapsed = collapsed;
        self.restore_expansion(exporter);
    }

    /// Replace the selection programmatically and re-apply it.
    pub fn set_selected_items(&mut self, selected: Vec<ItemId>) {
        self.selected = selected;
        self.apply_selection();
    }

    // ==================== Interactive change handlers ====================

    /// Host notification: the user collapsed a row.
    pub fn on_row_collapsed(&mut self, id: ItemId) {
        self.dispatch_collapsed(id);
    }

    /// Host notification: the user expanded a row.
    pub fn on_row_expanded(&mut self, id: ItemId) {
        self.dispatch_expanded(id);
    }

    /// Host notification: the selection changed interactively. When only
    /// selected layers are exported, a changed selection re-filters the
    /// pipeline, so the preview contents refresh in place.
    pub fn on_selection_changed(&mut self, exporter: &mut LayerExporter, selected: Vec<ItemId>) {
        if self.suspended > 0 {
            return;
        }

        let previous = std::mem::replace(&mut self.selected, selected);
        self.tree.clear_selection();
        for id in self.selected.clone() {
            self.tree.select(id);
        }

        if exporter.settings.export_only_selected_layers && previous != self.selected {
            self.update(
                exporter,
                UpdateRequest {
                    incremental_only: true,
                    ..UpdateRequest::default()
                },
            );
        }
    }

    /// Add or remove a tag on every selected item, as one undo step.
    /// Changing one layer's tags can rename others, so the whole preview
    /// refreshes in place afterwards.
    pub fn toggle_tag_on_selection(&mut self, exporter: &mut LayerExporter, tag: &str, add: bool) {
        let paths: Vec<Vec<usize>> = {
            let Some(tree) = exporter.tree() else { return };
            self.selected
                .iter()
                .filter_map(|id| tree.get(*id).map(|item| item.doc_path.clone()))
                .collect()
        };

        exporter.document.begin_undo_group();
        for path in &paths {
            if add {
                exporter.document.add_tag(path, tag);
            } else {
                exporter.document.remove_tag(path, tag);
            }
        }
        exporter.document.end_undo_group();

        self.update(
            exporter,
            UpdateRequest {
                incremental_only: true,
                ..UpdateRequest::default()
            },
        );
    }

    // ==================== Change dispatch ====================

    fn with_suspended(&mut self, f: impl FnOnce(&mut Self)) {
        self.suspended += 1;
        f(self);
        self.suspended -= 1;
    }

    fn dispatch_expanded(&mut self, id: ItemId) {
        if !self.tree.set_expanded(id, true) {
            return;
        }
        if self.suspended == 0 {
            self.collapsed.remove(&id);
        }
    }

    fn dispatch_collapsed(&mut self, id: ItemId) {
        if !self.tree.set_expanded(id, false) {
            return;
        }
        if self.suspended == 0 {
            self.collapsed.insert(id);
        }
    }

    // ==================== Reconciliation passes ====================

    fn regenerate_items(&mut self, exporter: &mut LayerExporter, reset: bool) {
        let initial = if reset { None } else { self.initial_tree.take() };
        let selected: HashSet<ItemId> = self.selected.iter().copied().collect();

        exporter.with_overridden_settings(
            SettingsOverride {
                selected_ids: Some(selected),
                ..SettingsOverride::default()
            },
            |exporter| {
                exporter.regenerate_with(reset, initial);
            },
        );
    }

    fn lift_preview_filters(&self, exporter: &mut LayerExporter) {
        let only_selected = exporter.settings.export_only_selected_layers;
        let tagged = exporter.settings.process_tagged_layers;
        let Some(tree) = exporter.tree_mut() else { return };

        if only_selected {
            tree.filter.remove(rules::IN_SELECTION);
        }
        if tagged {
            tree.filter.remove(rules::HAS_NO_TAGS);
        }
    }

    fn engage_preview_filters(&self, exporter: &mut LayerExporter) {
        let only_selected = exporter.settings.export_only_selected_layers;
        let tagged = exporter.settings.process_tagged_layers;
        let selected: HashSet<ItemId> = self.selected.iter().copied().collect();
        let Some(tree) = exporter.tree_mut() else { return };

        if only_selected {
            tree.filter.push(FilterRule::InSelection(selected));
        }
        if tagged {
            tree.filter.push(FilterRule::HasNoTags);
        }
    }

    fn insert_items(&mut self, exporter: &LayerExporter) {
        let Some(tree) = exporter.tree() else { return };
        let folders = exporter.settings.layer_groups_as_folders;

        for item in tree.iter() {
            if folders {
                // A lazily-discovered group is synthesized before its first
                // child is attached
                for ancestor in tree.ancestors(item.id).into_iter().rev() {
                    if !self.tree.contains(ancestor) {
                        if let Some(parent_item) = tree.get(ancestor) {
                            self.tree.insert(parent_item);
                        }
                    }
                }
            }
            self.tree.insert(item);
        }
    }

    fn update_items(&mut self, exporter: &LayerExporter) {
        let Some(tree) = exporter.tree() else { return };
        let folders = exporter.settings.layer_groups_as_folders;

        for item in tree.iter() {
            if folders {
                for ancestor in tree.ancestors(item.id) {
                    if let Some(parent_item) = tree.get(ancestor) {
                        self.tree
                            .set_fields(parent_item.id, &parent_item.name, parent_item.has_tags());
                    }
                }
            }
            self.tree.set_fields(item.id, &item.name, item.has_tags());
        }
    }

    /// Expand everything, then re-collapse what the user had collapsed,
    /// pruning ids that left the (unfiltered) item tree. The whole pass is
    /// programmatic: it must not feed back into the collapsed set.
    fn restore_expansion(&mut self, exporter: &LayerExporter) {
        self.with_suspended(|this| {
            for id in this.tree.ids() {
                this.dispatch_expanded(id);
            }

            if let Some(tree) = exporter.tree() {
                this.collapsed.retain(|id| tree.contains(*id));
            }

            let collapsed: Vec<ItemId> = this.collapsed.iter().copied().collect();
            for id in collapsed {
                if this.tree.contains(id) {
                    this.dispatch_collapsed(id);
                }
            }
        });
    }

    /// Re-apply the selection, dropping stale ids. The first pass arms a
    /// one-shot scroll to the first selected item.
    fn apply_selection(&mut self) {
        self.with_suspended(|this| {
            this.selected.retain(|id| this.tree.contains(*id));
            this.tree.clear_selection();
            for id in this.selected.clone() {
                this.tree.select(id);
            }
        });

        if self.scroll_armed {
            self.pending_scroll = self.selected.first().copied();
            self.scroll_armed = false;
        }
    }

    /// Compute per-node sensitivity ("will actually be exported").
    fn apply_sensitivity(&mut self, exporter: &mut LayerExporter) {
        let only_selected = exporter.settings.export_only_selected_layers;
        let tagged = exporter.settings.process_tagged_layers;
        let folders = exporter.settings.layer_groups_as_folders;

        if only_selected {
            // Direct membership only; no ancestor propagation in this mode
            self.tree.set_all_sensitive(false);
            for id in self.selected.clone() {
                self.tree.set_sensitive(id, true);
            }
        }

        if tagged {
            let Some(tree) = exporter.tree_mut() else { return };

            // Tagged items are withheld from normal export. Non-empty groups
            // are left to the bottom-up pass below when they act as folders.
            let mut withheld = Vec::new();
            let _ = tree.with_rule_removed::<_, ()>(rules::LEAVES_ONLY, |tree| {
                tree.with_rule(FilterRule::HasTags, |tree| {
                    for item in tree.iter() {
                        if folders && item.item_type == ItemType::NonemptyGroup {
                            continue;
                        }
                        withheld.push(item.id);
                    }
                    Ok(())
                })
            });
            for id in withheld {
                self.tree.set_sensitive(id, false);
            }

            if folders {
                // A group reads as sensitive iff any existing child node is.
                // Reverse display order visits children before parents.
                let order: Vec<ItemId> = exporter
                    .tree()
                    .map(|tree| tree.iter_all().map(|item| item.id).collect())
                    .unwrap_or_default();

                for id in order.into_iter().rev() {
                    let Some(node) = self.tree.get(id) else { continue };
                    if !node.is_group {
                        continue;
                    }
                    let sensitive = node.children.iter().any(|child| {
                        self.tree
                            .get(*child)
                            .map(|node| node.sensitive)
                            .unwrap_or(false)
                    });
                    self.tree.set_sensitive(id, sensitive);
                }
            }
        }
    }
}
