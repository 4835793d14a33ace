//! The display model mirrored from the pipeline's item tree.
//!
//! This is the narrow surface the synchronizer drives: create nodes, set
//! their mirrored fields, expand/collapse and select. The TUI renders from
//! it, tests inspect it headlessly; nothing here knows about widgets.

use std::collections::HashMap;

use crate::pipeline::{ItemElement, ItemId};

/// One entry in the displayed tree, keyed by item id and owned exclusively
/// by the synchronizer.
#[derive(Debug, Clone)]
pub struct DisplayNode {
    pub item_id: ItemId,
    /// Mirrored export name.
    pub name: String,
    /// Mirrored tag-presence flag.
    pub has_tags: bool,
    /// Whether the item reads as "will be exported".
    pub sensitive: bool,
    pub expanded: bool,
    pub selected: bool,
    pub is_group: bool,
    pub parent: Option<ItemId>,
    /// Direct children in display order.
    pub children: Vec<ItemId>,
    pub depth: usize,
}

/// Id-indexed store of display nodes with root ordering.
#[derive(Debug, Default)]
pub struct DisplayTree {
    nodes: HashMap<ItemId, DisplayNode>,
    roots: Vec<ItemId>,
}

impl DisplayTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all nodes and the id index.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Absence is a first-class `None`, never a default node.
    pub fn get(&self, id: ItemId) -> Option<&DisplayNode> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut DisplayNode> {
        self.nodes.get_mut(&id)
    }

    /// Create a node mirroring `item`. The node attaches to its parent's
    /// node when one exists, otherwise at root level. Inserting an id that
    /// is already present only refreshes the mirrored fields.
    pub fn insert(&mut self, item: &ItemElement) {
        if self.contains(item.id) {
            self.set_fields(item.id, &item.name, item.has_tags());
            return;
        }

        let (parent, depth) = match item.parent.and_then(|pid| self.nodes.get(&pid)) {
            Some(parent_node) => (Some(parent_node.item_id), parent_node.depth + 1),
            None => (None, 0),
        };

        let node = DisplayNode {
            item_id: item.id,
            name: item.name.clone(),
            has_tags: item.has_tags(),
            sensitive: true,
            expanded: true,
            selected: false,
            is_group: item.is_group(),
            parent,
            children: Vec::new(),
            depth,
        };

        match parent {
            Some(pid) => {
                if let Some(parent_node) = self.nodes.get_mut(&pid) {
                    parent_node.children.push(item.id);
                }
            }
            None => self.roots.push(item.id),
        }

        self.nodes.insert(item.id, node);
    }

    /// Refresh a node's mirrored fields in place. Missing nodes are skipped.
    /// The sensitivity flag resets; the sensitivity pass recomputes it.
    pub fn set_fields(&mut self, id: ItemId, name: &str, has_tags: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.name = name.to_string();
            node.has_tags = has_tags;
            node.sensitive = true;
        }
    }

    /// Set a node's expansion state. Returns false for a missing node.
    pub fn set_expanded(&mut self, id: ItemId, expanded: bool) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.expanded = expanded;
                true
            }
            None => false,
        }
    }

    /// Mark a node selected. Returns false for a missing node.
    pub fn select(&mut self, id: ItemId) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.selected = true;
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        for node in self.nodes.values_mut() {
            node.selected = false;
        }
    }

    /// Set a node's sensitivity. Missing nodes are skipped.
    pub fn set_sensitive(&mut self, id: ItemId, sensitive: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.sensitive = sensitive;
        }
    }

    pub fn set_all_sensitive(&mut self, sensitive: bool) {
        for node in self.nodes.values_mut() {
            node.sensitive = sensitive;
        }
    }

    /// Every node id in display order (depth-first, ignoring expansion).
    pub fn ids(&self) -> Vec<ItemId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for &root in &self.roots {
            self.collect_ids(root, &mut out);
        }
        out
    }

    fn collect_ids(&self, id: ItemId, out: &mut Vec<ItemId>) {
        out.push(id);
        if let Some(node) = self.nodes.get(&id) {
            for &child in &node.children {
                self.collect_ids(child, out);
            }
        }
    }

    /// Node ids visible given the current expansion state, in display order.
    pub fn visible_rows(&self) -> Vec<ItemId> {
        let mut out = Vec::new();
        for &root in &self.roots {
            self.collect_visible(root, &mut out);
        }
        out
    }

    fn collect_visible(&self, id: ItemId, out: &mut Vec<ItemId>) {
        out.push(id);
        if let Some(node) = self.nodes.get(&id) {
            if node.expanded {
                for &child in &node.children {
                    self.collect_visible(child, out);
                }
            }
        }
    }
}
