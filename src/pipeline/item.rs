use std::collections::BTreeSet;
use std::path::PathBuf;

use xxhash_rust::xxh3::Xxh3;

/// Stable identity of one exportable unit.
///
/// Derived from the tag-stripped name path plus a per-parent duplicate
/// ordinal, so the same layer keeps the same id across pipeline re-runs,
/// tag edits and collision renaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u64);

impl ItemId {
    pub fn derive(parent: Option<ItemId>, name: &str, ordinal: usize) -> Self {
        let mut hasher = Xxh3::new();
        if let Some(parent) = parent {
            hasher.update(&parent.0.to_le_bytes());
        }
        hasher.update(name.as_bytes());
        hasher.update(&(ordinal as u64).to_le_bytes());
        Self(hasher.digest())
    }
}

/// What kind of unit an item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Leaf,
    NonemptyGroup,
    EmptyGroup,
}

/// One exportable unit produced by a pipeline run: a leaf layer or a group.
///
/// Elements are rebuilt or refreshed on every pipeline run. Consumers read
/// identity and linkage but never mutate them.
#[derive(Debug, Clone)]
pub struct ItemElement {
    pub id: ItemId,
    /// Display name as it appears in the document.
    pub source_name: String,
    /// Processed export name, assigned by the naming pass.
    pub name: String,
    pub parent: Option<ItemId>,
    /// Direct children in display order.
    pub children: Vec<ItemId>,
    pub depth: usize,
    pub tags: BTreeSet<String>,
    pub item_type: ItemType,
    /// Bitmap file backing a leaf. Groups have none.
    pub source: Option<PathBuf>,
    /// Effective visibility (own flag AND every ancestor's).
    pub visible: bool,
    /// Index path into the owning document, for tag edits.
    pub doc_path: Vec<usize>,
}

impl ItemElement {
    pub fn has_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.item_type == ItemType::Leaf
    }

    pub fn is_group(&self) -> bool {
        matches!(self.item_type, ItemType::NonemptyGroup | ItemType::EmptyGroup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_stable_across_derivations() {
        let a = ItemId::derive(None, "sky", 0);
        let b = ItemId::derive(None, "sky", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_item_id_distinguishes_parent_name_ordinal() {
        let root = ItemId::derive(None, "sky", 0);
        let parent = ItemId::derive(None, "group", 0);

        assert_ne!(root, ItemId::derive(Some(parent), "sky", 0));
        assert_ne!(root, ItemId::derive(None, "sea", 0));
        assert_ne!(root, ItemId::derive(None, "sky", 1));
    }
}
