//! The ordered, parent-linked item collection produced by a pipeline run.

use std::collections::HashMap;

use crate::document::Document;

use super::filter::{FilterRule, FilterStack};
use super::item::{ItemElement, ItemId, ItemType};

/// Ordered, filterable collection of [`ItemElement`]s.
///
/// Items are stored in display (pre-order) order: a group appears before its
/// descendants. `contains`/`get` look up by id regardless of the filter
/// stack; `iter` honors it.
#[derive(Debug, Clone)]
pub struct ItemTree {
    items: Vec<ItemElement>,
    index: HashMap<ItemId, usize>,
    pub filter: FilterStack,
}

impl ItemTree {
    /// Build a fresh tree from the document's layer stack.
    pub fn from_document(document: &Document) -> Self {
        let mut items = Vec::new();
        let mut index = HashMap::new();
        build_level(
            &document.layers,
            None,
            0,
            true,
            &mut Vec::new(),
            &mut items,
            &mut index,
        );
        Self {
            items,
            index,
            filter: FilterStack::new(),
        }
    }

    /// Refresh element fields (tags, visibility) from the document without
    /// rebuilding structure. Identity and linkage are untouched.
    pub fn refresh_from_document(&mut self, document: &Document) {
        // Pre-order storage: a parent's effective visibility is already
        // refreshed when its children are processed.
        let mut visible_by_id: HashMap<ItemId, bool> = HashMap::with_capacity(self.items.len());
        for item in &mut self.items {
            let Some(node) = document.node_at(&item.doc_path) else {
                continue;
            };
            item.tags = node.tags.clone();
            let parent_visible = item
                .parent
                .map(|pid| visible_by_id.get(&pid).copied().unwrap_or(true))
                .unwrap_or(true);
            item.visible = parent_visible && node.visible;
            visible_by_id.insert(item.id, item.visible);
        }
    }

    /// Membership test by id, ignoring the filter stack.
    pub fn contains(&self, id: ItemId) -> bool {
        self.index.contains_key(&id)
    }

    /// Lookup by id, ignoring the filter stack.
    pub fn get(&self, id: ItemId) -> Option<&ItemElement> {
        self.index.get(&id).map(|&i| &self.items[i])
    }

    pub(super) fn get_mut(&mut self, id: ItemId) -> Option<&mut ItemElement> {
        let index = *self.index.get(&id)?;
        Some(&mut self.items[index])
    }

    /// Iterate items matching the filter stack, in display order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemElement> {
        self.items.iter().filter(|item| self.filter.is_match(item))
    }

    /// Iterate every item in display order, ignoring the filter stack.
    pub fn iter_all(&self) -> impl Iterator<Item = &ItemElement> {
        self.items.iter()
    }

    pub fn len_all(&self) -> usize {
        self.items.len()
    }

    /// Ancestor ids of `id`, nearest parent first. Unknown ids yield nothing.
    pub fn ancestors(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut current = self.get(id).and_then(|item| item.parent);
        while let Some(pid) = current {
            out.push(pid);
            current = self.get(pid).and_then(|item| item.parent);
        }
        out
    }

    /// Run `f` with `rule` engaged, restoring the previous stack afterwards
    /// even when `f` fails.
    pub fn with_rule<T, E>(
        &mut self,
        rule: FilterRule,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let name = rule.name();
        let replaced = self.filter.remove(name);
        self.filter.push(rule);
        let result = f(self);
        self.filter.remove(name);
        if let Some(previous) = replaced {
            self.filter.push(previous);
        }
        result
    }

    /// Run `f` with the named rule lifted, re-engaging it afterwards (if it
    /// was present) even when `f` fails.
    pub fn with_rule_removed<T, E>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E> {
        let removed = self.filter.remove(name);
        let result = f(self);
        if let Some(rule) = removed {
            self.filter.push(rule);
        }
        result
    }
}

fn build_level(
    nodes: &[crate::document::LayerNode],
    parent: Option<ItemId>,
    depth: usize,
    parent_visible: bool,
    doc_path: &mut Vec<usize>,
    items: &mut Vec<ItemElement>,
    index: &mut HashMap<ItemId, usize>,
) {
    // Duplicate sibling names get distinct ordinals so ids stay unique
    let mut name_counts: HashMap<&str, usize> = HashMap::new();

    for (child_index, node) in nodes.iter().enumerate() {
        let count = name_counts.entry(node.name.as_str()).or_insert(0);
        let ordinal = *count;
        *count += 1;

        let id = ItemId::derive(parent, &node.name, ordinal);
        let visible = parent_visible && node.visible;
        let item_type = if node.is_group {
            if node.children.is_empty() {
                ItemType::EmptyGroup
            } else {
                ItemType::NonemptyGroup
            }
        } else {
            ItemType::Leaf
        };

        doc_path.push(child_index);
        index.insert(id, items.len());
        items.push(ItemElement {
            id,
            source_name: node.name.clone(),
            name: node.name.clone(),
            parent,
            children: Vec::new(),
            depth,
            tags: node.tags.clone(),
            item_type,
            source: node.source.clone(),
            visible,
            doc_path: doc_path.clone(),
        });

        if let Some(pid) = parent {
            if let Some(&parent_index) = index.get(&pid) {
                items[parent_index].children.push(id);
            }
        }

        build_level(
            &node.children,
            Some(id),
            depth + 1,
            visible,
            doc_path,
            items,
            index,
        );
        doc_path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::filter::rules;
    use crate::pipeline::test_helpers::create_test_document;

    #[test]
    fn test_build_preorder_and_linkage() {
        let doc = create_test_document();
        let tree = ItemTree::from_document(&doc);

        let names: Vec<&str> = tree.iter_all().map(|i| i.source_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["sky", "characters", "hero", "sidekick", "notes", "hidden"]
        );

        let group = tree.iter_all().find(|i| i.source_name == "characters").unwrap();
        assert_eq!(group.item_type, ItemType::NonemptyGroup);
        assert_eq!(group.children.len(), 2);

        for child_id in &group.children {
            assert_eq!(tree.get(*child_id).unwrap().parent, Some(group.id));
        }

        let empty = tree.iter_all().find(|i| i.source_name == "notes").unwrap();
        assert_eq!(empty.item_type, ItemType::EmptyGroup);
    }

    #[test]
    fn test_ids_stable_across_rebuilds() {
        let doc = create_test_document();
        let first = ItemTree::from_document(&doc);
        let second = ItemTree::from_document(&doc);

        let first_ids: Vec<ItemId> = first.iter_all().map(|i| i.id).collect();
        let second_ids: Vec<ItemId> = second.iter_all().map(|i| i.id).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn test_duplicate_sibling_names_get_distinct_ids() {
        use crate::document::{Document, LayerNode};
        use std::path::PathBuf;

        let doc = Document::new(
            "dupes",
            PathBuf::from("."),
            vec![
                LayerNode::leaf("layer", PathBuf::from("a.png")),
                LayerNode::leaf("layer", PathBuf::from("b.png")),
            ],
        );

        let tree = ItemTree::from_document(&doc);
        assert_eq!(tree.len_all(), 2);
        let ids: Vec<ItemId> = tree.iter_all().map(|i| i.id).collect();
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_effective_visibility_inherited() {
        use crate::document::{Document, LayerNode};
        use std::path::PathBuf;

        let mut group = LayerNode::group(
            "g",
            vec![LayerNode::leaf("child", PathBuf::from("c.png"))],
        );
        group.visible = false;

        let doc = Document::new("vis", PathBuf::from("."), vec![group]);

        let tree = ItemTree::from_document(&doc);
        let child = tree.iter_all().find(|i| i.source_name == "child").unwrap();
        assert!(!child.visible);
    }

    #[test]
    fn test_filtered_iteration() {
        let doc = create_test_document();
        let mut tree = ItemTree::from_document(&doc);

        tree.filter.push(FilterRule::LeavesOnly);
        let names: Vec<&str> = tree.iter().map(|i| i.source_name.as_str()).collect();
        assert_eq!(names, vec!["sky", "hero", "sidekick", "hidden"]);

        tree.filter.push(FilterRule::HasNoTags);
        let names: Vec<&str> = tree.iter().map(|i| i.source_name.as_str()).collect();
        assert_eq!(names, vec!["hero", "hidden"]);

        // Membership stays unfiltered
        let sky = ItemId::derive(None, "sky", 0);
        assert!(tree.contains(sky));
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let doc = create_test_document();
        let tree = ItemTree::from_document(&doc);

        let hero = tree.iter_all().find(|i| i.source_name == "hero").unwrap();
        let group = tree.iter_all().find(|i| i.source_name == "characters").unwrap();

        assert_eq!(tree.ancestors(hero.id), vec![group.id]);
        assert!(tree.ancestors(group.id).is_empty());
        assert!(tree.ancestors(ItemId(42)).is_empty());
    }

    #[test]
    fn test_with_rule_restores_on_error() {
        let doc = create_test_document();
        let mut tree = ItemTree::from_document(&doc);

        let result: Result<(), &str> =
            tree.with_rule(FilterRule::HasTags, |_| Err("pipeline failed"));
        assert!(result.is_err());
        assert!(!tree.filter.contains(rules::HAS_TAGS));
    }

    #[test]
    fn test_with_rule_removed_restores_on_error() {
        let doc = create_test_document();
        let mut tree = ItemTree::from_document(&doc);
        tree.filter.push(FilterRule::HasNoTags);

        let result: Result<(), &str> = tree.with_rule_removed(rules::HAS_NO_TAGS, |inner| {
            assert!(!inner.filter.contains(rules::HAS_NO_TAGS));
            Err("pipeline failed")
        });
        assert!(result.is_err());
        assert!(tree.filter.contains(rules::HAS_NO_TAGS));
    }

    #[test]
    fn test_with_rule_preserves_replaced_rule() {
        let doc = create_test_document();
        let mut tree = ItemTree::from_document(&doc);
        let sky = ItemId::derive(None, "sky", 0);

        tree.filter
            .push(FilterRule::InSelection([sky].into_iter().collect()));

        let empty: std::collections::HashSet<ItemId> = std::collections::HashSet::new();
        let result: Result<(), ()> = tree.with_rule(FilterRule::InSelection(empty), |inner| {
            // Temporary rule selects nothing
            assert_eq!(inner.iter().count(), 0);
            Ok(())
        });
        assert!(result.is_ok());

        // Original selection rule is back in force
        let names: Vec<&str> = tree.iter().map(|i| i.source_name.as_str()).collect();
        assert_eq!(names, vec!["sky"]);
    }

    #[test]
    fn test_refresh_from_document_picks_up_tag_edits() {
        let mut doc = create_test_document();
        let mut tree = ItemTree::from_document(&doc);

        let hero = tree.iter_all().find(|i| i.source_name == "hero").unwrap();
        assert!(!hero.has_tags());
        let hero_id = hero.id;
        let hero_path = hero.doc_path.clone();

        doc.add_tag(&hero_path, "export");
        tree.refresh_from_document(&doc);

        assert!(tree.get(hero_id).unwrap().tags.contains("export"));
    }
}
