//! Export-name processing: sanitization and collision-aware uniquification.

use std::collections::{HashMap, HashSet};

use super::item::ItemId;
use super::tree::ItemTree;

/// Assign every item its processed export name.
///
/// Names are sanitized for the filesystem, then collisions are resolved with
/// ` (N)` suffixes. With groups-as-folders the collision scope is the set of
/// siblings under one parent; flat export uniquifies leaves globally (groups
/// produce no output there and keep their sanitized names).
pub fn assign_export_names(tree: &mut ItemTree, groups_as_folders: bool) {
    let order: Vec<(ItemId, Option<ItemId>, bool)> = tree
        .iter_all()
        .map(|item| (item.id, item.parent, item.is_leaf()))
        .collect();

    if groups_as_folders {
        let mut taken_by_parent: HashMap<Option<ItemId>, HashSet<String>> = HashMap::new();
        for (id, parent, _) in order {
            let taken = taken_by_parent.entry(parent).or_default();
            rename_item(tree, id, taken);
        }
    } else {
        let mut taken = HashSet::new();
        for (id, _, is_leaf) in order {
            if is_leaf {
                rename_item(tree, id, &mut taken);
            } else if let Some(item) = tree.get_mut(id) {
                item.name = sanitize(&item.source_name);
            }
        }
    }
}

fn rename_item(tree: &mut ItemTree, id: ItemId, taken: &mut HashSet<String>) {
    let Some(item) = tree.get_mut(id) else {
        return;
    };
    let name = uniquify(&sanitize(&item.source_name), taken);
    taken.insert(name.clone());
    item.name = name;
}

/// Replace path separators and control characters, trim surrounding
/// whitespace and dots. An empty result becomes "untitled".
pub fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Append ` (N)` (N starting at 1) until the name is free in `taken`.
fn uniquify(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    let mut n = 1;
    loop {
        let candidate = format!("{name} ({n})");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
