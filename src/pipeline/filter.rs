//! Named filter rules controlling which items a pipeline run includes.
//!
//! Rules are pushed and removed by name. Removing an absent rule is a no-op,
//! and pushing a rule replaces any previous rule with the same name, so
//! callers can re-engage rules without tracking whether they were present.

use std::collections::HashSet;

use super::item::{ItemElement, ItemType};
use super::ItemId;

/// Well-known rule names.
pub mod rules {
    pub const IN_SELECTION: &str = "in-selection";
    pub const HAS_TAGS: &str = "has-tags";
    pub const HAS_NO_TAGS: &str = "has-no-tags";
    pub const LEAVES_ONLY: &str = "leaves-only";
    pub const VISIBLE_ONLY: &str = "visible-only";
}

/// A single named predicate over items.
#[derive(Debug, Clone)]
pub enum FilterRule {
    InSelection(HashSet<ItemId>),
    HasTags,
    HasNoTags,
    LeavesOnly,
    VisibleOnly,
}

impl FilterRule {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InSelection(_) => rules::IN_SELECTION,
            Self::HasTags => rules::HAS_TAGS,
            Self::HasNoTags => rules::HAS_NO_TAGS,
            Self::LeavesOnly => rules::LEAVES_ONLY,
            Self::VisibleOnly => rules::VISIBLE_ONLY,
        }
    }

    pub fn matches(&self, item: &ItemElement) -> bool {
        match self {
            Self::InSelection(ids) => ids.contains(&item.id),
            Self::HasTags => item.has_tags(),
            Self::HasNoTags => !item.has_tags(),
            Self::LeavesOnly => item.item_type == ItemType::Leaf,
            Self::VisibleOnly => item.visible,
        }
    }
}

/// Stack of active filter rules. An item matches when every rule matches.
#[derive(Debug, Clone, Default)]
pub struct FilterStack {
    rules: Vec<FilterRule>,
}

impl FilterStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engage a rule, replacing any existing rule with the same name.
    pub fn push(&mut self, rule: FilterRule) {
        self.remove(rule.name());
        self.rules.push(rule);
    }

    /// Remove a rule by name, returning it if it was present.
    /// Removing an absent rule is a no-op.
    pub fn remove(&mut self, name: &str) -> Option<FilterRule> {
        let index = self.rules.iter().position(|rule| rule.name() == name)?;
        Some(self.rules.remove(index))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.iter().any(|rule| rule.name() == name)
    }

    pub fn is_match(&self, item: &ItemElement) -> bool {
        self.rules.iter().all(|rule| rule.matches(item))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn leaf(name: &str, tags: &[&str]) -> ItemElement {
        ItemElement {
            id: ItemId::derive(None, name, 0),
            source_name: name.to_string(),
            name: name.to_string(),
            parent: None,
            children: Vec::new(),
            depth: 0,
            tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
            item_type: ItemType::Leaf,
            source: Some(PathBuf::from(format!("{name}.png"))),
            visible: true,
            doc_path: vec![0],
        }
    }

    #[test]
    fn test_empty_stack_matches_everything() {
        let stack = FilterStack::new();
        assert!(stack.is_match(&leaf("a", &[])));
    }

    #[test]
    fn test_rules_are_conjunctive() {
        let mut stack = FilterStack::new();
        let tagged = leaf("a", &["export"]);
        let plain = leaf("b", &[]);

        stack.push(FilterRule::HasTags);
        assert!(stack.is_match(&tagged));
        assert!(!stack.is_match(&plain));

        stack.push(FilterRule::InSelection([plain.id].into_iter().collect()));
        // Now requires both: tagged AND selected — neither satisfies both
        assert!(!stack.is_match(&tagged));
        assert!(!stack.is_match(&plain));
    }

    #[test]
    fn test_push_replaces_same_name() {
        let mut stack = FilterStack::new();
        let a = leaf("a", &[]);
        let b = leaf("b", &[]);

        stack.push(FilterRule::InSelection([a.id].into_iter().collect()));
        stack.push(FilterRule::InSelection([b.id].into_iter().collect()));

        assert!(!stack.is_match(&a));
        assert!(stack.is_match(&b));
    }

    #[test]
    fn test_remove_absent_rule_is_noop() {
        let mut stack = FilterStack::new();
        assert!(stack.remove(rules::HAS_TAGS).is_none());

        stack.push(FilterRule::HasTags);
        assert!(stack.remove(rules::HAS_TAGS).is_some());
        assert!(stack.remove(rules::HAS_TAGS).is_none());
    }
}
