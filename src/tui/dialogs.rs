//! Popup dialog state, kept separate from rendering so it tests headlessly.

/// State for the tag input popup: a filter/autocomplete input over the
/// document's known tags, toggling tags on the current selection.
pub struct TagInputState {
    pub input: String,
    pub all_tags: Vec<String>,
    pub filtered_tags: Vec<String>,
    pub selected_index: usize,
    /// Tags applied to every selected item (for toggle display).
    pub current_tags: Vec<String>,
}

impl TagInputState {
    pub fn new(all_tags: Vec<String>, current_tags: Vec<String>) -> Self {
        let filtered_tags = all_tags.clone();
        Self {
            input: String::new(),
            all_tags,
            filtered_tags,
            selected_index: 0,
            current_tags,
        }
    }

    /// Check if a tag is currently applied to the whole selection.
    pub fn is_applied(&self, tag: &str) -> bool {
        self.current_tags.iter().any(|t| t == tag)
    }

    /// The tag a toggle would act on: the highlighted match, or the typed
    /// text when nothing matches.
    pub fn active_tag(&self) -> Option<String> {
        self.filtered_tags
            .get(self.selected_index)
            .cloned()
            .or_else(|| {
                let trimmed = self.input.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
    }

    pub fn update_filter(&mut self) {
        let query = self.input.to_lowercase();
        self.filtered_tags = self
            .all_tags
            .iter()
            .filter(|tag| tag.to_lowercase().contains(&query))
            .cloned()
            .collect();
        self.selected_index = 0;
    }

    /// Push a character and update the filter in one call.
    pub fn push_char_and_filter(&mut self, c: char) {
        self.input.push(c);
        self.update_filter();
    }

    /// Pop a character and update the filter in one call.
    pub fn pop_char_and_filter(&mut self) {
        self.input.pop();
        self.update_filter();
    }

    pub fn move_up(&mut self) {
        if self.filtered_tags.is_empty() {
            return;
        }
        if self.selected_index > 0 {
            self.selected_index -= 1;
        } else {
            self.selected_index = self.filtered_tags.len() - 1;
        }
    }

    pub fn move_down(&mut self) {
        if self.filtered_tags.is_empty() {
            return;
        }
        if self.selected_index < self.filtered_tags.len() - 1 {
            self.selected_index += 1;
        } else {
            self.selected_index = 0;
        }
    }

    /// Update popup state after a tag toggle: track applied tags, register
    /// brand-new tags and rebuild the filter list.
    pub fn apply_toggle(&mut self, tag: &str, was_applied: bool) {
        if was_applied {
            self.current_tags.retain(|t| t != tag);
        } else {
            self.current_tags.push(tag.to_string());
            self.current_tags.sort();
        }
        if !self.all_tags.iter().any(|t| t == tag) {
            self.all_tags.push(tag.to_string());
            self.all_tags.sort();
        }
        let prev_index = self.selected_index;
        self.input.clear();
        self.update_filter();
        self.selected_index = prev_index.min(self.filtered_tags.len().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_filter_narrows_matches() {
        let mut input = TagInputState::new(tags(&["background", "foreground", "wip"]), vec![]);
        input.push_char_and_filter('g');
        assert_eq!(input.filtered_tags, tags(&["background", "foreground"]));

        input.push_char_and_filter('r');
        assert_eq!(input.filtered_tags, tags(&["background", "foreground"]));

        input.pop_char_and_filter();
        input.pop_char_and_filter();
        assert_eq!(input.filtered_tags.len(), 3);
    }

    #[test]
    fn test_active_tag_prefers_highlighted_match() {
        let mut input = TagInputState::new(tags(&["background", "wip"]), vec![]);
        assert_eq!(input.active_tag().as_deref(), Some("background"));

        input.move_down();
        assert_eq!(input.active_tag().as_deref(), Some("wip"));

        // No match: the typed text becomes a new tag
        input.input = "brand-new".to_string();
        input.update_filter();
        assert_eq!(input.active_tag().as_deref(), Some("brand-new"));
    }

    #[test]
    fn test_navigation_wraps() {
        let mut input = TagInputState::new(tags(&["a", "b"]), vec![]);
        input.move_up();
        assert_eq!(input.selected_index, 1);
        input.move_down();
        assert_eq!(input.selected_index, 0);
    }

    #[test]
    fn test_apply_toggle_registers_new_tag() {
        let mut input = TagInputState::new(tags(&["wip"]), vec![]);
        input.apply_toggle("export", false);

        assert!(input.is_applied("export"));
        assert_eq!(input.all_tags, tags(&["export", "wip"]));
        assert!(input.input.is_empty());

        input.apply_toggle("export", true);
        assert!(!input.is_applied("export"));
    }
}
