use ratatui::{
    layout::Rect,
    prelude::*,
    widgets::{Block, Borders, List, ListItem},
};

use crate::preview::DisplayNode;
use crate::tui::colors::{FOCUS_COLOR, GROUP_COLOR, HELP_TEXT, INSENSITIVE_COLOR, TAG_COLOR};
use crate::tui::state::AppState;

/// Compute tree-drawing prefix strings for each visible node.
///
/// Uses box-drawing characters (`├─`, `└─`, `│`) to show parent-child
/// relationships. Each depth level contributes a 3-character segment.
///
/// This is a pure function over display nodes (depth, parent), so it tests
/// without a terminal.
fn compute_tree_prefixes(visible: &[&DisplayNode]) -> Vec<String> {
    use std::collections::HashSet;

    let n = visible.len();
    if n == 0 {
        return vec![];
    }

    // Step 1: Pre-compute whether each entry is the last visible child of its
    // parent. Reverse pass: the first time we see a parent id, that entry is
    // the last child.
    let mut seen_parents: HashSet<Option<crate::pipeline::ItemId>> = HashSet::new();
    let mut is_last = vec![false; n];
    for i in (0..n).rev() {
        if seen_parents.insert(visible[i].parent) {
            is_last[i] = true;
        }
    }

    // Step 2: Forward pass — build prefix strings. Track is_last status at
    // each depth level so deeper entries know whether their ancestors need
    // continuation lines (│) or empty space.
    let mut is_last_at_depth: Vec<bool> = Vec::new();
    let mut prefixes = Vec::with_capacity(n);

    for i in 0..n {
        let depth = visible[i].depth;
        let mut prefix = String::new();

        for level in 0..depth {
            if level < is_last_at_depth.len() && is_last_at_depth[level] {
                prefix.push_str("   ");
            } else {
                prefix.push_str("│  ");
            }
        }

        if is_last[i] {
            prefix.push_str("└─ ");
        } else {
            prefix.push_str("├─ ");
        }

        if depth >= is_last_at_depth.len() {
            is_last_at_depth.resize(depth + 1, false);
        }
        is_last_at_depth[depth] = is_last[i];

        prefixes.push(prefix);
    }

    prefixes
}

pub fn render_layer_tree(frame: &mut Frame, area: Rect, state: &mut AppState) {
    let display = state.name_preview.display();
    let row_ids = display.visible_rows();
    let visible: Vec<&DisplayNode> = row_ids.iter().filter_map(|id| display.get(*id)).collect();
    let prefixes = compute_tree_prefixes(&visible);

    let items: Vec<ListItem> = visible
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let icon = if node.is_group {
                if node.expanded {
                    "- "
                } else {
                    "+ "
                }
            } else {
                "  "
            };

            let mut spans = Vec::new();
            spans.push(Span::styled(
                format!("{}{}", prefixes[i], icon),
                Style::default().fg(HELP_TEXT),
            ));

            let name_style = if !node.sensitive {
                Style::default().fg(INSENSITIVE_COLOR)
            } else if node.is_group {
                Style::default().fg(GROUP_COLOR)
            } else {
                Style::default()
            };
            spans.push(Span::styled(node.name.clone(), name_style));

            if node.has_tags {
                spans.push(Span::styled(" #", Style::default().fg(TAG_COLOR)));
            }

            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = format!(" Layers ({}) ", visible.len());
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(FOCUS_COLOR))
                .title(title),
        )
        .highlight_style(Style::default().bg(FOCUS_COLOR).fg(Color::Black));

    frame.render_stateful_widget(list, area, &mut state.list_state);
}
