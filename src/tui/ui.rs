use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};

use super::state::AppState;
use super::widgets::{render_layer_tree, render_preview_panel, render_status_bar, render_tag_popup};

/// Main render function
pub fn render(frame: &mut Frame, state: &mut AppState) {
    let size = frame.area();

    // Main layout: status bar at bottom, content above
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(size);

    let content_area = main_chunks[0];
    let status_area = main_chunks[1];

    // Split content: layer tree | image preview
    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(content_area);

    render_layer_tree(frame, content_chunks[0], state);
    render_preview_panel(frame, content_chunks[1], state);
    render_status_bar(frame, status_area, state);

    if state.show_help {
        render_help_overlay(frame, size);
    }

    if let Some(ref tag_input) = state.tag_input {
        render_tag_popup(frame, size, tag_input);
    }
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let help_text = r#"
  Key Bindings

  Navigation:
    j/↓      Move down
    k/↑      Move up
    h/←      Collapse / to parent
    l/→      Expand group
    Enter    Toggle group

  Actions:
    t        Toggle tags
    u        Undo tag edit
    e        Export layers
    f        Groups as folders
    s        Only selected layers
    p        Withhold tagged layers
    v        Skip invisible layers
    ?        Toggle help
    q        Quit
"#;

    let help_width = 40;
    let help_height = 22;
    let x = (area.width.saturating_sub(help_width)) / 2;
    let y = (area.height.saturating_sub(help_height)) / 2;

    let help_area = Rect::new(x, y, help_width, help_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, help_area);

    let help =
        Paragraph::new(help_text).block(Block::default().borders(Borders::ALL).title(" Help "));

    frame.render_widget(help, help_area);
}
