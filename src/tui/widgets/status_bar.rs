use ratatui::{layout::Rect, prelude::*, widgets::Paragraph};

use crate::tui::colors::{setting_indicator, STATUS_BAR_BG, STATUS_BAR_FG, WARNING_COLOR};
use crate::tui::state::AppState;

pub fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState) {
    let settings = &state.exporter.settings;

    let mut spans = vec![
        Span::styled(
            format!(" {} ", state.exporter.document.name),
            Style::default()
                .fg(STATUS_BAR_FG)
                .add_modifier(Modifier::BOLD),
        ),
        setting_indicator("folders", settings.layer_groups_as_folders),
        Span::raw(" "),
        setting_indicator("selected", settings.export_only_selected_layers),
        Span::raw(" "),
        setting_indicator("tagged", settings.process_tagged_layers),
        Span::raw(" "),
        setting_indicator("visible", settings.ignore_invisible),
        Span::raw("  "),
    ];

    match &state.status_message {
        Some(message) => {
            spans.push(Span::styled(
                message.clone(),
                Style::default().fg(WARNING_COLOR),
            ));
        }
        None => {
            spans.push(Span::styled(
                "e: export  t: tag  f/s/p/v: settings  ?: help  q: quit",
                Style::default().fg(STATUS_BAR_FG),
            ));
        }
    }

    let bar = Paragraph::new(Line::from(spans)).style(Style::default().bg(STATUS_BAR_BG));
    frame.render_widget(bar, area);
}
