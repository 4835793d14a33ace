use image::DynamicImage;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};
use ratatui_image::{picker::Picker, protocol::StatefulProtocol, FilterType, Resize, StatefulImage};
use std::sync::{Mutex, OnceLock};

use crate::pipeline::ItemId;
use crate::tui::colors::{HELP_TEXT, UNFOCUS_BORDER};
use crate::tui::state::AppState;

// Rough terminal cell size in pixels, used to translate the pane size into
// a pixel draw area for the preview core.
const CELL_PIXEL_WIDTH: u32 = 8;
const CELL_PIXEL_HEIGHT: u32 = 16;

// Global picker (created once, thread-safe)
static PICKER: OnceLock<Mutex<Option<Picker>>> = OnceLock::new();

fn get_picker_mutex() -> &'static Mutex<Option<Picker>> {
    PICKER.get_or_init(|| {
        Mutex::new(Picker::from_termios().ok().map(|mut picker| {
            picker.guess_protocol();
            picker
        }))
    })
}

/// Create a stateful protocol from a scaled preview bitmap.
fn create_protocol(image: DynamicImage) -> Option<Box<dyn StatefulProtocol>> {
    let mut picker_guard = get_picker_mutex().lock().ok()?;
    let picker = picker_guard.as_mut()?;
    Some(picker.new_resize_protocol(image))
}

/// Terminal image protocol cached for the currently previewed bitmap.
pub struct PreviewProtocol {
    pub item_id: ItemId,
    pub size: (u32, u32),
    pub protocol: Box<dyn StatefulProtocol>,
}

/// Render the single-layer thumbnail pane, driving the preview core with
/// the pane's pixel size. Repeated calls are cheap: the core skips no-op
/// rescales and the protocol is rebuilt only when the bitmap changes.
pub fn render_preview_panel(frame: &mut Frame, area: Rect, state: &mut AppState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(UNFOCUS_BORDER))
        .title(" Preview ");
    let inner = block.inner(area);
    frame.render_widget(block, area);
    state.preview_area = inner;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(inner);
    let image_area = chunks[0];
    let label_area = chunks[1];

    let draw_width = u32::from(image_area.width) * CELL_PIXEL_WIDTH;
    let draw_height = u32::from(image_area.height) * CELL_PIXEL_HEIGHT;

    state
        .image_preview
        .update(&mut state.exporter, draw_width, draw_height, false);

    let rendered_info = state
        .image_preview
        .rendered()
        .map(|r| (r.item_id, (r.scaled.width(), r.scaled.height()), r.name.clone()));

    match rendered_info {
        Some((item_id, size, name)) => {
            let stale = state
                .protocol_cache
                .as_ref()
                .map(|cache| cache.item_id != item_id || cache.size != size)
                .unwrap_or(true);
            if stale {
                let image = state.image_preview.rendered().map(|r| r.scaled.clone());
                state.protocol_cache = image.and_then(create_protocol).map(|protocol| {
                    PreviewProtocol {
                        item_id,
                        size,
                        protocol,
                    }
                });
            }

            match state.protocol_cache.as_mut() {
                Some(cache) => {
                    let widget =
                        StatefulImage::new(None).resize(Resize::Fit(Some(FilterType::Nearest)));
                    frame.render_stateful_widget(widget, image_area, &mut cache.protocol);
                }
                None => {
                    let placeholder = Paragraph::new(
                        "Image preview not available\n(terminal doesn't support graphics)",
                    )
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(HELP_TEXT));
                    frame.render_widget(placeholder, image_area);
                }
            }

            let label = Paragraph::new(name)
                .alignment(Alignment::Center)
                .style(Style::default().add_modifier(Modifier::ITALIC));
            frame.render_widget(label, label_area);
        }
        None => {
            state.protocol_cache = None;

            let message = if state.image_preview.item_id().is_some() {
                "No preview available"
            } else {
                "Select a layer to preview"
            };
            let placeholder = Paragraph::new(message)
                .alignment(Alignment::Center)
                .style(Style::default().fg(HELP_TEXT));
            frame.render_widget(placeholder, image_area);

            let label = Paragraph::new("No selection")
                .alignment(Alignment::Center)
                .style(Style::default().fg(HELP_TEXT).add_modifier(Modifier::ITALIC));
            frame.render_widget(label, label_area);
        }
    }
}
