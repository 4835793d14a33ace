use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::io::stdout;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::document::Document;
use crate::pipeline::{ExportSettings, LayerExporter};

use super::state::AppState;
use super::ui::render;

/// Run the TUI preview application.
#[instrument(skip_all, fields(source = %source.display()))]
pub fn run_tui(source: &Path) -> Result<()> {
    info!("starting TUI");

    let document = Document::load(source)?;
    info!(name = %document.name, layers = document.layers.len(), "document loaded");

    let settings = ExportSettings::load_defaults();
    let mut state = AppState::new(LayerExporter::new(document, settings));

    // Setup terminal
    debug!("setting up terminal");
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Main loop
    let result = run_app(&mut terminal, &mut state);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    state.persist_settings();

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
) -> Result<()> {
    loop {
        // Force full terminal repaint after closing overlays — image protocol
        // content (kitty/sixel) gets destroyed by overlays and ratatui's diff
        // alone can't restore it.
        if state.force_redraw {
            state.force_redraw = false;
            terminal.clear()?;
        }

        terminal.draw(|frame| render(frame, state))?;

        if event::poll(Duration::from_millis(250))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    match handle_key(key.code, state)? {
                        KeyAction::Quit => return Ok(()),
                        KeyAction::Continue => {}
                    }
                }
                _ => {}
            }
        }

        // Drain all pending events to avoid lag during rapid navigation
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    match handle_key(key.code, state)? {
                        KeyAction::Quit => return Ok(()),
                        KeyAction::Continue => {}
                    }
                }
                _ => {}
            }
        }
    }
}

enum KeyAction {
    Quit,
    Continue,
}

/// Handle a key press. Returns the action the loop should take next.
fn handle_key(code: KeyCode, state: &mut AppState) -> Result<KeyAction> {
    // Tag popup eats all keys while open
    if state.tag_input.is_some() {
        match code {
            KeyCode::Esc => state.close_tag_input(),
            KeyCode::Enter => state.toggle_tag(),
            KeyCode::Up => {
                if let Some(input) = state.tag_input.as_mut() {
                    input.move_up();
                }
            }
            KeyCode::Down => {
                if let Some(input) = state.tag_input.as_mut() {
                    input.move_down();
                }
            }
            KeyCode::Backspace => {
                if let Some(input) = state.tag_input.as_mut() {
                    input.pop_char_and_filter();
                }
            }
            KeyCode::Char(c) => {
                if let Some(input) = state.tag_input.as_mut() {
                    input.push_char_and_filter(c);
                }
            }
            _ => {}
        }
        return Ok(KeyAction::Continue);
    }

    // Help overlay — eat all keys except ? and Esc which close it
    if state.show_help {
        match code {
            KeyCode::Char('?') | KeyCode::Esc => state.toggle_help(),
            _ => {}
        }
        return Ok(KeyAction::Continue);
    }

    // Clear status message on any key
    state.clear_status_message();

    match code {
        KeyCode::Char('q') => return Ok(KeyAction::Quit),
        KeyCode::Char('j') | KeyCode::Down => state.move_down(),
        KeyCode::Char('k') | KeyCode::Up => state.move_up(),
        KeyCode::Char('h') | KeyCode::Left => state.collapse_current(),
        KeyCode::Char('l') | KeyCode::Right => state.expand_current(),
        KeyCode::Enter | KeyCode::Char(' ') => state.toggle_expand(),
        KeyCode::Char('t') => state.open_tag_input(),
        KeyCode::Char('u') => state.undo_tag_edit(),
        KeyCode::Char('e') => state.run_export()?,
        KeyCode::Char('f') => state.toggle_folders(),
        KeyCode::Char('s') => state.toggle_only_selected(),
        KeyCode::Char('p') => state.toggle_tagged(),
        KeyCode::Char('v') => state.toggle_only_visible(),
        KeyCode::Char('?') => state.toggle_help(),
        _ => {}
    }
    Ok(KeyAction::Continue)
}
