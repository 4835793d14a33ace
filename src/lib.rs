pub mod cli;
pub mod document;
pub mod logging;
pub mod pipeline;
pub mod preview;
pub mod tui;
