mod layer_tree;
pub mod preview_panel;
mod status_bar;
mod tag_popup;

pub use layer_tree::render_layer_tree;
pub use preview_panel::render_preview_panel;
pub use status_bar::render_status_bar;
pub use tag_popup::render_tag_popup;
