mod gate;
mod image_preview;
mod name_preview;
mod tree_model;

pub use gate::UpdateGate;
pub use image_preview::{compute_preview_size, ImagePreview, RenderedPreview, MAX_PREVIEW_SIZE};
pub use name_preview::{NamePreview, UpdateRequest};
pub use tree_model::{DisplayNode, DisplayTree};
