mod exporter;
mod filter;
mod item;
mod naming;
mod settings;
mod tree;

pub use exporter::{ExportStats, LayerExporter, PipelineError, SettingsOverride};
pub use filter::{rules, FilterRule, FilterStack};
pub use item::{ItemElement, ItemId, ItemType};
pub use settings::{ExportSettings, OutputFormat};
pub use tree::ItemTree;

/// Shared document constructors for tests across the crate.
#[cfg(test)]
pub mod test_helpers {
    use std::path::PathBuf;

    use crate::document::{Document, LayerNode};

    /// A small document exercising groups, tags and visibility:
    ///
    /// ```text
    /// sky            [background]
    /// characters/
    ///   hero
    ///   sidekick     [wip]
    /// notes/         (empty group)
    /// hidden         (invisible leaf)
    /// ```
    pub fn create_test_document() -> Document {
        let mut hidden = LayerNode::leaf("hidden", PathBuf::from("hidden.png"));
        hidden.visible = false;

        Document::new(
            "test",
            PathBuf::from("."),
            vec![
                LayerNode::leaf("[background] sky", PathBuf::from("sky.png")),
                LayerNode::group(
                    "characters",
                    vec![
                        LayerNode::leaf("hero", PathBuf::from("hero.png")),
                        LayerNode::leaf("[wip] sidekick", PathBuf::from("sidekick.png")),
                    ],
                ),
                LayerNode::group("notes", Vec::new()),
                hidden,
            ],
        )
    }
}
