//! Layered-image document model.
//!
//! A document is an ordered stack of layers and layer groups. It can be
//! loaded from a JSON manifest (explicit layer stack with per-layer source
//! bitmaps) or built by scanning a directory tree, where subdirectories
//! become groups and image files become leaf layers.
//!
//! Layer names may carry `[tag]` prefixes (e.g. `"[background] sky"`); the
//! prefixes are parsed into the layer's tag set and stripped from the
//! display name. Tag edits are journaled in undo groups so a batch of
//! related edits reverts as one step.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::debug;
use walkdir::WalkDir;

/// One layer or layer group in the document stack.
#[derive(Debug, Clone)]
pub struct LayerNode {
    /// Display name, `[tag]` prefixes already stripped.
    pub name: String,
    /// Bitmap file backing a leaf layer. Groups have none.
    pub source: Option<PathBuf>,
    pub visible: bool,
    pub tags: BTreeSet<String>,
    pub children: Vec<LayerNode>,
    /// Distinguishes an empty group from a leaf.
    pub is_group: bool,
}

impl LayerNode {
    pub fn leaf(name: &str, source: PathBuf) -> Self {
        let (tags, name) = parse_tag_prefixes(name);
        Self {
            name,
            source: Some(source),
            visible: true,
            tags,
            children: Vec::new(),
            is_group: false,
        }
    }

    pub fn group(name: &str, children: Vec<LayerNode>) -> Self {
        let (tags, name) = parse_tag_prefixes(name);
        Self {
            name,
            source: None,
            visible: true,
            tags,
            children,
            is_group: true,
        }
    }
}

/// A recorded tag mutation, stored so `undo` can reverse it.
#[derive(Debug, Clone)]
enum TagEdit {
    Added { path: Vec<usize>, tag: String },
    Removed { path: Vec<usize>, tag: String },
}

/// Layered-image document: named, ordered layer stack plus a tag-edit journal.
#[derive(Debug)]
pub struct Document {
    pub name: String,
    /// Directory that relative source paths resolve against.
    pub base_dir: PathBuf,
    pub layers: Vec<LayerNode>,
    undo_stack: Vec<Vec<TagEdit>>,
    open_group: Option<Vec<TagEdit>>,
}

// ==================== Manifest format ====================

#[derive(Deserialize)]
struct Manifest {
    name: Option<String>,
    layers: Vec<ManifestLayer>,
}

#[derive(Deserialize)]
struct ManifestLayer {
    name: String,
    source: Option<PathBuf>,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(default)]
    tags: Vec<String>,
    /// Present (even if empty) for groups, absent for leaves.
    layers: Option<Vec<ManifestLayer>>,
}

fn default_visible() -> bool {
    true
}

impl Document {
    /// Create a document from an already-built layer stack.
    pub fn new(name: impl Into<String>, base_dir: PathBuf, layers: Vec<LayerNode>) -> Self {
        Self {
            name: name.into(),
            base_dir,
            layers,
            undo_stack: Vec::new(),
            open_group: None,
        }
    }

    /// Load a document from a path: a `.json` manifest or a directory.
    pub fn load(source: &Path) -> Result<Self> {
        if source.is_dir() {
            Self::from_directory(source)
        } else {
            Self::from_manifest(source)
        }
    }

    /// Load a document from a JSON manifest file.
    pub fn from_manifest(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&text)
            .with_context(|| format!("Invalid manifest: {}", path.display()))?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let name = manifest.name.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "untitled".to_string())
        });

        let layers = manifest
            .layers
            .into_iter()
            .map(|layer| convert_manifest_layer(layer, path))
            .collect::<Result<Vec<_>>>()?;

        debug!(name = %name, layers = layers.len(), "loaded manifest document");

        Ok(Self {
            name,
            base_dir,
            layers,
            undo_stack: Vec::new(),
            open_group: None,
        })
    }

    /// Build a document by scanning a directory tree. Subdirectories become
    /// layer groups, image files become leaf layers, both in name order.
    pub fn from_directory(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            bail!("Not a directory: {}", root.display());
        }

        let name = root
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string());

        let layers = scan_directory(root)?;

        debug!(name = %name, layers = layers.len(), "scanned directory document");

        Ok(Self {
            name,
            base_dir: root.to_path_buf(),
            layers,
            undo_stack: Vec::new(),
            open_group: None,
        })
    }

    /// Look up a layer by its index path from the root.
    pub fn node_at(&self, path: &[usize]) -> Option<&LayerNode> {
        let (&first, rest) = path.split_first()?;
        let mut node = self.layers.get(first)?;
        for &index in rest {
            node = node.children.get(index)?;
        }
        Some(node)
    }

    fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut LayerNode> {
        let (&first, rest) = path.split_first()?;
        let mut node = self.layers.get_mut(first)?;
        for &index in rest {
            node = node.children.get_mut(index)?;
        }
        Some(node)
    }

    // ==================== Tag editing ====================

    /// Open an undo group: subsequent tag edits revert as one `undo` step.
    pub fn begin_undo_group(&mut self) {
        if self.open_group.is_none() {
            self.open_group = Some(Vec::new());
        }
    }

    /// Close the current undo group, pushing it onto the undo stack.
    /// Empty groups are discarded.
    pub fn end_undo_group(&mut self) {
        if let Some(group) = self.open_group.take() {
            if !group.is_empty() {
                self.undo_stack.push(group);
            }
        }
    }

    /// Add a tag to the layer at `path`. Returns false if the layer already
    /// had the tag or the path is stale.
    pub fn add_tag(&mut self, path: &[usize], tag: &str) -> bool {
        let Some(node) = self.node_at_mut(path) else {
            return false;
        };
        if !node.tags.insert(tag.to_string()) {
            return false;
        }
        self.record(TagEdit::Added {
            path: path.to_vec(),
            tag: tag.to_string(),
        });
        true
    }

    /// Remove a tag from the layer at `path`. Returns false if the layer did
    /// not have the tag or the path is stale.
    pub fn remove_tag(&mut self, path: &[usize], tag: &str) -> bool {
        let Some(node) = self.node_at_mut(path) else {
            return false;
        };
        if !node.tags.remove(tag) {
            return false;
        }
        self.record(TagEdit::Removed {
            path: path.to_vec(),
            tag: tag.to_string(),
        });
        true
    }

    /// Revert the most recent undo group. Returns false if there is nothing
    /// to undo.
    pub fn undo(&mut self) -> bool {
        let Some(group) = self.undo_stack.pop() else {
            return false;
        };
        for edit in group.iter().rev() {
            match edit {
                TagEdit::Added { path, tag } => {
                    if let Some(node) = self.node_at_mut(path) {
                        node.tags.remove(tag);
                    }
                }
                TagEdit::Removed { path, tag } => {
                    if let Some(node) = self.node_at_mut(path) {
                        node.tags.insert(tag.clone());
                    }
                }
            }
        }
        true
    }

    /// Every tag used anywhere in the document, sorted.
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags = BTreeSet::new();
        let mut stack: Vec<&LayerNode> = self.layers.iter().collect();
        while let Some(node) = stack.pop() {
            tags.extend(node.tags.iter().cloned());
            stack.extend(node.children.iter());
        }
        tags.into_iter().collect()
    }

    fn record(&mut self, edit: TagEdit) {
        match self.open_group.as_mut() {
            Some(group) => group.push(edit),
            None => self.undo_stack.push(vec![edit]),
        }
    }
}

fn convert_manifest_layer(layer: ManifestLayer, manifest_path: &Path) -> Result<LayerNode> {
    let (mut tags, name) = parse_tag_prefixes(&layer.name);
    tags.extend(layer.tags.iter().cloned());

    match layer.layers {
        Some(children) => {
            if layer.source.is_some() {
                bail!(
                    "Layer group {:?} in {} must not have a source",
                    layer.name,
                    manifest_path.display()
                );
            }
            let children = children
                .into_iter()
                .map(|child| convert_manifest_layer(child, manifest_path))
                .collect::<Result<Vec<_>>>()?;
            Ok(LayerNode {
                name,
                source: None,
                visible: layer.visible,
                tags,
                children,
                is_group: true,
            })
        }
        None => {
            let source = layer.source.with_context(|| {
                format!(
                    "Layer {:?} in {} has no source bitmap",
                    layer.name,
                    manifest_path.display()
                )
            })?;
            Ok(LayerNode {
                name,
                source: Some(source),
                visible: layer.visible,
                tags,
                children: Vec::new(),
                is_group: false,
            })
        }
    }
}

fn scan_directory(dir: &Path) -> Result<Vec<LayerNode>> {
    let mut nodes = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to scan {}", dir.display()))?;
        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();

        // Skip hidden entries
        if file_name.starts_with('.') {
            continue;
        }

        if entry.file_type().is_dir() {
            let children = scan_directory(path)?;
            nodes.push(LayerNode::group(&file_name, children));
        } else if is_image_file(path) {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.into_owned());
            nodes.push(LayerNode::leaf(&stem, path.to_path_buf()));
        }
    }

    Ok(nodes)
}

/// Check whether a path looks like a supported bitmap source.
pub fn is_image_file(path: &Path) -> bool {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    matches!(
        extension.as_str(),
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "tiff" | "tif"
    )
}

/// Split leading `[tag]` prefixes off a raw layer name.
///
/// `"[background] [dark] sky"` yields tags `{background, dark}` and the
/// display name `"sky"`. A name that is nothing but prefixes keeps its
/// trimmed raw form so it never becomes empty.
pub fn parse_tag_prefixes(raw: &str) -> (BTreeSet<String>, String) {
    let mut tags = BTreeSet::new();
    let mut rest = raw.trim();

    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(end) = stripped.find(']') else {
            break;
        };
        let tag = stripped[..end].trim();
        if tag.is_empty() {
            break;
        }
        tags.insert(tag.to_string());
        rest = stripped[end + 1..].trim_start();
    }

    let name = if rest.is_empty() { raw.trim() } else { rest };
    (tags, name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_tag_prefixes_single() {
        let (tags, name) = parse_tag_prefixes("[background] sky");
        assert_eq!(name, "sky");
        assert!(tags.contains("background"));
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn test_parse_tag_prefixes_multiple() {
        let (tags, name) = parse_tag_prefixes("[background] [dark] sky");
        assert_eq!(name, "sky");
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("background"));
        assert!(tags.contains("dark"));
    }

    #[test]
    fn test_parse_tag_prefixes_none() {
        let (tags, name) = parse_tag_prefixes("plain layer");
        assert!(tags.is_empty());
        assert_eq!(name, "plain layer");
    }

    #[test]
    fn test_parse_tag_prefixes_only_prefix_keeps_raw_name() {
        // A name that is nothing but a prefix must not end up empty
        let (tags, name) = parse_tag_prefixes("[background]");
        assert!(tags.contains("background"));
        assert_eq!(name, "[background]");
    }

    #[test]
    fn test_parse_tag_prefixes_bracket_mid_name_not_a_tag() {
        let (tags, name) = parse_tag_prefixes("sky [at night]");
        assert!(tags.is_empty());
        assert_eq!(name, "sky [at night]");
    }

    #[test]
    fn test_manifest_roundtrip() {
        let temp = TempDir::new().unwrap();
        let manifest_path = temp.path().join("doc.json");
        fs::write(
            &manifest_path,
            r#"{
                "name": "poster",
                "layers": [
                    {"name": "[background] sky", "source": "sky.png"},
                    {"name": "characters", "layers": [
                        {"name": "hero", "source": "hero.png", "tags": ["export"]},
                        {"name": "sidekick", "source": "sidekick.png", "visible": false}
                    ]},
                    {"name": "notes", "layers": []}
                ]
            }"#,
        )
        .unwrap();

        let doc = Document::from_manifest(&manifest_path).unwrap();
        assert_eq!(doc.name, "poster");
        assert_eq!(doc.layers.len(), 3);

        assert_eq!(doc.layers[0].name, "sky");
        assert!(doc.layers[0].tags.contains("background"));
        assert!(!doc.layers[0].is_group);

        let group = &doc.layers[1];
        assert!(group.is_group);
        assert_eq!(group.children.len(), 2);
        assert!(group.children[0].tags.contains("export"));
        assert!(!group.children[1].visible);

        // Group with an empty "layers" array is an empty group, not a leaf
        assert!(doc.layers[2].is_group);
        assert!(doc.layers[2].children.is_empty());
    }

    #[test]
    fn test_manifest_leaf_without_source_fails() {
        let temp = TempDir::new().unwrap();
        let manifest_path = temp.path().join("doc.json");
        fs::write(
            &manifest_path,
            r#"{"layers": [{"name": "orphan"}]}"#,
        )
        .unwrap();

        assert!(Document::from_manifest(&manifest_path).is_err());
    }

    #[test]
    fn test_directory_scan_builds_groups() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("characters")).unwrap();
        fs::write(temp.path().join("background.png"), b"png").unwrap();
        fs::write(temp.path().join("characters/hero.png"), b"png").unwrap();
        fs::write(temp.path().join("characters/notes.txt"), b"txt").unwrap();

        let doc = Document::from_directory(temp.path()).unwrap();
        assert_eq!(doc.layers.len(), 2);

        // Sorted by file name: "background.png" < "characters"
        assert_eq!(doc.layers[0].name, "background");
        assert!(!doc.layers[0].is_group);

        assert_eq!(doc.layers[1].name, "characters");
        assert!(doc.layers[1].is_group);
        // Non-image files are skipped
        assert_eq!(doc.layers[1].children.len(), 1);
        assert_eq!(doc.layers[1].children[0].name, "hero");
    }

    #[test]
    fn test_node_at_resolves_paths() {
        let doc = Document::new(
            "test",
            PathBuf::from("."),
            vec![
                LayerNode::leaf("a", PathBuf::from("a.png")),
                LayerNode::group(
                    "g",
                    vec![LayerNode::leaf("b", PathBuf::from("b.png"))],
                ),
            ],
        );

        assert_eq!(doc.node_at(&[0]).unwrap().name, "a");
        assert_eq!(doc.node_at(&[1, 0]).unwrap().name, "b");
        assert!(doc.node_at(&[2]).is_none());
        assert!(doc.node_at(&[1, 5]).is_none());
        assert!(doc.node_at(&[]).is_none());
    }

    #[test]
    fn test_tag_edit_and_undo_group() {
        let mut doc = Document::new(
            "test",
            PathBuf::from("."),
            vec![
                LayerNode::leaf("a", PathBuf::from("a.png")),
                LayerNode::leaf("b", PathBuf::from("b.png")),
            ],
        );

        doc.begin_undo_group();
        assert!(doc.add_tag(&[0], "export"));
        assert!(doc.add_tag(&[1], "export"));
        doc.end_undo_group();

        assert!(doc.node_at(&[0]).unwrap().tags.contains("export"));
        assert!(doc.node_at(&[1]).unwrap().tags.contains("export"));

        // One undo reverts the whole group
        assert!(doc.undo());
        assert!(!doc.node_at(&[0]).unwrap().tags.contains("export"));
        assert!(!doc.node_at(&[1]).unwrap().tags.contains("export"));
        assert!(!doc.undo());
    }

    #[test]
    fn test_duplicate_tag_add_is_noop() {
        let mut doc = Document::new(
            "test",
            PathBuf::from("."),
            vec![LayerNode::leaf("a", PathBuf::from("a.png"))],
        );

        assert!(doc.add_tag(&[0], "export"));
        assert!(!doc.add_tag(&[0], "export"));
        assert!(!doc.remove_tag(&[0], "missing"));
        // Stale paths are ignored, not errors
        assert!(!doc.add_tag(&[9], "export"));
    }

    #[test]
    fn test_all_tags_collects_nested() {
        let mut group = LayerNode::group(
            "g",
            vec![LayerNode::leaf("[fg] b", PathBuf::from("b.png"))],
        );
        group.tags.insert("group-tag".to_string());

        let doc = Document::new(
            "test",
            PathBuf::from("."),
            vec![LayerNode::leaf("[bg] a", PathBuf::from("a.png")), group],
        );

        assert_eq!(doc.all_tags(), vec!["bg", "fg", "group-tag"]);
    }
}
