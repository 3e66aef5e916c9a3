//! Reference Directory Tree
//!
//! In-memory mirror of the existing filing scheme. Built once at startup and
//! read by every categorization afterwards. The views below exist so the
//! model can see the filing convention without receiving the whole tree:
//!
//! - short summary: root children and their subdirectory names
//! - full view: nested JSON with a per-directory file cap
//! - example filenames: a uniform sample of `YYYY-MM-DD...` names
//! - notes: `.docinfo` contents keyed by directory path

mod node;
mod scanner;

pub use node::{DirectoryNode, NodeId};
pub use scanner::{IGNORE_MARKER, NOTE_MARKER};

use crate::error::{DocsortError, Result};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::path::Path;

static DATED_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid date pattern"));

/// A sampled filename and the directory holding it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleFile {
    pub filename: String,
    pub node: NodeId,
}

/// Arena-backed directory tree
#[derive(Debug, Clone)]
pub struct DirectoryTree {
    nodes: Vec<DirectoryNode>,
}

impl DirectoryTree {
    /// Walk `root` and build the tree
    pub fn scan(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(DocsortError::Configuration(format!(
                "Reference directory is not a directory: {}",
                root.display()
            )));
        }

        let mut nodes = Vec::new();
        scanner::scan_into(&mut nodes, None, root);

        let tree = Self { nodes };
        tracing::info!(
            "[DirectoryTree] Scanned {}: {} directories, {} files",
            root.display(),
            tree.directory_count(),
            tree.file_count()
        );
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &DirectoryNode {
        &self.nodes[id.0]
    }

    pub fn directory_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn file_count(&self) -> usize {
        self.nodes.iter().map(|n| n.files.len()).sum()
    }

    /// Look up a direct child directory by name
    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.node(id)
            .subdirectories
            .iter()
            .copied()
            .find(|c| self.node(*c).name == name)
    }

    /// Resolve a slash-separated path below the root
    pub fn find(&self, path: &str) -> Option<NodeId> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self.root(), |id, segment| self.child(id, segment))
    }

    /// Slash-joined ancestry of a node, optionally without the root segment
    pub fn path(&self, id: NodeId, omit_root: bool) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let node = self.node(cur);
            if node.is_root() && omit_root {
                break;
            }
            segments.push(node.name.as_str());
            current = node.parent;
        }
        segments.reverse();
        segments.join("/")
    }

    /// Pre-order traversal of all node ids
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.node(id).subdirectories.iter().rev().copied());
        }
        order
    }

    /// The root's immediate children, in listing order
    pub fn top_level_directories(&self) -> Vec<NodeId> {
        self.node(self.root()).subdirectories.clone()
    }

    pub fn top_level_names(&self) -> Vec<String> {
        self.top_level_directories()
            .into_iter()
            .map(|id| self.node(id).name.clone())
            .collect()
    }

    /// Every node carrying a note, paired with its root-less path
    pub fn notes(&self) -> Vec<(String, &str)> {
        self.walk()
            .into_iter()
            .filter_map(|id| {
                self.node(id)
                    .note
                    .as_deref()
                    .map(|note| (self.path(id, true), note))
            })
            .collect()
    }

    /// Two-level skeleton: each top-level directory mapped to the names of
    /// its own subdirectories
    pub fn short_summary(&self) -> Value {
        let mut top: Vec<NodeId> = self.top_level_directories();
        top.sort_by(|a, b| self.node(*a).name.cmp(&self.node(*b).name));

        let mut map = Map::new();
        for id in top {
            let children: Vec<Value> = self
                .node(id)
                .subdirectories
                .iter()
                .map(|c| Value::String(self.node(*c).name.clone()))
                .collect();
            map.insert(self.node(id).name.clone(), Value::Array(children));
        }
        Value::Object(map)
    }

    /// Recursive view of the whole tree
    ///
    /// With files: `{"files": [...], "dirs": {...}}` per node, `files`
    /// omitted when nothing is shown. Without files: pure nesting.
    pub fn full_view(&self, max_files_per_dir: usize, include_files: bool) -> Value {
        self.full_view_of(self.root(), max_files_per_dir, include_files)
    }

    fn full_view_of(&self, id: NodeId, max_files: usize, include_files: bool) -> Value {
        let node = self.node(id);

        let mut dirs = Map::new();
        for child in &node.subdirectories {
            dirs.insert(
                self.node(*child).name.clone(),
                self.full_view_of(*child, max_files, include_files),
            );
        }

        if !include_files {
            return Value::Object(dirs);
        }

        let mut out = Map::new();
        let shown: Vec<Value> = node
            .files
            .iter()
            .take(max_files)
            .map(|f| Value::String(f.clone()))
            .collect();
        if !shown.is_empty() {
            out.insert("files".to_string(), Value::Array(shown));
        }
        out.insert("dirs".to_string(), Value::Object(dirs));
        Value::Object(out)
    }

    /// All files whose names start with a `YYYY-MM-DD` date
    pub fn dated_files(&self) -> Vec<ExampleFile> {
        self.walk()
            .into_iter()
            .flat_map(|id| {
                self.node(id)
                    .files
                    .iter()
                    .filter(|f| DATED_FILENAME.is_match(f))
                    .map(move |f| ExampleFile {
                        filename: f.clone(),
                        node: id,
                    })
            })
            .collect()
    }

    /// Uniform random sample of at most `count` dated filenames
    pub fn example_filenames(&self, count: usize) -> Vec<ExampleFile> {
        self.example_filenames_with(count, &mut rand::thread_rng())
    }

    pub fn example_filenames_with<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<ExampleFile> {
        let candidates = self.dated_files();
        candidates
            .choose_multiple(rng, count)
            .cloned()
            .collect()
    }

    /// Example filenames as a JSON array of `{path, filename}` objects
    pub fn example_filenames_json(&self, examples: &[ExampleFile]) -> Value {
        Value::Array(
            examples
                .iter()
                .map(|e| {
                    json!({
                        "path": self.path(e.node, true),
                        "filename": e.filename,
                    })
                })
                .collect(),
        )
    }

    /// Box-drawing rendering with at most `max_files_per_dir` files per directory
    pub fn render_ascii(&self, max_files_per_dir: usize) -> String {
        let mut out = format!("{}/\n", self.node(self.root()).name);
        self.render_children(self.root(), "", max_files_per_dir, &mut out);
        out
    }

    fn render_children(&self, id: NodeId, prefix: &str, max_files: usize, out: &mut String) {
        enum Entry<'a> {
            Text(String),
            Dir(&'a DirectoryNode, NodeId),
        }

        let node = self.node(id);
        let shown = node.files.len().min(max_files);
        let mut entries: Vec<Entry> = node.files[..shown]
            .iter()
            .map(|f| Entry::Text(f.clone()))
            .collect();
        let remaining = node.files.len() - shown;
        if remaining > 0 {
            entries.push(Entry::Text(format!("({} more files)", remaining)));
        }
        entries.extend(
            node.subdirectories
                .iter()
                .map(|c| Entry::Dir(self.node(*c), *c)),
        );

        let count = entries.len();
        for (i, entry) in entries.into_iter().enumerate() {
            let is_last = i + 1 == count;
            let branch = if is_last { "└── " } else { "├── " };
            match entry {
                Entry::Text(text) => {
                    out.push_str(&format!("{}{}{}\n", prefix, branch, text));
                }
                Entry::Dir(dir, child) => {
                    out.push_str(&format!("{}{}{}/\n", prefix, branch, dir.name));
                    let next = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
                    self.render_children(child, &next, max_files, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;
    use tempfile::tempdir;

    fn create_test_tree() -> (DirectoryTree, tempfile::TempDir) {
        let temp = tempdir().unwrap();
        let root = temp.path();

        fs::create_dir_all(root.join("Finance/Invoices")).unwrap();
        fs::create_dir_all(root.join("Finance/Taxes")).unwrap();
        fs::create_dir_all(root.join("Health")).unwrap();
        fs::create_dir_all(root.join("Archive/Old/Deep")).unwrap();

        fs::write(root.join("Finance/Invoices/2024-01-10 Invoice Acme.pdf"), "x").unwrap();
        fs::write(root.join("Finance/Invoices/2023-11-02 Invoice Globex.pdf"), "x").unwrap();
        fs::write(root.join("Finance/Invoices/notes.txt"), "x").unwrap();
        fs::write(root.join("Finance/Taxes/2022-05-01 Tax Return.pdf"), "x").unwrap();
        fs::write(root.join("Health/2021-07-19 Vaccination.pdf"), "x").unwrap();
        fs::write(root.join("Health/readme.md"), "x").unwrap();
        fs::write(root.join("Finance/.docinfo"), "Bank, invoices and taxes").unwrap();
        fs::write(root.join("Archive/.docignore"), "").unwrap();
        fs::write(root.join("Archive/2020-01-01 Hidden.pdf"), "x").unwrap();

        let tree = DirectoryTree::scan(root).unwrap();
        (tree, temp)
    }

    #[test]
    fn test_scan_rejects_missing_root() {
        let temp = tempdir().unwrap();
        let err = DirectoryTree::scan(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, DocsortError::Configuration(_)));
    }

    #[test]
    fn test_ignored_directory_is_empty_leaf() {
        let (tree, _temp) = create_test_tree();

        let archive = tree.find("Archive").expect("ignored dir still listed");
        let node = tree.node(archive);
        assert!(node.ignored);
        assert!(node.files.is_empty());
        assert!(node.subdirectories.is_empty());
        assert!(tree.top_level_names().contains(&"Archive".to_string()));
    }

    #[test]
    fn test_sidecars_not_listed_as_files() {
        let (tree, _temp) = create_test_tree();
        let finance = tree.find("Finance").unwrap();
        assert!(tree.node(finance).files.is_empty());
        assert_eq!(tree.node(finance).note.as_deref(), Some("Bank, invoices and taxes"));
    }

    #[test]
    fn test_path_rendering() {
        let (tree, _temp) = create_test_tree();
        let root = tree.root();
        assert_eq!(tree.path(root, true), "");
        assert_eq!(tree.path(root, false), tree.node(root).name);

        let invoices = tree.find("Finance/Invoices").unwrap();
        assert_eq!(tree.path(invoices, true), "Finance/Invoices");
        assert!(tree
            .path(invoices, false)
            .ends_with("/Finance/Invoices"));

        for id in tree.walk() {
            assert!(!tree.path(id, true).starts_with('/'));
        }
    }

    #[test]
    fn test_short_summary_is_two_levels() {
        let (tree, _temp) = create_test_tree();
        let summary = tree.short_summary();
        let obj = summary.as_object().unwrap();

        let keys: Vec<&String> = obj.keys().collect();
        assert_eq!(keys, vec!["Archive", "Finance", "Health"]);

        let mut finance: Vec<&str> = obj["Finance"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        finance.sort();
        assert_eq!(finance, vec!["Invoices", "Taxes"]);
        assert!(obj["Health"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_full_view_caps_files() {
        let (tree, _temp) = create_test_tree();
        let view = tree.full_view(1, true);
        let invoices = &view["dirs"]["Finance"]["dirs"]["Invoices"];
        assert_eq!(invoices["files"].as_array().unwrap().len(), 1);
        // Directories without shown files omit the key entirely
        assert!(view["dirs"]["Finance"].get("files").is_none());

        let bare = tree.full_view(10, false);
        assert!(bare["Finance"]["Invoices"].as_object().unwrap().is_empty());
        assert!(bare.get("files").is_none());
    }

    #[test]
    fn test_example_filenames_only_dated() {
        let (tree, _temp) = create_test_tree();
        let mut rng = StdRng::seed_from_u64(7);

        let examples = tree.example_filenames_with(2, &mut rng);
        assert_eq!(examples.len(), 2);
        for example in &examples {
            assert!(DATED_FILENAME.is_match(&example.filename));
        }

        // Fewer matches than requested returns every match
        let all = tree.example_filenames_with(50, &mut rng);
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|e| e.filename != "2020-01-01 Hidden.pdf"));
    }

    #[test]
    fn test_example_filenames_json_uses_owning_path() {
        let (tree, _temp) = create_test_tree();
        let examples: Vec<ExampleFile> = tree
            .dated_files()
            .into_iter()
            .filter(|e| e.filename.contains("Vaccination"))
            .collect();
        let json = tree.example_filenames_json(&examples);
        assert_eq!(json[0]["path"], "Health");
        assert_eq!(json[0]["filename"], "2021-07-19 Vaccination.pdf");
    }

    #[test]
    fn test_notes_collection() {
        let (tree, _temp) = create_test_tree();
        let notes = tree.notes();
        assert_eq!(notes, vec![("Finance".to_string(), "Bank, invoices and taxes")]);
    }

    #[test]
    fn test_render_ascii_truncates() {
        let (tree, _temp) = create_test_tree();
        let rendered = tree.render_ascii(1);
        assert!(rendered.contains("Finance/"));
        assert!(rendered.contains("(2 more files)"));
        assert!(rendered.lines().next().unwrap().ends_with('/'));
    }
}
