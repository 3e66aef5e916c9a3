//! Reference tree scanner
//!
//! Builds the arena with a single depth-first walk. Sidecar markers are
//! consumed here and never listed as files.

use super::node::{DirectoryNode, NodeId};
use std::fs;
use std::path::Path;

/// Sidecar file whose contents become the directory note
pub const NOTE_MARKER: &str = ".docinfo";

/// Sidecar file that keeps a directory as an empty leaf
pub const IGNORE_MARKER: &str = ".docignore";

/// Walk `dir` and append its subtree to `nodes`, returning the new node id
pub(super) fn scan_into(nodes: &mut Vec<DirectoryNode>, parent: Option<NodeId>, dir: &Path) -> NodeId {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| dir.to_string_lossy().to_string());

    let id = NodeId(nodes.len());
    nodes.push(DirectoryNode::new(name, parent));

    let note_path = dir.join(NOTE_MARKER);
    if note_path.is_file() {
        match fs::read(&note_path) {
            Ok(bytes) => nodes[id.0].note = Some(String::from_utf8_lossy(&bytes).to_string()),
            Err(e) => tracing::warn!("[DirectoryTree] Unreadable note {}: {}", note_path.display(), e),
        }
    }

    if dir.join(IGNORE_MARKER).exists() {
        tracing::debug!("[DirectoryTree] Ignoring contents of {}", dir.display());
        nodes[id.0].ignored = true;
        return id;
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("[DirectoryTree] Cannot list {}: {}", dir.display(), e);
            return id;
        }
    };

    let mut directories = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        // Symlinked directories are listed as files so the walk stays finite
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            directories.push(entry.path());
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        if file_name == NOTE_MARKER || file_name == IGNORE_MARKER {
            continue;
        }
        nodes[id.0].files.push(file_name);
    }

    for sub_dir in directories {
        let child = scan_into(nodes, Some(id), &sub_dir);
        nodes[id.0].subdirectories.push(child);
    }

    id
}
