//! Directory tree node definitions
//!
//! Nodes live in the arena owned by `DirectoryTree` and refer to each other
//! through `NodeId` handles. Children are owned by position in the arena;
//! the parent handle is only used to rebuild paths.

/// Handle into the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One directory of the reference tree
#[derive(Debug, Clone)]
pub struct DirectoryNode {
    /// Directory basename
    pub name: String,

    /// Parent directory (None for root)
    pub parent: Option<NodeId>,

    /// Filenames directly inside this directory, in listing order
    pub files: Vec<String>,

    /// Child directories, in listing order
    pub subdirectories: Vec<NodeId>,

    /// Contents of the `.docinfo` sidecar, if present
    pub note: Option<String>,

    /// Whether a `.docignore` marker stopped the walk here
    pub ignored: bool,
}

impl DirectoryNode {
    pub(crate) fn new(name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            parent,
            files: Vec::new(),
            subdirectories: Vec::new(),
            note: None,
            ignored: false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
