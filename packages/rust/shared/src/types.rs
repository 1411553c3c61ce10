//! Core domain types shared by sources, the tree engine, and plugins.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Open key-value metadata attached to items and copied onto file nodes.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// Whether an item or node is a file (leaf) or a folder (container).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

impl NodeKind {
    pub fn is_file(self) -> bool {
        self == Self::File
    }

    pub fn is_folder(self) -> bool {
        self == Self::Folder
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Folder => f.write_str("folder"),
        }
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

static EXTENSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.([^./\\]+)$").expect("valid extension regex"));

/// Extract the extension (without the dot) from a file name or path.
///
/// Returns `None` when the final segment has no extension.
pub fn extension_of(name: &str) -> Option<String> {
    EXTENSION_RE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Split a slash-delimited path into its non-empty segments.
///
/// Leading, trailing, and repeated slashes do not produce empty segments.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
