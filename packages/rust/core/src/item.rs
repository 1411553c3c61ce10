//! Input items produced by sources, and the filters applied to them before
//! tree assembly.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use docuify_shared::{DocuifyError, FilterConfig, Metadata, NodeKind, Result};

use crate::content::{ContentLoader, FnLoader, StaticContent};

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// One content-bearing unit from a source, identified by a slash path.
#[derive(Clone)]
pub struct Item {
    /// Slash-delimited path, unique within a build (e.g. `docs/intro.md`).
    pub path: String,
    pub kind: NodeKind,
    /// Extension without the dot (e.g. `md`).
    pub extension: Option<String>,
    /// Open metadata, copied onto the file node.
    pub metadata: Option<Metadata>,
    /// Lazy raw content. Only meaningful for files.
    pub loader: Option<Arc<dyn ContentLoader>>,
}

impl Item {
    /// A file item with no extension, metadata, or loader.
    pub fn file(path: impl Into<String>) -> Self {
        Self::new(path, NodeKind::File)
    }

    /// A folder item.
    pub fn folder(path: impl Into<String>) -> Self {
        Self::new(path, NodeKind::Folder)
    }

    fn new(path: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            extension: None,
            metadata: None,
            loader: None,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_loader<L: ContentLoader + 'static>(mut self, loader: L) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Attach a synchronous closure as the loader.
    pub fn with_loader_fn<F>(self, f: F) -> Self
    where
        F: Fn() -> Result<String> + Send + Sync + 'static,
    {
        self.with_loader(FnLoader(f))
    }

    /// Attach in-memory text as the loader.
    pub fn with_content(self, content: impl Into<String>) -> Self {
        self.with_loader(StaticContent(content.into()))
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("extension", &self.extension)
            .field("metadata", &self.metadata)
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Caller-supplied predicate over `(item, index in fetch order)`.
pub type ItemFilter = Box<dyn Fn(&Item, usize) -> bool + Send + Sync>;

/// Glob-based include/exclude filter over item paths.
#[derive(Debug, Clone)]
pub struct PathFilter {
    include_patterns: Vec<Regex>,
    exclude_patterns: Vec<Regex>,
}

impl PathFilter {
    pub fn new(config: &FilterConfig) -> Result<Self> {
        Ok(Self {
            include_patterns: compile_all(&config.include_patterns)?,
            exclude_patterns: compile_all(&config.exclude_patterns)?,
        })
    }

    /// Whether an item at `path` survives the filter.
    pub fn matches(&self, path: &str) -> bool {
        if self.exclude_patterns.iter().any(|p| p.is_match(path)) {
            return false;
        }

        // If any include patterns are configured, must match at least one
        if !self.include_patterns.is_empty() {
            return self.include_patterns.iter().any(|p| p.is_match(path));
        }

        true
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| glob_to_regex(p)).collect()
}

/// Convert a glob-like pattern to a regex.
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*/", "(?:.*/)?")
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", "[^/]");
    Regex::new(&format!("^{escaped}$"))
        .map_err(|e| DocuifyError::config(format!("invalid filter pattern '{pattern}': {e}")))
}
