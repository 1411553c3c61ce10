//! Local directory source.
//!
//! Walks a directory tree and emits a folder item per directory and a file
//! item per regular file. File text is read lazily, when a node is loaded.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use docuify_core::{ContentLoader, Item, Source};
use docuify_shared::{DocuifyError, Result, extension_of};

/// Source name recorded in build footers.
const SOURCE_NAME: &str = "local-file-source";

/// Reads every file below a root directory.
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    root: PathBuf,
}

impl LocalFileSource {
    /// Relative roots are resolved against the current directory at fetch
    /// time.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Source for LocalFileSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    #[instrument(skip_all, fields(root = %self.root.display()))]
    async fn fetch(&self) -> Result<Vec<Item>> {
        let metadata = tokio::fs::metadata(&self.root).await.map_err(|e| {
            DocuifyError::config(format!("cannot read source root {}: {e}", self.root.display()))
        })?;
        if !metadata.is_dir() {
            return Err(DocuifyError::config(format!(
                "source root {} is not a directory",
                self.root.display()
            )));
        }

        let mut items = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let mut subdirs = Vec::new();

            for (name, path, file_type) in read_sorted(&dir).await? {
                let relative = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}/{name}")
                };

                if file_type.is_dir() {
                    items.push(Item::folder(relative.clone()));
                    subdirs.push((path, relative));
                } else if file_type.is_file() {
                    let mut item = Item::file(relative.clone()).with_loader(LocalFileLoader {
                        path,
                        relative,
                    });
                    item.extension = extension_of(&name);
                    items.push(item);
                } else {
                    debug!(path = %path.display(), "skipping non-regular entry");
                }
            }

            // Reverse so directories are expanded in name order.
            pending.extend(subdirs.into_iter().rev());
        }

        info!(items = items.len(), "local directory listed");
        Ok(items)
    }
}

/// Directory entries sorted by name. Entries with non-UTF-8 names are skipped.
async fn read_sorted(dir: &Path) -> Result<Vec<(String, PathBuf, std::fs::FileType)>> {
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| DocuifyError::io(dir, e))?;

    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await.map_err(|e| DocuifyError::io(dir, e))? {
        let path = entry.path();
        let Ok(name) = entry.file_name().into_string() else {
            warn!(path = %path.display(), "skipping entry with non-UTF-8 name");
            continue;
        };
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| DocuifyError::io(&path, e))?;
        entries.push((name, path, file_type));
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

/// Reads one file as UTF-8 text on demand.
#[derive(Debug)]
struct LocalFileLoader {
    path: PathBuf,
    relative: String,
}

#[async_trait]
impl ContentLoader for LocalFileLoader {
    async fn load(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| DocuifyError::content_load(&self.relative, e.to_string()))
    }
}
