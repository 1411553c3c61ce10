//! Lazy file content: raw loaders, transforms, and the per-file action bundle.
//!
//! A file node owns a [`ContentActions`] value holding its raw loader and an
//! ordered transform queue. Nothing is cached: every [`ContentActions::load`]
//! invokes the loader once and folds the transforms registered *at call time*
//! over the result.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use docuify_shared::{DocuifyError, Result};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Produces the raw text of one item. May perform I/O.
#[async_trait]
pub trait ContentLoader: Send + Sync {
    async fn load(&self) -> Result<String>;
}

/// A text-to-text step in a file's transform queue. May perform I/O.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(&self, content: String) -> Result<String>;
}

/// Loader over text that is already in memory.
#[derive(Debug, Clone)]
pub struct StaticContent(pub String);

#[async_trait]
impl ContentLoader for StaticContent {
    async fn load(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Adapts a synchronous closure into a [`ContentLoader`].
pub(crate) struct FnLoader<F>(pub(crate) F);

#[async_trait]
impl<F> ContentLoader for FnLoader<F>
where
    F: Fn() -> Result<String> + Send + Sync,
{
    async fn load(&self) -> Result<String> {
        (self.0)()
    }
}

/// Adapts a synchronous closure into a [`Transformer`].
struct FnTransform<F>(F);

#[async_trait]
impl<F> Transformer for FnTransform<F>
where
    F: Fn(String) -> Result<String> + Send + Sync,
{
    async fn transform(&self, content: String) -> Result<String> {
        (self.0)(content)
    }
}

// ---------------------------------------------------------------------------
// ContentActions
// ---------------------------------------------------------------------------

/// Content-action bundle carried by every file node.
///
/// Cloning is cheap and yields a snapshot: transforms registered on the clone
/// afterwards do not affect the original, and vice versa.
#[derive(Clone)]
pub struct ContentActions {
    path: String,
    loader: Option<Arc<dyn ContentLoader>>,
    transforms: Vec<Arc<dyn Transformer>>,
}

impl ContentActions {
    pub(crate) fn new(path: impl Into<String>, loader: Option<Arc<dyn ContentLoader>>) -> Self {
        Self {
            path: path.into(),
            loader,
            transforms: Vec::new(),
        }
    }

    /// Whether the originating item supplied a loader.
    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    /// Number of queued transforms.
    pub fn transform_count(&self) -> usize {
        self.transforms.len()
    }

    /// Append a transform to the end of the queue.
    pub fn register_transform<T: Transformer + 'static>(&mut self, transform: T) {
        self.transforms.push(Arc::new(transform));
        debug!(path = %self.path, queued = self.transforms.len(), "registered transform");
    }

    /// Append a synchronous closure to the end of the queue.
    pub fn register_fn<F>(&mut self, f: F)
    where
        F: Fn(String) -> Result<String> + Send + Sync + 'static,
    {
        self.register_transform(FnTransform(f));
    }

    /// Fold the transform queue over `raw`, left to right, each step seeing the
    /// previous step's output.
    pub async fn apply_transforms(&self, raw: String) -> Result<String> {
        let mut content = raw;
        for (index, transform) in self.transforms.iter().enumerate() {
            trace!(path = %self.path, index, "applying transform");
            content = transform
                .transform(content)
                .await
                .map_err(|e| DocuifyError::Transform {
                    path: self.path.clone(),
                    index,
                    message: e.to_string(),
                })?;
        }
        Ok(content)
    }

    /// Invoke the loader once and run the transform queue on its output.
    pub async fn load(&self) -> Result<String> {
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| DocuifyError::NoContentLoader {
                path: self.path.clone(),
            })?;

        let raw = loader.load().await?;
        debug!(path = %self.path, raw_len = raw.len(), "loaded raw content");
        self.apply_transforms(raw).await
    }
}

impl fmt::Debug for ContentActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentActions")
            .field("path", &self.path)
            .field("has_loader", &self.has_loader())
            .field("transforms", &self.transforms.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
        text: &'static str,
    }

    #[async_trait]
    impl ContentLoader for CountingLoader {
        async fn load(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.to_string())
        }
    }

    fn actions(text: &'static str) -> (ContentActions, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = CountingLoader {
            calls: calls.clone(),
            text,
        };
        (ContentActions::new("docs/a.md", Some(Arc::new(loader))), calls)
    }

    #[tokio::test]
    async fn load_without_transforms_returns_raw() {
        let (actions, calls) = actions("hello");
        assert_eq!(actions.load().await.unwrap(), "hello");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transforms_apply_in_registration_order() {
        let (mut actions, _) = actions("abc");
        actions.register_fn(|s| Ok(format!("{s}1")));
        actions.register_fn(|s| Ok(format!("{s}2")));
        assert_eq!(actions.load().await.unwrap(), "abc12");
    }

    #[tokio::test]
    async fn each_load_reinvokes_loader() {
        let (mut actions, calls) = actions("abc");
        actions.register_fn(|s| Ok(s.to_uppercase()));
        assert_eq!(actions.load().await.unwrap(), "ABC");
        assert_eq!(actions.load().await.unwrap(), "ABC");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_loader_is_reported() {
        let actions = ContentActions::new("docs/empty.md", None);
        let err = actions.load().await.unwrap_err();
        assert!(matches!(err, DocuifyError::NoContentLoader { ref path } if path == "docs/empty.md"));
    }

    #[tokio::test]
    async fn failing_transform_names_its_position() {
        let (mut actions, _) = actions("abc");
        actions.register_fn(|s| Ok(s));
        actions.register_fn(|_| Err(DocuifyError::parse("bad input")));
        let err = actions.load().await.unwrap_err();
        match err {
            DocuifyError::Transform { path, index, message } => {
                assert_eq!(path, "docs/a.md");
                assert_eq!(index, 1);
                assert!(message.contains("bad input"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn apply_transforms_works_without_loader() {
        let mut actions = ContentActions::new("x.md", None);
        actions.register_fn(|s| Ok(s.chars().rev().collect()));
        assert_eq!(actions.apply_transforms("abc".into()).await.unwrap(), "cba");
    }

    #[tokio::test]
    async fn static_content_loader() {
        let actions = ContentActions::new("x.md", Some(Arc::new(StaticContent("inline".into()))));
        assert_eq!(actions.load().await.unwrap(), "inline");
    }
}
