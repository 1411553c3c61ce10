//! Engine facade: fetch → filter → assemble → plugins → (flatten), and the
//! build envelope handed to callers.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{info, instrument};

use docuify_shared::{DocuifyError, FilterConfig, Result};

use crate::flatten::flatten;
use crate::item::{Item, ItemFilter, PathFilter};
use crate::node::Node;
use crate::plugin::Plugin;
use crate::source::Source;
use crate::traverse::run_plugins;
use crate::tree::build_tree;

// ---------------------------------------------------------------------------
// Build envelope
// ---------------------------------------------------------------------------

/// Reserved for build-level metadata. Currently always empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildHead {}

/// Where a build came from and which plugins ran over it.
#[derive(Debug, Clone, Serialize)]
pub struct BuildFoot {
    pub source: String,
    pub plugin_names: Vec<String>,
}

/// Result of [`DocuifyEngine::build`] or [`DocuifyEngine::flat_build`].
///
/// Serializes as `{"head": .., "tree": ..., "foot": ..}` for a tree payload
/// and `{"head": .., "nodes": [...], "foot": ..}` for a flat one.
#[derive(Debug)]
pub struct BuildOutput<T> {
    pub head: BuildHead,
    pub payload: T,
    pub foot: BuildFoot,
}

/// JSON key a payload is serialized under.
pub trait PayloadKey {
    const KEY: &'static str;
}

impl PayloadKey for Node {
    const KEY: &'static str = "tree";
}

impl PayloadKey for Vec<Node> {
    const KEY: &'static str = "nodes";
}

impl<T: Serialize + PayloadKey> Serialize for BuildOutput<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("head", &self.head)?;
        map.serialize_entry(T::KEY, &self.payload)?;
        map.serialize_entry("foot", &self.foot)?;
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Wires a [`Source`], an item filter, and an ordered plugin list into one
/// pipeline.
pub struct DocuifyEngine {
    source: Box<dyn Source>,
    plugins: Vec<Box<dyn Plugin>>,
    filter: Option<ItemFilter>,
    path_filter: Option<PathFilter>,
    tree: Option<Node>,
}

impl DocuifyEngine {
    pub fn new<S: Source + 'static>(source: S) -> Self {
        Self {
            source: Box::new(source),
            plugins: Vec::new(),
            filter: None,
            path_filter: None,
            tree: None,
        }
    }

    /// Append a plugin; plugins run in the order they are added.
    pub fn with_plugin<P: Plugin + 'static>(mut self, plugin: P) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    pub fn with_plugins(mut self, plugins: impl IntoIterator<Item = Box<dyn Plugin>>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    /// Keep only items for which `filter(item, index)` is true, where `index`
    /// is the item's position in fetch order.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Item, usize) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Keep only items whose path passes the include/exclude globs.
    pub fn with_path_filter(mut self, config: &FilterConfig) -> Result<Self> {
        if !config.is_empty() {
            self.path_filter = Some(PathFilter::new(config)?);
        }
        Ok(self)
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    /// The current tree, `None` before [`build_tree`](Self::build_tree).
    pub fn tree(&self) -> Option<&Node> {
        self.tree.as_ref()
    }

    /// Fetch from the source, filter, and assemble the tree.
    ///
    /// Source errors surface as `SourceFetch`, except a misconfigured source,
    /// which keeps its `InvalidConfiguration` error.
    #[instrument(skip_all, fields(source = self.source.name()))]
    pub async fn build_tree(&mut self) -> Result<&Node> {
        let fetched = self.source.fetch().await.map_err(|e| match e {
            e @ (DocuifyError::SourceFetch { .. } | DocuifyError::InvalidConfiguration { .. }) => e,
            other => DocuifyError::source_fetch(self.source.name(), other.to_string()),
        })?;
        let fetched_count = fetched.len();

        let items: Vec<Item> = fetched
            .into_iter()
            .enumerate()
            .filter(|(index, item)| self.filter.as_ref().is_none_or(|f| f(item, *index)))
            .filter(|(_, item)| self.path_filter.as_ref().is_none_or(|f| f.matches(&item.path)))
            .map(|(_, item)| item)
            .collect();

        info!(fetched = fetched_count, kept = items.len(), "source fetched");

        let tree = build_tree(&items)?;
        Ok(self.tree.insert(tree))
    }

    /// Run the plugin list over the tree, building it first if needed.
    pub async fn apply_plugins(&mut self) -> Result<&Node> {
        let tree = match self.tree.take() {
            Some(tree) => tree,
            None => {
                self.build_tree().await?;
                self.tree.take().ok_or_else(|| missing_tree(self.source.name()))?
            }
        };

        let tree = run_plugins(tree, &self.plugins).await?;
        Ok(self.tree.insert(tree))
    }

    /// Build the tree, apply plugins, and wrap the tree in the envelope.
    pub async fn build(mut self) -> Result<BuildOutput<Node>> {
        self.build_tree().await?;
        self.apply_plugins().await?;

        let foot = self.foot();
        let tree = self.tree.take().ok_or_else(|| missing_tree(self.source.name()))?;
        Ok(BuildOutput {
            head: BuildHead::default(),
            payload: tree,
            foot,
        })
    }

    /// Apply plugins (building the tree only if absent), then flatten and
    /// keep only the non-folder nodes.
    pub async fn flat_build(mut self) -> Result<BuildOutput<Vec<Node>>> {
        self.apply_plugins().await?;

        let foot = self.foot();
        let tree = self.tree.take().ok_or_else(|| missing_tree(self.source.name()))?;
        let nodes: Vec<Node> = flatten(tree).into_iter().filter(|n| !n.is_folder()).collect();

        info!(files = nodes.len(), "flat build completed");
        Ok(BuildOutput {
            head: BuildHead::default(),
            payload: nodes,
            foot,
        })
    }

    fn foot(&self) -> BuildFoot {
        BuildFoot {
            source: self.source.name().to_string(),
            plugin_names: self.plugin_names(),
        }
    }
}

fn missing_tree(source: &str) -> DocuifyError {
    DocuifyError::InvalidTree {
        path: ".".to_string(),
        message: format!("no tree was assembled from source `{source}`"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::TraversalContext;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MemorySource {
        items: Vec<Item>,
        fetches: Arc<AtomicUsize>,
    }

    impl MemorySource {
        fn new(paths: &[&str]) -> Self {
            Self {
                items: paths
                    .iter()
                    .map(|p| Item::file(*p).with_content(format!("body of {p}")))
                    .collect(),
                fetches: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Source for MemorySource {
        fn name(&self) -> &str {
            "memory"
        }

        async fn fetch(&self) -> Result<Vec<Item>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.items.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl Source for BrokenSource {
        fn name(&self) -> &str {
            "broken"
        }

        async fn fetch(&self) -> Result<Vec<Item>> {
            Err(DocuifyError::Network("connection refused".into()))
        }
    }

    struct Tagger;

    #[async_trait]
    impl Plugin for Tagger {
        fn name(&self) -> &str {
            "tagger"
        }

        async fn visit(&self, node: &mut Node, _ctx: &mut TraversalContext<'_>) -> Result<()> {
            node.attributes().insert("seen", true);
            Ok(())
        }
    }

    #[tokio::test]
    async fn build_wraps_tree_in_envelope() {
        let output = DocuifyEngine::new(MemorySource::new(&["docs/a.md", "b.md"]))
            .with_plugin(Tagger)
            .build()
            .await
            .unwrap();

        assert_eq!(output.foot.source, "memory");
        assert_eq!(output.foot.plugin_names, vec!["tagger"]);
        assert_eq!(output.payload.children().len(), 2);

        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["head"], json!({}));
        assert_eq!(value["tree"]["full_path"], json!("."));
        assert_eq!(value["tree"]["children"][0]["children"][0]["seen"], json!(true));
        assert_eq!(value["foot"]["plugin_names"], json!(["tagger"]));
    }

    #[tokio::test]
    async fn flat_build_keeps_files_only() {
        let output = DocuifyEngine::new(MemorySource::new(&["docs/a.md", "docs/b.md", "c.md"]))
            .flat_build()
            .await
            .unwrap();

        let paths: Vec<&str> = output.payload.iter().map(|n| n.full_path()).collect();
        assert_eq!(paths, vec!["docs/a.md", "docs/b.md", "c.md"]);
        assert!(output.foot.plugin_names.is_empty());

        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["nodes"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn filter_sees_fetch_order_index() {
        let mut engine = DocuifyEngine::new(MemorySource::new(&["a.md", "b.md", "c.md", "d.md"]))
            .with_filter(|_, index| index % 2 == 0);

        let tree = engine.build_tree().await.unwrap();
        let names: Vec<&str> = tree.children().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["a.md", "c.md"]);
    }

    #[tokio::test]
    async fn path_filter_applies_globs() {
        let config = FilterConfig {
            include_patterns: vec!["docs/**".into()],
            exclude_patterns: vec!["**/draft.md".into()],
        };
        let mut engine = DocuifyEngine::new(MemorySource::new(&["docs/a.md", "docs/draft.md", "b.md"]))
            .with_path_filter(&config)
            .unwrap();

        let tree = engine.build_tree().await.unwrap();
        assert_eq!(tree.children().len(), 1);
        assert_eq!(tree.children()[0].children()[0].full_path(), "docs/a.md");
    }

    #[tokio::test]
    async fn source_failure_aborts_build() {
        let err = DocuifyEngine::new(BrokenSource).build().await.unwrap_err();
        match err {
            DocuifyError::SourceFetch { source_name, message } => {
                assert_eq!(source_name, "broken");
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct MisconfiguredSource;

    #[async_trait]
    impl Source for MisconfiguredSource {
        fn name(&self) -> &str {
            "misconfigured"
        }

        async fn fetch(&self) -> Result<Vec<Item>> {
            Err(DocuifyError::config("source root missing"))
        }
    }

    #[tokio::test]
    async fn configuration_errors_are_not_relabelled() {
        let err = DocuifyEngine::new(MisconfiguredSource).build().await.unwrap_err();
        assert!(matches!(err, DocuifyError::InvalidConfiguration { .. }), "got {err}");
    }

    #[tokio::test]
    async fn flat_build_reuses_existing_tree() {
        let source = MemorySource::new(&["a.md"]);
        let fetches = source.fetches.clone();
        let mut engine = DocuifyEngine::new(source);

        assert!(engine.tree().is_none());
        engine.build_tree().await.unwrap();
        assert!(engine.tree().is_some());

        engine.flat_build().await.unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn apply_plugins_builds_when_needed() {
        let mut engine = DocuifyEngine::new(MemorySource::new(&["a.md"])).with_plugin(Tagger);
        let tree = engine.apply_plugins().await.unwrap();
        assert_eq!(tree.children()[0].attributes().get("seen"), Some(json!(true)));
    }
}
