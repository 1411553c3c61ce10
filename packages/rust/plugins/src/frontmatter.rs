//! YAML front matter extraction.
//!
//! For every file node the plugin queues a transform that strips a leading
//! `---` fenced YAML block from the content and stores the parsed mapping in
//! the node's `frontmatter` attribute. The attribute therefore appears only
//! once the node's content has been loaded (directly or by preloading).

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use docuify_core::{Attributes, Node, Plugin, Result, Transformer, TraversalContext};
use docuify_shared::DocuifyError;

/// Attribute key the parsed front matter is stored under.
pub const FRONTMATTER_KEY: &str = "frontmatter";

const FENCE: &str = "---";

/// Split `content` into `(yaml, body)` if it opens with a fenced block.
///
/// The opening fence must be the first line and the closing fence a line of
/// its own. Returns `None` when either is missing.
pub fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let open_end = content.find('\n')?;
    if content[..open_end].trim_end() != FENCE {
        return None;
    }
    let rest = &content[open_end + 1..];

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parse a front matter block into a JSON object. An empty block is `{}`.
fn parse_block(yaml: &str) -> Result<Value> {
    if yaml.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let parsed: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| DocuifyError::parse(format!("front matter: {e}")))?;
    let value = serde_json::to_value(parsed)
        .map_err(|e| DocuifyError::parse(format!("front matter: {e}")))?;

    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        other => Err(DocuifyError::parse(format!(
            "front matter must be a mapping, found `{other}`"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// Queues a front matter transform on every file node.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrontMatterPlugin;

impl FrontMatterPlugin {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Plugin for FrontMatterPlugin {
    fn name(&self) -> &str {
        "front-matter"
    }

    async fn visit(&self, node: &mut Node, _ctx: &mut TraversalContext<'_>) -> Result<()> {
        if !node.is_file() {
            return Ok(());
        }

        let transform = FrontMatterTransform {
            path: node.full_path().to_string(),
            attributes: node.attributes().clone(),
        };
        if let Some(content) = node.content_mut() {
            content.register_transform(transform);
        }
        Ok(())
    }
}

/// Writes parsed front matter to the owning node's attributes.
struct FrontMatterTransform {
    path: String,
    attributes: Attributes,
}

#[async_trait]
impl Transformer for FrontMatterTransform {
    async fn transform(&self, content: String) -> Result<String> {
        let Some((yaml, body)) = split_front_matter(&content) else {
            return Ok(content);
        };

        match parse_block(yaml) {
            Ok(data) => {
                debug!(path = %self.path, "parsed front matter");
                self.attributes.insert(FRONTMATTER_KEY, data);
                Ok(body.to_string())
            }
            Err(error) => {
                warn!(path = %self.path, %error, "failed to parse front matter, keeping content as is");
                Ok(content)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docuify_core::{Item, PreloadConfig, QueryContext, build_tree, flatten, preload, run_plugins};
    use serde_json::json;

    async fn processed(items: &[Item]) -> Node {
        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(FrontMatterPlugin::new())];
        run_plugins(build_tree(items).unwrap(), &plugins).await.unwrap()
    }

    #[test]
    fn split_detects_leading_block() {
        let (yaml, body) = split_front_matter("---\ntitle: A\n---\n# Body\n").unwrap();
        assert_eq!(yaml, "title: A\n");
        assert_eq!(body, "# Body\n");

        let (yaml, body) = split_front_matter("---\r\n---\r\ntext").unwrap();
        assert_eq!(yaml, "");
        assert_eq!(body, "text");
    }

    #[test]
    fn split_requires_both_fences() {
        assert!(split_front_matter("# Title\n---\nx: 1\n---\n").is_none());
        assert!(split_front_matter("---\ntitle: A\nno closing fence").is_none());
        assert!(split_front_matter("----\nx: 1\n----\n").is_none());
        assert!(split_front_matter("").is_none());
    }

    #[tokio::test]
    async fn load_strips_block_and_sets_attribute() {
        let root = processed(&[Item::file("docs/a.md")
            .with_content("---\ntitle: Hello\ntags: [x, y]\n---\n# Body\n")])
        .await;

        let file = &root.children()[0].children()[0];
        assert!(file.attributes().get(FRONTMATTER_KEY).is_none());

        assert_eq!(file.load().await.unwrap(), "# Body\n");
        assert_eq!(
            file.attributes().get(FRONTMATTER_KEY),
            Some(json!({"title": "Hello", "tags": ["x", "y"]}))
        );
    }

    #[tokio::test]
    async fn documents_without_block_pass_through() {
        let root = processed(&[Item::file("plain.md").with_content("just text")]).await;
        let file = &root.children()[0];
        assert_eq!(file.load().await.unwrap(), "just text");
        assert!(file.attributes().get(FRONTMATTER_KEY).is_none());
    }

    #[tokio::test]
    async fn invalid_yaml_keeps_content() {
        let raw = "---\ntitle: [unclosed\n---\nbody";
        let root = processed(&[Item::file("bad.md").with_content(raw)]).await;
        let file = &root.children()[0];
        assert_eq!(file.load().await.unwrap(), raw);
        assert!(file.attributes().get(FRONTMATTER_KEY).is_none());
    }

    #[tokio::test]
    async fn scalar_block_is_rejected_softly() {
        let raw = "---\njust a string\n---\nbody";
        let root = processed(&[Item::file("scalar.md").with_content(raw)]).await;
        assert_eq!(root.children()[0].load().await.unwrap(), raw);
    }

    #[tokio::test]
    async fn folders_get_no_transform() {
        let root = processed(&[Item::file("docs/a.md").with_content("x")]).await;
        assert!(root.children()[0].content().is_none());
        assert_eq!(root.children()[0].children()[0].content().unwrap().transform_count(), 1);
    }

    #[tokio::test]
    async fn preloaded_front_matter_is_queryable() {
        let root = processed(&[
            Item::file("a.md").with_content("---\ndraft: true\n---\nA"),
            Item::file("b.md").with_content("---\ndraft: false\n---\nB"),
        ])
        .await;

        let flat = flatten(root);
        let report = preload(&flat, &PreloadConfig::default()).await;
        assert!(report.is_complete());

        let ctx = QueryContext::new(flat);
        let drafts = ctx.find_many(&json!({"frontmatter": {"draft": true}}));
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name(), "a.md");
    }
}
