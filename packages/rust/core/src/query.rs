//! Partial-attribute matching over a flattened node list.

use serde_json::Value;
use tracing::debug;

use docuify_shared::{DocuifyError, Result};

use crate::node::Node;

/// In-memory query surface over flattened nodes.
///
/// Patterns are matched against each node's current projection (see
/// [`Node::to_value`]), so attributes written by a load are visible to the
/// next query.
pub struct QueryContext {
    nodes: Vec<Node>,
}

impl QueryContext {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    /// Every node matching `pattern`, in stored order.
    ///
    /// `null` or `{}` matches every node.
    pub fn find_many(&self, pattern: &Value) -> Vec<&Node> {
        let found: Vec<&Node> = self
            .nodes
            .iter()
            .filter(|node| is_match(&node.to_value(), pattern))
            .collect();
        debug!(%pattern, matches = found.len(), "find_many");
        found
    }

    /// First node matching `pattern` in stored order.
    pub fn find_first(&self, pattern: &Value) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|node| is_match(&node.to_value(), pattern))
    }

    /// Load and transform a file node's content.
    pub async fn load_content(&self, node: &Node) -> Result<String> {
        if !node.is_file() {
            return Err(DocuifyError::NotAFile {
                path: node.full_path().to_string(),
            });
        }
        match node.content() {
            Some(content) if content.has_loader() => content.load().await,
            _ => Err(DocuifyError::NoContentLoader {
                path: node.full_path().to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContext")
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

/// Structural partial match of `value` against `pattern`.
///
/// - objects: every key of the pattern must exist in `value` and match
///   recursively; extra keys in `value` are ignored
/// - arrays: every pattern element must match some element of `value`
/// - `null` pattern at the top level matches anything; elsewhere scalars
///   compare by equality
pub fn is_match(value: &Value, pattern: &Value) -> bool {
    match pattern {
        Value::Null => true,
        _ => matches_partial(value, pattern),
    }
}

fn matches_partial(value: &Value, pattern: &Value) -> bool {
    match (value, pattern) {
        (Value::Object(value), Value::Object(pattern)) => pattern.iter().all(|(key, expected)| {
            value
                .get(key)
                .is_some_and(|actual| matches_partial(actual, expected))
        }),
        (Value::Array(value), Value::Array(pattern)) => pattern
            .iter()
            .all(|expected| value.iter().any(|actual| matches_partial(actual, expected))),
        (value, pattern) => value == pattern,
    }
}
