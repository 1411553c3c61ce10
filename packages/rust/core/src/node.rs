//! Tree nodes and their open attribute bags.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use docuify_shared::{DocuifyError, Metadata, NodeKind, Result};

use crate::content::ContentActions;
use crate::id::NodeId;
use crate::item::Item;

/// Serialized field names owned by the node itself. Attributes using one of
/// these keys are kept but never serialized.
const RESERVED_KEYS: [&str; 8] = [
    "id",
    "name",
    "full_path",
    "kind",
    "parent_id",
    "extension",
    "metadata",
    "children",
];

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// Plugin-owned key/value data attached to a node.
///
/// This is a shared handle: clones refer to the same map. A plugin can hand a
/// clone to a transform so data discovered while content loads (front matter,
/// word counts) lands on the node that owns the content.
#[derive(Clone, Default)]
pub struct Attributes(Arc<RwLock<serde_json::Map<String, Value>>>);

impl Attributes {
    /// Store a value, returning the previous one under `key`.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.write().insert(key.into(), value.into())
    }

    /// Store any serializable value.
    pub fn insert_serialized<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| DocuifyError::parse(e.to_string()))?;
        self.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.read().get(key).cloned()
    }

    /// Fetch and deserialize a value. `Ok(None)` when the key is absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(|v| serde_json::from_value(v).map_err(|e| DocuifyError::parse(e.to_string())))
            .transpose()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.write().remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> serde_json::Map<String, Value> {
        self.0.read().clone()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.read().iter()).finish()
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.read().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// An assembled file or folder.
///
/// Structural fields (`id`, `parent_id`, the set of children) are read-only
/// outside this crate. Plugins may edit metadata, attributes, and content
/// transforms, and may reach children mutably without adding or removing any.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    full_path: String,
    kind: NodeKind,
    parent_id: Option<NodeId>,
    /// `Some` iff the node is a folder that has not been flattened.
    children: Option<Vec<Node>>,
    extension: Option<String>,
    metadata: Option<Metadata>,
    attributes: Attributes,
    /// `Some` iff the node is a file.
    content: Option<ContentActions>,
}

impl Node {
    pub(crate) fn root() -> Self {
        Self::folder("root", ".", None)
    }

    pub(crate) fn folder(
        name: impl Into<String>,
        full_path: impl Into<String>,
        parent_id: Option<NodeId>,
    ) -> Self {
        Self {
            id: NodeId::next(),
            name: name.into(),
            full_path: full_path.into(),
            kind: NodeKind::Folder,
            parent_id,
            children: Some(Vec::new()),
            extension: None,
            metadata: None,
            attributes: Attributes::default(),
            content: None,
        }
    }

    pub(crate) fn file(
        name: impl Into<String>,
        full_path: impl Into<String>,
        parent_id: Option<NodeId>,
    ) -> Self {
        let full_path = full_path.into();
        Self {
            id: NodeId::next(),
            name: name.into(),
            content: Some(ContentActions::new(full_path.clone(), None)),
            full_path,
            kind: NodeKind::File,
            parent_id,
            children: None,
            extension: None,
            metadata: None,
            attributes: Attributes::default(),
        }
    }

    /// Copy extension, metadata, and loader from the originating item.
    pub(crate) fn populate_from(&mut self, item: &Item) {
        self.extension = item.extension.clone();
        self.metadata = item.metadata.clone();
        self.content = Some(ContentActions::new(self.full_path.clone(), item.loader.clone()));
    }

    pub(crate) fn children_vec_mut(&mut self) -> Option<&mut Vec<Node>> {
        self.children.as_mut()
    }

    pub(crate) fn take_children(&mut self) -> Option<Vec<Node>> {
        self.children.take()
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path from the root (`.` for the root itself).
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    /// `None` only for the root.
    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    /// Children in insertion order. Empty for files and flattened folders.
    pub fn children(&self) -> &[Node] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Mutable access to children without the ability to add or remove any.
    pub fn children_mut(&mut self) -> &mut [Node] {
        self.children.as_deref_mut().unwrap_or_default()
    }

    /// Whether the node still carries its children collection.
    pub fn has_children_collection(&self) -> bool {
        self.children.is_some()
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Metadata for editing, created empty if the item carried none.
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        self.metadata.get_or_insert_with(Metadata::new)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn content(&self) -> Option<&ContentActions> {
        self.content.as_ref()
    }

    pub fn content_mut(&mut self) -> Option<&mut ContentActions> {
        self.content.as_mut()
    }

    /// Load and transform this file's content.
    pub async fn load(&self) -> Result<String> {
        if !self.is_file() {
            return Err(DocuifyError::NotAFile {
                path: self.full_path.clone(),
            });
        }
        match &self.content {
            Some(content) => content.load().await,
            None => Err(DocuifyError::NoContentLoader {
                path: self.full_path.clone(),
            }),
        }
    }

    /// JSON projection of the node's own attributes, without children.
    ///
    /// This is what query patterns are matched against. A node that fails to
    /// serialize projects to `null` and matches only a `null` pattern.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(NodeView {
            node: self,
            with_children: false,
        })
        .unwrap_or_else(|error| {
            warn!(path = %self.full_path, %error, "failed to project node for querying");
            Value::Null
        })
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        NodeView {
            node: self,
            with_children: true,
        }
        .serialize(serializer)
    }
}

struct NodeView<'a> {
    node: &'a Node,
    with_children: bool,
}

impl Serialize for NodeView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let node = self.node;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &node.id)?;
        map.serialize_entry("name", &node.name)?;
        map.serialize_entry("full_path", &node.full_path)?;
        map.serialize_entry("kind", &node.kind)?;
        if let Some(parent_id) = &node.parent_id {
            map.serialize_entry("parent_id", parent_id)?;
        }
        if let Some(extension) = &node.extension {
            map.serialize_entry("extension", extension)?;
        }
        if let Some(metadata) = &node.metadata {
            map.serialize_entry("metadata", metadata)?;
        }
        for (key, value) in node.attributes.snapshot() {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                map.serialize_entry(&key, &value)?;
            }
        }
        if self.with_children {
            if let Some(children) = &node.children {
                map.serialize_entry("children", children)?;
            }
        }
        map.end()
    }
}
