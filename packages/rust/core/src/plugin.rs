//! Plugin contract: hooks, shared traversal state, and the per-node context.

use std::any::Any;
use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::BoxFuture;

use docuify_shared::{DocuifyError, NodeKind, Result};

use crate::id::NodeId;
use crate::node::{Attributes, Node};
use crate::traverse;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A transformation pass over the assembled tree.
///
/// Every hook defaults to a no-op, so a plugin implements only the phases it
/// needs. Hooks run sequentially; an `Err` from any hook aborts the whole run.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable name, recorded in the build footer.
    fn name(&self) -> &str;

    /// Runs once before traversal. Returning `Some` replaces the root for all
    /// later hooks.
    async fn before(&self, _root: &mut Node, _state: &mut SharedState) -> Result<Option<Node>> {
        Ok(None)
    }

    /// Runs on every node, parent before children.
    async fn visit(&self, _node: &mut Node, _ctx: &mut TraversalContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Runs once after traversal. Returning `Some` replaces the root for all
    /// later hooks and for the result of the run.
    async fn after(&self, _root: &mut Node, _state: &mut SharedState) -> Result<Option<Node>> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Typed key/value map shared by every hook of a single run.
///
/// Created fresh for each run; repeated or concurrent runs never see each
/// other's entries.
#[derive(Default)]
pub struct SharedState {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`. Returns `true` if an entry was replaced.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> bool {
        self.values.insert(key.into(), Box::new(value)).is_some()
    }

    /// Borrow the value under `key` if it exists and has type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Borrow the value under `key`, inserting `init()` if it is absent or
    /// holds a different type.
    pub fn get_or_insert_with<T, F>(&mut self, key: impl Into<String>, init: F) -> &mut T
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let slot = self
            .values
            .entry(key.into())
            .or_insert_with(|| Box::new(()));
        if !slot.is::<T>() {
            *slot = Box::new(init());
        }
        match slot.downcast_mut::<T>() {
            Some(value) => value,
            None => unreachable!("slot was just filled with a value of this type"),
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TraversalContext
// ---------------------------------------------------------------------------

/// Read-only view of a node above the one being visited.
#[derive(Debug, Clone)]
pub struct Ancestor {
    pub id: NodeId,
    pub name: String,
    pub full_path: String,
    pub kind: NodeKind,
    /// Shared handle to the ancestor's attributes.
    pub attributes: Attributes,
}

impl Ancestor {
    pub(crate) fn of(node: &Node) -> Self {
        Self {
            id: node.id(),
            name: node.name().to_string(),
            full_path: node.full_path().to_string(),
            kind: node.kind(),
            attributes: node.attributes().clone(),
        }
    }
}

/// Where a visited node sits in the tree, plus the run's shared state.
pub struct TraversalContext<'a> {
    pub(crate) node_id: NodeId,
    pub(crate) ancestors: &'a [Ancestor],
    pub(crate) index: Option<usize>,
    pub(crate) state: &'a mut SharedState,
    pub(crate) plugins: &'a [Box<dyn Plugin>],
}

impl TraversalContext<'_> {
    /// Immediate parent, `None` at the root.
    pub fn parent(&self) -> Option<&Ancestor> {
        self.ancestors.last()
    }

    /// Chain from the root down to, but excluding, the visited node.
    pub fn ancestors(&self) -> &[Ancestor] {
        self.ancestors
    }

    /// Position among siblings, `None` at the root.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }

    pub fn state(&self) -> &SharedState {
        self.state
    }

    pub fn state_mut(&mut self) -> &mut SharedState {
        self.state
    }

    /// Run every plugin's `visit` over the child at `index` of `node` and its
    /// whole subtree, with the same shared state.
    ///
    /// `node` must be the node this context was created for, otherwise an
    /// `InvalidTree` error is returned. The engine still descends into all
    /// children afterwards, so subtrees visited this way are visited twice.
    pub fn visit_child<'s>(&'s mut self, node: &'s mut Node, index: usize) -> BoxFuture<'s, Result<()>> {
        if node.id() != self.node_id {
            let path = node.full_path().to_string();
            return Box::pin(async move {
                Err(DocuifyError::InvalidTree {
                    path,
                    message: "visit_child called with a node other than the visited one".into(),
                })
            });
        }

        let mut ancestors = self.ancestors.to_vec();
        ancestors.push(Ancestor::of(node));
        let path = node.full_path().to_string();

        match node.children_mut().get_mut(index) {
            Some(child) => {
                traverse::walk_node(child, ancestors, Some(index), self.plugins, self.state)
            }
            None => Box::pin(async move {
                Err(DocuifyError::InvalidTree {
                    path,
                    message: format!("no child at index {index}"),
                })
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_state_typed_access() {
        let mut state = SharedState::new();
        assert!(!state.insert("count", 1usize));
        assert_eq!(state.get::<usize>("count"), Some(&1));
        assert!(state.get::<String>("count").is_none());

        *state.get_mut::<usize>("count").unwrap() += 1;
        assert_eq!(state.get::<usize>("count"), Some(&2));
        assert!(state.insert("count", 10usize));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn get_or_insert_with_initializes_once() {
        let mut state = SharedState::new();
        state.get_or_insert_with("paths", Vec::<String>::new).push("a".into());
        state.get_or_insert_with("paths", Vec::<String>::new).push("b".into());
        assert_eq!(state.get::<Vec<String>>("paths").unwrap(), &vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn get_or_insert_with_replaces_mismatched_type() {
        let mut state = SharedState::new();
        state.insert("slot", "text");
        let n = state.get_or_insert_with("slot", || 5u32);
        assert_eq!(*n, 5);
        assert!(state.remove("slot"));
        assert!(state.is_empty());
    }
}
