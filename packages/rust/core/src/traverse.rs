//! Plugin traversal engine.
//!
//! A run has three phases over one [`SharedState`]:
//! 1. `before` hooks, in registration order, each may replace the root
//! 2. depth-first `visit`: at each node every plugin runs in registration
//!    order before the engine descends into the node's children, left to right
//! 3. `after` hooks, in registration order, each may replace the root
//!
//! Everything is awaited sequentially, so no two hooks ever interleave.

use futures::future::BoxFuture;
use tracing::{debug, info, instrument};

use docuify_shared::Result;

use crate::node::Node;
use crate::plugin::{Ancestor, Plugin, SharedState, TraversalContext};

/// Run `plugins` over the tree rooted at `root` and return the final root.
///
/// The first hook error aborts the run and is returned unchanged.
#[instrument(skip_all, fields(plugin_count = plugins.len()))]
pub async fn run_plugins(root: Node, plugins: &[Box<dyn Plugin>]) -> Result<Node> {
    let mut state = SharedState::new();
    let mut current = root;

    for plugin in plugins {
        if let Some(replacement) = plugin.before(&mut current, &mut state).await? {
            debug!(plugin = plugin.name(), "before hook replaced the root");
            current = replacement;
        }
    }

    walk_node(&mut current, Vec::new(), None, plugins, &mut state).await?;

    for plugin in plugins {
        if let Some(replacement) = plugin.after(&mut current, &mut state).await? {
            debug!(plugin = plugin.name(), "after hook replaced the root");
            current = replacement;
        }
    }

    info!(shared_keys = state.len(), "plugins applied");
    Ok(current)
}

/// Visit `node` with every plugin, then recurse into its children.
pub(crate) fn walk_node<'a>(
    node: &'a mut Node,
    ancestors: Vec<Ancestor>,
    index: Option<usize>,
    plugins: &'a [Box<dyn Plugin>],
    state: &'a mut SharedState,
) -> BoxFuture<'a, Result<()>> {
    Box::pin(async move {
        {
            let mut ctx = TraversalContext {
                node_id: node.id(),
                ancestors: &ancestors,
                index,
                state: &mut *state,
                plugins,
            };
            for plugin in plugins {
                plugin.visit(node, &mut ctx).await?;
            }
        }

        if node.children().is_empty() {
            return Ok(());
        }

        let mut child_ancestors = ancestors;
        child_ancestors.push(Ancestor::of(node));

        for (i, child) in node.children_mut().iter_mut().enumerate() {
            walk_node(child, child_ancestors.clone(), Some(i), plugins, &mut *state).await?;
        }

        Ok(())
    })
}

/// Call `visitor` on every node, parent before children, siblings left to right.
pub fn walk_tree<'a, F>(node: &'a Node, visitor: &mut F)
where
    F: FnMut(&'a Node),
{
    visitor(node);
    for child in node.children() {
        walk_tree(child, visitor);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
