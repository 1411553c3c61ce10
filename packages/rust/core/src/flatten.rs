//! Tree flattening.

use crate::node::Node;
use crate::traverse::walk_tree;

/// Consume the tree and return every node, root included, in visit order
/// (parent before children, siblings left to right).
///
/// Folders lose their children collection: the returned order and each
/// node's `parent_id` are the only remaining structural record.
pub fn flatten(root: Node) -> Vec<Node> {
    let mut flat = Vec::new();
    let mut stack = vec![root];

    while let Some(mut node) = stack.pop() {
        if let Some(children) = node.take_children() {
            // Reverse so the leftmost child is popped first.
            stack.extend(children.into_iter().rev());
        }
        flat.push(node);
    }

    flat
}

/// Borrowing variant of [`flatten`]: same order, tree left intact.
pub fn flatten_ref(root: &Node) -> Vec<&Node> {
    let mut flat = Vec::new();
    walk_tree(root, &mut |node| flat.push(node));
    flat
}
