//! Tree builder.
//!
//! Converts the flat item list of a source into a rooted tree keyed by path
//! segments, creating intermediate folders the first time a prefix is seen.

use tracing::{debug, info, instrument, warn};

use docuify_shared::{DocuifyError, Result, split_path};

use crate::item::Item;
use crate::node::Node;

/// Build a tree from `items`, in order.
///
/// - Shared prefixes map to exactly one folder, created by the first item that
///   reaches them; the kind of an existing node is never changed.
/// - A path that continues past a file node is rejected with
///   [`DocuifyError::InvalidTree`].
/// - A repeated path keeps the node (and loader) of its first occurrence.
#[instrument(skip_all, fields(item_count = items.len()))]
pub fn build_tree(items: &[Item]) -> Result<Node> {
    let mut root = Node::root();

    for item in items {
        insert_item(&mut root, item)?;
    }

    info!(children = root.children().len(), "tree assembled");
    Ok(root)
}

fn insert_item(root: &mut Node, item: &Item) -> Result<()> {
    let segments = split_path(&item.path);
    if segments.is_empty() {
        return Err(invalid(&item.path, "path has no segments"));
    }

    let last = segments.len() - 1;
    let mut current = root;

    for (depth, segment) in segments.iter().enumerate() {
        if current.is_file() {
            return Err(invalid(
                &item.path,
                format!("`{}` is a file and cannot contain children", current.full_path()),
            ));
        }

        let parent_id = current.id();
        let children = current
            .children_vec_mut()
            .ok_or_else(|| invalid(&item.path, "ancestor folder has been flattened"))?;

        let index = match children.iter().position(|c| c.name() == *segment) {
            Some(index) => {
                if depth == last {
                    report_existing_terminal(&children[index], item);
                }
                index
            }
            None => {
                let full_path = segments[..=depth].join("/");
                let node = if depth == last && item.kind.is_file() {
                    let mut file = Node::file(*segment, full_path, Some(parent_id));
                    file.populate_from(item);
                    file
                } else {
                    Node::folder(*segment, full_path, Some(parent_id))
                };
                debug!(path = %node.full_path(), kind = %node.kind(), "created node");
                children.push(node);
                children.len() - 1
            }
        };

        current = &mut children[index];
    }

    Ok(())
}

fn report_existing_terminal(existing: &Node, item: &Item) {
    if existing.kind() != item.kind {
        warn!(
            path = %item.path,
            existing = %existing.kind(),
            requested = %item.kind,
            "path already assembled with a different kind, keeping the first"
        );
    } else if existing.is_file() {
        warn!(path = %item.path, "duplicate file path, keeping the first occurrence");
    }
}

fn invalid(path: &str, message: impl Into<String>) -> DocuifyError {
    DocuifyError::InvalidTree {
        path: path.to_string(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use docuify_shared::{Metadata, NodeKind};
    use serde_json::json;

    fn files(paths: &[&str]) -> Vec<Item> {
        paths.iter().map(|p| Item::file(*p)).collect()
    }

    fn names(node: &Node) -> Vec<&str> {
        node.children().iter().map(|c| c.name()).collect()
    }

    /// Check `full_path` and `parent_id` of every node below `node`.
    fn assert_linkage(node: &Node, ancestors: &mut Vec<String>) {
        for child in node.children() {
            assert_eq!(child.parent_id(), Some(node.id()));
            ancestors.push(child.name().to_string());
            assert_eq!(child.full_path(), ancestors.join("/"));
            assert_linkage(child, ancestors);
            ancestors.pop();
        }
    }

    #[test]
    fn root_shape() {
        let root = build_tree(&[]).unwrap();
        assert_eq!(root.name(), "root");
        assert_eq!(root.full_path(), ".");
        assert!(root.is_folder());
        assert!(root.parent_id().is_none());
        assert!(root.children().is_empty());
    }

    #[test]
    fn shared_prefix_creates_one_folder() {
        let root = build_tree(&files(&["a/b.md", "a/c.md"])).unwrap();
        assert_eq!(names(&root), vec!["a"]);

        let a = &root.children()[0];
        assert!(a.is_folder());
        assert_eq!(names(a), vec!["b.md", "c.md"]);
        assert!(a.children().iter().all(|c| c.is_file()));
    }

    #[test]
    fn siblings_keep_first_seen_order() {
        let root = build_tree(&files(&["z.md", "a/x.md", "m.md", "a/b/y.md"])).unwrap();
        assert_eq!(names(&root), vec!["z.md", "a", "m.md"]);
        assert_eq!(names(&root.children()[1]), vec!["x.md", "b"]);
    }

    #[test]
    fn full_paths_and_parents_are_consistent() {
        let root = build_tree(&files(&[
            "docs/guide/intro.md",
            "docs/guide/setup.md",
            "docs/api/client.md",
            "README.md",
        ]))
        .unwrap();
        assert_linkage(&root, &mut Vec::new());
    }

    #[test]
    fn folder_items_create_empty_folders() {
        let root = build_tree(&[Item::folder("assets"), Item::file("assets/logo.svg")]).unwrap();
        let assets = &root.children()[0];
        assert!(assets.is_folder());
        assert_eq!(names(assets), vec!["logo.svg"]);
    }

    #[test]
    fn folder_item_after_implicit_folder_is_merged() {
        let root = build_tree(&[Item::file("docs/a.md"), Item::folder("docs")]).unwrap();
        assert_eq!(names(&root), vec!["docs"]);
        assert_eq!(root.children()[0].children().len(), 1);
    }

    #[test]
    fn first_writer_wins_on_kind() {
        let root = build_tree(&[Item::folder("notes"), Item::file("notes")]).unwrap();
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].kind(), NodeKind::Folder);
    }

    #[test]
    fn path_past_a_file_is_rejected() {
        let err = build_tree(&files(&["guide", "guide/intro.md"])).unwrap_err();
        match err {
            DocuifyError::InvalidTree { path, message } => {
                assert_eq!(path, "guide/intro.md");
                assert!(message.contains("`guide` is a file"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_path_is_rejected() {
        let err = build_tree(&[Item::file("/")]).unwrap_err();
        assert!(matches!(err, DocuifyError::InvalidTree { .. }));
    }

    #[test]
    fn redundant_slashes_are_ignored() {
        let root = build_tree(&files(&["/docs//a.md", "docs/b.md/"])).unwrap();
        assert_eq!(names(&root), vec!["docs"]);
        assert_eq!(root.children()[0].children()[0].full_path(), "docs/a.md");
        assert_eq!(names(&root.children()[0]), vec!["a.md", "b.md"]);
    }

    #[test]
    fn file_nodes_copy_item_fields() {
        let mut metadata = Metadata::new();
        metadata.insert("sha".into(), json!("abc123"));
        let item = Item::file("docs/a.md")
            .with_extension("md")
            .with_metadata(metadata)
            .with_content("# A");

        let mut root = build_tree(std::slice::from_ref(&item)).unwrap();
        let file = &mut root.children_mut()[0].children_mut()[0];
        assert_eq!(file.extension(), Some("md"));
        assert_eq!(file.metadata().unwrap()["sha"], json!("abc123"));
        assert!(file.content().unwrap().has_loader());

        // Node metadata is a copy, not shared with the item.
        file.metadata_mut().insert("sha".into(), json!("changed"));
        assert_eq!(item.metadata.as_ref().unwrap()["sha"], json!("abc123"));
    }

    #[test]
    fn folders_never_carry_content() {
        let root = build_tree(&[Item::file("a/b.md").with_content("x")]).unwrap();
        let a = &root.children()[0];
        assert!(a.content().is_none());
        assert!(a.has_children_collection());
        assert!(!a.children()[0].has_children_collection());
    }

    #[test]
    fn ids_are_unique() {
        let root = build_tree(&files(&["a/b.md", "a/c.md", "d.md"])).unwrap();
        let mut ids = vec![root.id()];
        let a = &root.children()[0];
        ids.push(a.id());
        ids.extend(a.children().iter().map(|c| c.id()));
        ids.push(root.children()[1].id());
        let len = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), len);
    }
}
