//! Tree assembly, plugin traversal, and content preloading for Docuify.
//!
//! The pipeline is: [`Source`] → [`build_tree`] → [`run_plugins`] →
//! ([`preload_tree`] | [`flatten`] → [`preload`]) → [`QueryContext`].
//! [`DocuifyEngine`] wires the stages together and wraps results in a
//! [`BuildOutput`] envelope.

pub mod content;
pub mod engine;
pub mod flatten;
pub mod id;
pub mod item;
pub mod node;
pub mod plugin;
pub mod preload;
pub mod query;
pub mod source;
pub mod traverse;
pub mod tree;

pub use content::{ContentActions, ContentLoader, StaticContent, Transformer};
pub use engine::{BuildFoot, BuildHead, BuildOutput, DocuifyEngine, PayloadKey};
pub use flatten::{flatten, flatten_ref};
pub use id::NodeId;
pub use item::{Item, ItemFilter, PathFilter};
pub use node::{Attributes, Node};
pub use plugin::{Ancestor, Plugin, SharedState, TraversalContext};
pub use preload::{PreloadFailure, PreloadReport, preload, preload_tree};
pub use query::{QueryContext, is_match};
pub use source::Source;
pub use traverse::{run_plugins, walk_tree};
pub use tree::build_tree;

pub use docuify_shared::{DocuifyError, FilterConfig, Metadata, NodeKind, PreloadConfig, Result};
