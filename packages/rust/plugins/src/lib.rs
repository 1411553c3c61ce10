//! Concrete plugins for the Docuify traversal engine.

pub mod frontmatter;

pub use frontmatter::{FRONTMATTER_KEY, FrontMatterPlugin, split_front_matter};
