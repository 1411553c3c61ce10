//! Concrete content sources for Docuify.
//!
//! - [`LocalFileSource`]: walks a directory on disk
//! - [`GithubSource`]: lists a repository tree through the GitHub REST API

pub mod github;
pub mod local;

pub use github::{GithubConfig, GithubSource};
pub use local::LocalFileSource;
