//! Content source contract.

use async_trait::async_trait;

use docuify_shared::Result;

use crate::item::Item;

/// Produces the flat item list a build starts from.
#[async_trait]
pub trait Source: Send + Sync {
    /// Name recorded in the build footer.
    fn name(&self) -> &str;

    /// Fetch every item. Failures abort the whole build.
    async fn fetch(&self) -> Result<Vec<Item>>;
}
