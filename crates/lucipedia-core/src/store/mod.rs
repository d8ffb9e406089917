//! Page persistence.
//!
//! The orchestrator only sees the [`PageStore`] trait. Two implementations ship
//! with the crate:
//!
//! - [`MemoryPageStore`]: process-local, for tests and throwaway servers
//! - [`FilePageStore`]: one JSON file per page under a data directory
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//!   pages/
//!     pg_a1b2c3d4e5f6.json   # One page, file name derived from the slug
//!     pg_b2c3d4e5f6a7.json
//! ```

use async_trait::async_trait;

use crate::Result;
use crate::types::Page;

mod file;
mod memory;

pub use file::{FilePageStore, PageFileId};
pub use memory::MemoryPageStore;

/// Persistence operations the page pipeline depends on.
///
/// Slugs passed in are already trimmed and non-empty. `create_or_update` is an
/// upsert by slug: the last write wins and `created_at` of an existing page is
/// kept.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Look up a page, `None` when the slug was never stored.
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Page>>;

    /// Insert or replace the page for `slug`, returning what was persisted.
    async fn create_or_update(&self, slug: &str, markup: &str) -> Result<Page>;

    /// Any stored page chosen uniformly at random, `None` when empty.
    async fn random_page(&self) -> Result<Option<Page>>;

    /// The page created last, `None` when empty.
    async fn most_recent_page(&self) -> Result<Option<Page>>;

    /// Every page ordered by slug.
    async fn list_pages(&self) -> Result<Vec<Page>>;

    /// Number of stored pages.
    async fn count_pages(&self) -> Result<usize>;
}

/// Newest first by creation time; slug breaks ties so the choice is stable.
pub(crate) fn newest(pages: impl IntoIterator<Item = Page>) -> Option<Page> {
    pages
        .into_iter()
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| b.slug.cmp(&a.slug)))
}
