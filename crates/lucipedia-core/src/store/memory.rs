use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use rand::seq::IteratorRandom;
use tokio::sync::RwLock;

use super::{PageStore, newest};
use crate::Result;
use crate::types::Page;

/// In-process store. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryPageStore {
    pages: RwLock<BTreeMap<String, Page>>,
}

impl MemoryPageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `pages`.
    #[must_use]
    pub fn with_pages(pages: impl IntoIterator<Item = Page>) -> Self {
        Self {
            pages: RwLock::new(
                pages
                    .into_iter()
                    .map(|page| (page.slug.clone(), page))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl PageStore for MemoryPageStore {
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Page>> {
        Ok(self.pages.read().await.get(slug).cloned())
    }

    async fn create_or_update(&self, slug: &str, markup: &str) -> Result<Page> {
        let mut pages = self.pages.write().await;
        let page = match pages.get(slug) {
            Some(existing) => Page {
                markup: markup.to_string(),
                updated_at: Utc::now(),
                ..existing.clone()
            },
            None => Page::new(slug, markup),
        };
        pages.insert(slug.to_string(), page.clone());
        Ok(page)
    }

    async fn random_page(&self) -> Result<Option<Page>> {
        let pages = self.pages.read().await;
        Ok(pages.values().choose(&mut rand::thread_rng()).cloned())
    }

    async fn most_recent_page(&self) -> Result<Option<Page>> {
        Ok(newest(self.pages.read().await.values().cloned()))
    }

    async fn list_pages(&self) -> Result<Vec<Page>> {
        Ok(self.pages.read().await.values().cloned().collect())
    }

    async fn count_pages(&self) -> Result<usize> {
        Ok(self.pages.read().await.len())
    }
}
