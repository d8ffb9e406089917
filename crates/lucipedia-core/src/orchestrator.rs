//! Get-or-generate page orchestration.
//!
//! [`WikiService`] composes the store, the model capabilities and the markup
//! pipeline:
//!
//! ```text
//! get_page(slug)
//!   -> lookup ── hit ──────────────────────────────────────────────> markup
//!            └─ miss -> generate -> sanitize -> extract -> validate -> persist -> markup
//! ```
//!
//! Any step on the miss branch failing aborts the request and nothing is
//! written. Persisting is always the last step.
//!
//! Dropping a returned future cancels the in-flight store or model call; a
//! cancelled request writes nothing and logs nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info};

use crate::backlinks;
use crate::llm::{Generator, Searcher};
use crate::sanitizer::sanitize;
use crate::store::PageStore;
use crate::types::{Generation, GenerationResult, Page, SearchResult};
use crate::{Error, OperationContext, Result};

/// Result count used when a caller asks for zero.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Per-slug locks for coalescing concurrent misses.
#[derive(Debug, Default)]
struct InFlight {
    slots: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl InFlight {
    async fn acquire(&self, slug: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.retain(|_, slot| slot.strong_count() > 0);
            if let Some(existing) = slots.get(slug).and_then(Weak::upgrade) {
                existing
            } else {
                let fresh = Arc::new(AsyncMutex::new(()));
                slots.insert(slug.to_string(), Arc::downgrade(&fresh));
                fresh
            }
        };
        slot.lock_owned().await
    }
}

fn fail(operation: &'static str, slug: &str, err: Error) -> Error {
    let err = err.context(operation, slug);
    error!(
        slug,
        category = err.category(),
        blocked = err.is_blocked(),
        error = %err,
        "page generation failed"
    );
    err
}

/// Page orchestrator shared by every transport.
///
/// Cheap to clone; all collaborators are behind `Arc`.
#[derive(Clone)]
pub struct WikiService {
    store: Arc<dyn PageStore>,
    generator: Arc<dyn Generator>,
    searcher: Arc<dyn Searcher>,
    generation_timeout: Option<Duration>,
    in_flight: Option<Arc<InFlight>>,
}

impl std::fmt::Debug for WikiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WikiService")
            .field("generation_timeout", &self.generation_timeout)
            .field("coalescing", &self.in_flight.is_some())
            .finish_non_exhaustive()
    }
}

impl WikiService {
    /// Create a service without a generation deadline and without coalescing.
    pub fn new(
        store: Arc<dyn PageStore>,
        generator: Arc<dyn Generator>,
        searcher: Arc<dyn Searcher>,
    ) -> Self {
        Self {
            store,
            generator,
            searcher,
            generation_timeout: None,
            in_flight: None,
        }
    }

    /// Fail generations that take longer than `timeout` with [`Error::Timeout`].
    #[must_use]
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Share one generation between concurrent misses for the same slug.
    ///
    /// Off by default: concurrent misses each call the model and the last
    /// write wins.
    #[must_use]
    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(|| Arc::new(InFlight::default()));
        self
    }

    /// Serve the stored page for `slug`, generating and persisting it on a miss.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for a blank slug
    /// - Any store, generation, sanitize or backlink failure, wrapped with the
    ///   operation and slug
    pub async fn get_page(&self, slug: &str) -> Result<String> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Err(Error::InvalidInput("slug is required".into()));
        }

        if let Some(markup) = self.lookup(slug).await? {
            return Ok(markup);
        }

        let _slot = match &self.in_flight {
            Some(in_flight) => {
                let guard = in_flight.acquire(slug).await;
                if let Some(markup) = self.lookup(slug).await? {
                    debug!(slug, "served page generated by a concurrent request");
                    return Ok(markup);
                }
                Some(guard)
            },
            None => None,
        };

        let result = self.generate(slug).await?;
        self.store
            .create_or_update(slug, &result.markup)
            .await
            .during("saving page", slug)
            .inspect_err(|e| {
                error!(slug, category = e.category(), error = %e, "persisting page failed");
            })?;

        info!(slug, backlinks = result.backlinks.len(), "generated page");
        Ok(result.markup)
    }

    async fn lookup(&self, slug: &str) -> Result<Option<String>> {
        let page = self
            .store
            .get_by_slug(slug)
            .await
            .during("retrieving page", slug)
            .inspect_err(|e| {
                error!(slug, category = e.category(), error = %e, "page lookup failed");
            })?;

        Ok(page
            .map(|page| page.markup.trim().to_string())
            .filter(|markup| !markup.is_empty()))
    }

    /// Generate, sanitize, extract and validate. Nothing is persisted here.
    async fn generate(&self, slug: &str) -> Result<GenerationResult> {
        let generation = match self.generation_timeout {
            Some(limit) => tokio::time::timeout(limit, self.generator.generate(slug))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Timeout(format!(
                        "generation exceeded {}s",
                        limit.as_secs_f64()
                    )))
                }),
            None => self.generator.generate(slug).await,
        };

        let (text, declared) = match generation {
            Ok(Generation::Content {
                text,
                declared_backlinks,
            }) => (text, declared_backlinks),
            Ok(Generation::Refusal(reason)) => {
                return Err(fail("generating page", slug, Error::Refused(reason)));
            },
            Ok(Generation::ContentFiltered) => {
                return Err(fail("generating page", slug, Error::ContentFiltered));
            },
            Err(err) => return Err(fail("generating page", slug, err)),
        };

        let markup = sanitize(&text).map_err(|e| fail("sanitizing page", slug, e))?;

        let backlinks = backlinks::merge(backlinks::extract(&markup), &declared);
        backlinks::validate(&markup, &backlinks)
            .map_err(|e| fail("validating backlinks", slug, e))?;

        Ok(GenerationResult { markup, backlinks })
    }

    /// Slug of a uniformly random stored page.
    ///
    /// # Errors
    ///
    /// [`Error::NoPages`] when the store is empty.
    pub async fn random_slug(&self) -> Result<String> {
        let page = self
            .store
            .random_page()
            .await
            .during("selecting random page", "")
            .inspect_err(|e| {
                error!(category = e.category(), error = %e, "random page lookup failed");
            })?
            .ok_or(Error::NoPages)?;

        let slug = page.slug.trim();
        if slug.is_empty() {
            let err = Error::Integrity("random page has empty slug".into())
                .context("selecting random page", "");
            error!(category = err.category(), error = %err, "random page lookup failed");
            return Err(err);
        }
        Ok(slug.to_string())
    }

    /// The newest page, with trimmed slug and markup.
    ///
    /// # Errors
    ///
    /// [`Error::NoPages`] when the store is empty, [`Error::Integrity`] when
    /// the stored row has no slug or no markup.
    pub async fn most_recent_page(&self) -> Result<Page> {
        let page = self
            .store
            .most_recent_page()
            .await
            .during("retrieving most recent page", "")
            .inspect_err(|e| {
                error!(category = e.category(), error = %e, "recent page lookup failed");
            })?
            .ok_or(Error::NoPages)?;

        let slug = page.slug.trim();
        if slug.is_empty() {
            let err = Error::Integrity("most recent page has empty slug".into())
                .context("retrieving most recent page", "");
            error!(category = err.category(), error = %err, "recent page lookup failed");
            return Err(err);
        }
        let markup = page.markup.trim();
        if markup.is_empty() {
            error!(slug, "most recent page has empty markup");
            return Err(Error::Integrity("stored page has empty markup".into())
                .context("retrieving most recent page", slug));
        }

        Ok(Page {
            slug: slug.to_string(),
            markup: markup.to_string(),
            ..page
        })
    }

    /// Ranked suggestions for `query`, at most `limit` (10 when zero).
    ///
    /// Ranking belongs to the [`Searcher`]; results are only trimmed, filtered
    /// and truncated here.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("query is required".into()));
        }
        let limit = if limit == 0 { DEFAULT_SEARCH_LIMIT } else { limit };

        let slugs = self
            .searcher
            .search(query, limit)
            .await
            .during("searching pages", query)
            .inspect_err(|e| {
                error!(query, category = e.category(), error = %e, "search failed");
            })?;

        Ok(slugs
            .iter()
            .map(|slug| slug.trim())
            .filter(|slug| !slug.is_empty())
            .take(limit)
            .map(|slug| SearchResult {
                slug: slug.to_string(),
            })
            .collect())
    }

    /// Number of stored pages.
    pub async fn page_count(&self) -> Result<usize> {
        self.store.count_pages().await.during("counting pages", "")
    }

    /// Every stored page ordered by slug.
    pub async fn list_pages(&self) -> Result<Vec<Page>> {
        self.store.list_pages().await.during("listing pages", "")
    }
}
