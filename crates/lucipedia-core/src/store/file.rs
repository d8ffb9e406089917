//! File-backed page store.
//!
//! Each page is a pretty-printed JSON document at `<root>/pages/<id>.json`,
//! where the id is derived from the slug by [`PageFileId::from_slug`]. Writes
//! go to a temp file first and are renamed into place, so a crash never leaves
//! a half-written page behind.

use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use super::{PageStore, newest};
use crate::types::Page;
use crate::{Error, Result};

/// Durable file name stem for a slug.
///
/// Uses the first 12 hex chars of the slug's SHA-256 with a `pg_` prefix, so
/// arbitrary slugs map to safe file names.
///
/// ```rust
/// use lucipedia_core::store::PageFileId;
///
/// let id = PageFileId::from_slug("Ada_Lovelace");
/// assert!(id.as_str().starts_with("pg_"));
/// assert_eq!(id.as_str().len(), 15);
/// assert_eq!(id, PageFileId::from_slug("Ada_Lovelace"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageFileId(String);

impl PageFileId {
    /// Derive the id for `slug`.
    #[must_use]
    pub fn from_slug(slug: &str) -> Self {
        let digest = Sha256::digest(slug.as_bytes());
        let hex = digest.iter().take(6).fold(String::new(), |mut acc, b| {
            // write! to String is infallible
            let _ = write!(acc, "{b:02x}");
            acc
        });
        Self(format!("pg_{hex}"))
    }

    /// Full id including the `pg_` prefix.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store keeping one JSON file per page.
///
/// Safe for concurrent use within one process: upserts are serialized so that
/// `created_at` survives re-saves. Not coordinated across processes.
#[derive(Debug, Clone)]
pub struct FilePageStore {
    pages_dir: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl FilePageStore {
    /// Create a store rooted at `root`. Nothing is touched on disk until the
    /// first write.
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            pages_dir: Arc::new(root.as_ref().join("pages")),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Directory holding the page files.
    #[must_use]
    pub fn pages_dir(&self) -> &Path {
        &self.pages_dir
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
    {
        let dir = Arc::clone(&self.pages_dir);
        tokio::task::spawn_blocking(move || op(&dir))
            .await
            .map_err(|e| Error::Storage(format!("Storage task failed: {e}")))?
    }
}

fn page_path(dir: &Path, slug: &str) -> PathBuf {
    dir.join(format!("{}.json", PageFileId::from_slug(slug)))
}

fn read_page(path: &Path) -> Result<Page> {
    let json = fs::read_to_string(path).map_err(|e| {
        Error::Storage(format!("Failed to read page file {}: {e}", path.display()))
    })?;
    serde_json::from_str(&json)
        .map_err(|e| Error::Storage(format!("Failed to parse page file {}: {e}", path.display())))
}

fn load_page(dir: &Path, slug: &str) -> Result<Option<Page>> {
    let path = page_path(dir, slug);
    if !path.exists() {
        return Ok(None);
    }
    let page = read_page(&path)?;
    // Two slugs sharing a hash prefix would alias the same file.
    if page.slug != slug {
        return Err(Error::Integrity(format!(
            "page file {} holds slug '{}', expected '{slug}'",
            path.display(),
            page.slug
        )));
    }
    Ok(Some(page))
}

fn save_page(dir: &Path, page: &Page) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|e| Error::Storage(format!("Failed to create pages directory: {e}")))?;

    let path = page_path(dir, &page.slug);
    let json = serde_json::to_string_pretty(page)
        .map_err(|e| Error::Storage(format!("Failed to serialize page: {e}")))?;

    // Atomic write: temp file + rename
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json)
        .map_err(|e| Error::Storage(format!("Failed to write temp page file: {e}")))?;

    #[cfg(target_os = "windows")]
    if path.exists() {
        fs::remove_file(&path)
            .map_err(|e| Error::Storage(format!("Failed to remove existing page: {e}")))?;
    }

    fs::rename(&tmp_path, &path)
        .map_err(|e| Error::Storage(format!("Failed to commit page file: {e}")))?;

    debug!(slug = %page.slug, file = %path.display(), "saved page");
    Ok(())
}

/// Paths of committed page files; temp files are skipped.
fn page_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::Storage(format!("Failed to read pages directory: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| Error::Storage(format!("Failed to read directory entry: {e}")))?
            .path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            files.push(path);
        }
    }
    Ok(files)
}

fn load_all(dir: &Path) -> Result<Vec<Page>> {
    page_files(dir)?.iter().map(|path| read_page(path)).collect()
}

#[async_trait]
impl PageStore for FilePageStore {
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Page>> {
        let slug = slug.to_string();
        self.blocking(move |dir| load_page(dir, &slug)).await
    }

    async fn create_or_update(&self, slug: &str, markup: &str) -> Result<Page> {
        let _guard = self.write_lock.lock().await;
        let slug = slug.to_string();
        let markup = markup.to_string();
        self.blocking(move |dir| {
            let page = match load_page(dir, &slug)? {
                Some(existing) => Page {
                    markup,
                    updated_at: Utc::now(),
                    ..existing
                },
                None => Page::new(slug, markup),
            };
            save_page(dir, &page)?;
            Ok(page)
        })
        .await
    }

    async fn random_page(&self) -> Result<Option<Page>> {
        self.blocking(|dir| {
            let files = page_files(dir)?;
            files
                .iter()
                .choose(&mut rand::thread_rng())
                .map(|path| read_page(path))
                .transpose()
        })
        .await
    }

    async fn most_recent_page(&self) -> Result<Option<Page>> {
        self.blocking(|dir| Ok(newest(load_all(dir)?))).await
    }

    async fn list_pages(&self) -> Result<Vec<Page>> {
        self.blocking(|dir| {
            let mut pages = load_all(dir)?;
            pages.sort_by(|a, b| a.slug.cmp(&b.slug));
            Ok(pages)
        })
        .await
    }

    async fn count_pages(&self) -> Result<usize> {
        self.blocking(|dir| Ok(page_files(dir)?.len())).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load_page() {
        let temp = TempDir::new().unwrap();
        let store = FilePageStore::new(temp.path());

        let saved = store.create_or_update("alpha", "<div>Alpha</div>").await.unwrap();
        let loaded = store.get_by_slug("alpha").await.unwrap().unwrap();

        assert_eq!(saved, loaded);
        let expected = temp
            .path()
            .join("pages")
            .join(format!("{}.json", PageFileId::from_slug("alpha")));
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn test_missing_directory_reads_as_empty() {
        let temp = TempDir::new().unwrap();
        let store = FilePageStore::new(temp.path().join("never-created"));

        assert!(store.get_by_slug("alpha").await.unwrap().is_none());
        assert!(store.random_page().await.unwrap().is_none());
        assert!(store.most_recent_page().await.unwrap().is_none());
        assert!(store.list_pages().await.unwrap().is_empty());
        assert_eq!(store.count_pages().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resave_keeps_created_at() {
        let temp = TempDir::new().unwrap();
        let store = FilePageStore::new(temp.path());

        let first = store.create_or_update("alpha", "<div>v1</div>").await.unwrap();
        let second = store.create_or_update("alpha", "<div>v2</div>").await.unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_eq!(store.count_pages().await.unwrap(), 1);
        let loaded = store.get_by_slug("alpha").await.unwrap().unwrap();
        assert_eq!(loaded.markup, "<div>v2</div>");
    }

    #[tokio::test]
    async fn test_list_is_ordered_and_skips_temp_files() {
        let temp = TempDir::new().unwrap();
        let store = FilePageStore::new(temp.path());
        for slug in ["gamma", "alpha", "beta"] {
            store.create_or_update(slug, "<div>x</div>").await.unwrap();
        }
        fs::write(store.pages_dir().join("pg_partial.json.tmp"), "{").unwrap();

        let slugs: Vec<String> = store
            .list_pages()
            .await
            .unwrap()
            .into_iter()
            .map(|page| page.slug)
            .collect();

        assert_eq!(slugs, vec!["alpha", "beta", "gamma"]);
        assert_eq!(store.count_pages().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_most_recent_uses_created_at() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("pages");
        let older = Page::new("older", "<div>o</div>")
            .with_created_at(Utc::now() - chrono::Duration::days(1));
        let newer = Page::new("newer", "<div>n</div>");
        save_page(&dir, &older).unwrap();
        save_page(&dir, &newer).unwrap();

        let store = FilePageStore::new(temp.path());

        assert_eq!(store.most_recent_page().await.unwrap().unwrap().slug, "newer");
    }

    #[tokio::test]
    async fn test_corrupted_page_is_storage_error() {
        let temp = TempDir::new().unwrap();
        let store = FilePageStore::new(temp.path());
        fs::create_dir_all(store.pages_dir()).unwrap();
        fs::write(
            store
                .pages_dir()
                .join(format!("{}.json", PageFileId::from_slug("alpha"))),
            "not json",
        )
        .unwrap();

        let err = store.get_by_slug("alpha").await.unwrap_err();

        assert_eq!(err.category(), "storage");
    }

    #[tokio::test]
    async fn test_concurrent_upserts_of_distinct_slugs() {
        let temp = TempDir::new().unwrap();
        let store = FilePageStore::new(temp.path());

        let writes = (0..16).map(|i| {
            let store = store.clone();
            async move {
                store
                    .create_or_update(&format!("page-{i}"), "<div>x</div>")
                    .await
            }
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap();
        }

        assert_eq!(store.count_pages().await.unwrap(), 16);
    }
}
