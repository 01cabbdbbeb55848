//! Incremental account crawler.
//!
//! Walks user → repos → docs, comparing each remote `updated_at` with the
//! mirrored copy and fetching only what changed. Entries that vanished
//! upstream are removed from the mirror.
//!
//! Failure policy: authentication errors abort the crawl. Any other failure
//! on a repo or document is logged, recorded in [`CrawlResult::errors`] and
//! skipped; the persisted listings then keep the previous (or no) entry for
//! it so the next crawl retries it.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use lakeexport_shared::{DocSummary, ProgressReporter, Remote, Result, has_update};

use crate::client::ApiClient;
use crate::store::MetaStore;

// ---------------------------------------------------------------------------
// Options & result
// ---------------------------------------------------------------------------

/// Crawl behaviour switches.
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Ignore cached timestamps and refetch everything.
    pub full: bool,
}

/// Summary of a completed crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    /// Login of the crawled account.
    pub login: String,
    /// Repos listed upstream.
    pub repos_total: usize,
    /// Repos whose document listing was refreshed.
    pub repos_crawled: usize,
    /// Repos skipped because nothing changed.
    pub repos_unchanged: usize,
    /// Local repos deleted because they vanished upstream.
    pub repos_removed: usize,
    /// Documents downloaded.
    pub docs_fetched: usize,
    /// Documents skipped because nothing changed.
    pub docs_unchanged: usize,
    /// Local documents deleted because they vanished upstream.
    pub docs_removed: usize,
    /// Skipped failures (item, error message).
    pub errors: Vec<(String, String)>,
    /// Total duration of the crawl.
    pub duration: Duration,
}

/// What happened to one repo.
enum RepoOutcome {
    Unchanged,
    Crawled { failed_docs: usize },
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Mirrors the authenticated account into a [`MetaStore`].
pub struct Crawler {
    client: ApiClient,
    store: MetaStore,
    options: CrawlOptions,
}

impl Crawler {
    pub fn new(client: ApiClient, store: MetaStore, options: CrawlOptions) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    /// Crawl the whole account.
    #[instrument(skip_all, fields(meta_dir = %self.store.meta_dir().display(), full = self.options.full))]
    pub async fn crawl(&self, progress: &dyn ProgressReporter) -> Result<CrawlResult> {
        let start = Instant::now();
        let mut result = CrawlResult::default();

        // --- User ---
        progress.phase("Fetching account");
        let user = self.client.user().await?;
        let cached_user = self.store.user()?;
        if self.options.full || cached_user.is_none_or(|cached| has_update(&cached, &user)) {
            self.store.save_user(&user)?;
        }
        let login = user.login.clone();
        result.login = login.clone();

        // --- Repo listing ---
        progress.phase("Listing repos");
        let repos = self.client.repos(&login).await?;
        result.repos_total = repos.len();

        let remote_slugs: HashSet<&str> = repos.iter().map(|r| r.slug.as_str()).collect();
        for slug in self.store.local_repo_slugs(&login)? {
            if !remote_slugs.contains(slug.as_str()) {
                warn!(repo = %format!("{login}/{slug}"), "removing repo no longer present upstream");
                self.store.remove_repo(&login, &slug)?;
                result.repos_removed += 1;
            }
        }

        // --- Repos ---
        let cached_repos = self.store.repos(&login)?.unwrap_or_default();
        let cached_by_slug = index_by_key(&cached_repos);
        let mut failed_repos: HashSet<String> = HashSet::new();

        for (i, repo) in repos.iter().enumerate() {
            info!(repo = %repo.name, "crawling repo ({}/{})", i + 1, repos.len());
            progress.phase(&format!("Crawling {} ({}/{})", repo.name, i + 1, repos.len()));

            if !self.options.full {
                if let Some(cached) = cached_by_slug.get(repo.slug.as_str()) {
                    if !has_update(*cached, repo) && self.has_repo_files(&repo.namespace)? {
                        info!(repo = %repo.name, "no update");
                        result.repos_unchanged += 1;
                        continue;
                    }
                }
            }

            match self.crawl_repo(&repo.namespace, &mut result, progress).await {
                Ok(RepoOutcome::Unchanged) => result.repos_unchanged += 1,
                Ok(RepoOutcome::Crawled { failed_docs }) => {
                    result.repos_crawled += 1;
                    if failed_docs > 0 {
                        failed_repos.insert(repo.slug.clone());
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(repo = %repo.namespace, error = %e, "repo crawl failed, skipping");
                    result.errors.push((repo.namespace.clone(), e.to_string()));
                    failed_repos.insert(repo.slug.clone());
                }
            }
        }

        let persisted = retain_stale(&repos, &cached_by_slug, &failed_repos);
        self.store.save_repos(&login, &persisted)?;

        result.duration = start.elapsed();
        progress.done();

        info!(
            login = %result.login,
            repos = result.repos_total,
            crawled = result.repos_crawled,
            fetched = result.docs_fetched,
            unchanged = result.docs_unchanged,
            removed = result.docs_removed + result.repos_removed,
            errors = result.errors.len(),
            duration_ms = result.duration.as_millis() as u64,
            "crawl completed"
        );

        Ok(result)
    }

    /// Refresh one repo: detail, doc listing, changed docs, catalog.
    #[instrument(skip(self, result, progress))]
    async fn crawl_repo(
        &self,
        namespace: &str,
        result: &mut CrawlResult,
        progress: &dyn ProgressReporter,
    ) -> Result<RepoOutcome> {
        let detail = self.client.repo(namespace).await?;
        if !self.options.full {
            if let Some(cached) = self.store.repo(namespace)? {
                if !has_update(&cached, &detail) && self.store.docs(namespace)?.is_some() {
                    return Ok(RepoOutcome::Unchanged);
                }
            }
        }

        let docs = self.client.docs(namespace).await?;

        // Remove old docs
        let remote_slugs: HashSet<&str> = docs.iter().map(|d| d.slug.as_str()).collect();
        for slug in self.store.doc_slugs(namespace)? {
            if !remote_slugs.contains(slug.as_str()) {
                warn!(doc = %format!("{namespace}/{slug}"), "removing doc no longer present upstream");
                self.store.remove_doc(namespace, &slug)?;
                result.docs_removed += 1;
            }
        }

        // Fetch new or changed docs
        let cached_docs = self.store.docs(namespace)?.unwrap_or_default();
        let cached_by_slug = index_by_key(&cached_docs);
        let mut failed: HashSet<String> = HashSet::new();

        for (i, doc) in docs.iter().enumerate() {
            progress.doc_fetched(&doc.title, i + 1, docs.len());

            if !self.options.full && self.is_current(namespace, doc, &cached_by_slug)? {
                info!(title = %doc.title, "  no update ({}/{})", i + 1, docs.len());
                result.docs_unchanged += 1;
                continue;
            }

            info!(title = %doc.title, "  fetching ({}/{})", i + 1, docs.len());
            let fetched = match self.client.doc(namespace, &doc.slug).await {
                Ok(detail) => self.store.save_doc(namespace, &detail),
                Err(e) => Err(e),
            };
            match fetched {
                Ok(()) => result.docs_fetched += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(doc = %format!("{namespace}/{}", doc.slug), error = %e, "doc fetch failed, skipping");
                    result
                        .errors
                        .push((format!("{namespace}/{}", doc.slug), e.to_string()));
                    failed.insert(doc.slug.clone());
                }
            }
        }

        let persisted = retain_stale(&docs, &cached_by_slug, &failed);
        self.store.save_docs(namespace, &persisted)?;
        if let Some(toc) = &detail.toc_yml {
            self.store.save_toc(namespace, toc)?;
        }
        if failed.is_empty() {
            self.store.save_repo(&detail)?;
        }

        Ok(RepoOutcome::Crawled {
            failed_docs: failed.len(),
        })
    }

    /// A repo can be skipped only while its detail and doc listing are on disk.
    fn has_repo_files(&self, namespace: &str) -> Result<bool> {
        Ok(self.store.repo(namespace)?.is_some() && self.store.docs(namespace)?.is_some())
    }

    /// A doc is current when its cached summary is not older and its raw file exists.
    fn is_current(
        &self,
        namespace: &str,
        doc: &DocSummary,
        cached: &HashMap<&str, &DocSummary>,
    ) -> Result<bool> {
        match cached.get(doc.slug.as_str()) {
            Some(cached) if !has_update(*cached, doc) => self.store.has_doc(namespace, &doc.slug),
            _ => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn index_by_key<T: Remote>(items: &[T]) -> HashMap<&str, &T> {
    items.iter().map(|item| (item.key(), item)).collect()
}

/// The listing to persist: failed entries fall back to their cached version,
/// or are dropped when there is none, so they are retried next time.
fn retain_stale<T: Remote + Clone>(
    fresh: &[T],
    cached: &HashMap<&str, &T>,
    failed: &HashSet<String>,
) -> Vec<T> {
    fresh
        .iter()
        .filter_map(|item| {
            if failed.contains(item.key()) {
                cached.get(item.key()).map(|c| (*c).clone())
            } else {
                Some(item.clone())
            }
        })
        .collect()
}
