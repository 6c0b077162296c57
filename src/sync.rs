//! Content sync pipeline.
//!
//! Walks a directory of post folders, normalizes each folder's Markdown into
//! post/page rows, and upserts them. A folder is one post; it is multi-page
//! iff it contains a `SUMMARY.md` table of contents, otherwise `README.md`
//! supplies both metadata and the full body.
//!
//! The pipeline is idempotent and safely re-runnable: posts upsert by slug,
//! pages by `(blog_id, slug)`, and a SHA-256 hash over the folder's sources
//! lets an unchanged folder be skipped outright. Failures are isolated at
//! folder granularity (and at page granularity inside a multi-page post);
//! one broken folder never aborts the batch.

use anyhow::{bail, Context, Result};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

use crate::config::Config;
use crate::markdown::{extract_metadata, parse_document, slugify};
use crate::models::{PageUpsert, PostUpsert};
use crate::store::BlogStore;

/// `* [Title](relative/path.md)` lines in a SUMMARY.md.
static SUMMARY_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\s*\[([^\]]+)\]\(([^)]+)\)").unwrap());

/// One ordered table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    pub title: String,
    pub slug: String,
    pub relative_path: String,
}

/// Extracts the ordered page list from a SUMMARY.md body. Position in the
/// returned vec is the page order.
pub fn parse_summary(content: &str) -> Vec<SummaryEntry> {
    SUMMARY_LINK_RE
        .captures_iter(content)
        .map(|caps| {
            let title = caps[1].trim().to_string();
            SummaryEntry {
                slug: slugify(&title),
                title,
                relative_path: caps[2].trim().to_string(),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Ignore stored content hashes and re-upsert every folder.
    pub full: bool,
    /// Report what would be synced without writing.
    pub dry_run: bool,
    /// Cap the number of folders processed.
    pub limit: Option<usize>,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub folders_found: usize,
    pub synced: usize,
    pub skipped: usize,
    pub pages_written: u64,
    pub errors: Vec<(String, String)>,
}

/// Drives a full sync of the configured blogs directory.
pub async fn run_sync(
    config: &Config,
    store: &dyn BlogStore,
    opts: SyncOptions,
) -> Result<SyncReport> {
    let root = &config.sync.root;
    if !root.exists() {
        bail!("sync root does not exist: {}", root.display());
    }

    let mut folders = find_post_folders(root)?;
    if let Some(limit) = opts.limit {
        folders.truncate(limit);
    }

    let mut report = SyncReport {
        folders_found: folders.len(),
        ..Default::default()
    };

    if opts.dry_run {
        println!("sync {} (dry-run)", root.display());
        println!("  folders found: {}", report.folders_found);
        for folder in &folders {
            let multipage = folder.join("SUMMARY.md").exists();
            let kind = if multipage { "multi-page" } else { "single-page" };
            println!("  would sync: {} ({})", folder.display(), kind);
        }
        return Ok(report);
    }

    for folder in &folders {
        match sync_folder(store, folder, opts.full).await {
            Ok(FolderOutcome::Skipped) => report.skipped += 1,
            Ok(FolderOutcome::Synced { pages }) => {
                report.synced += 1;
                report.pages_written += pages;
            }
            Err(err) => {
                tracing::warn!(folder = %folder.display(), error = %err, "folder sync failed");
                report
                    .errors
                    .push((folder.display().to_string(), format!("{err:#}")));
            }
        }
    }

    println!("sync {}", root.display());
    println!("  folders found: {}", report.folders_found);
    println!("  synced: {}", report.synced);
    println!("  pages written: {}", report.pages_written);
    println!("  skipped (unchanged): {}", report.skipped);
    if !report.errors.is_empty() {
        println!("  errors: {}", report.errors.len());
        for (folder, err) in &report.errors {
            println!("    - {}: {}", folder, err);
        }
    }
    println!("ok");

    Ok(report)
}

enum FolderOutcome {
    Skipped,
    Synced { pages: u64 },
}

/// Directories directly under the root that contain a README.md, sorted for
/// deterministic processing order.
fn find_post_folders(root: &Path) -> Result<Vec<PathBuf>> {
    let mut folders = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_dir() && entry.path().join("README.md").is_file() {
            folders.push(entry.path().to_path_buf());
        }
    }
    folders.sort();
    Ok(folders)
}

async fn sync_folder(store: &dyn BlogStore, folder: &Path, full: bool) -> Result<FolderOutcome> {
    let folder_name = folder
        .file_name()
        .and_then(|n| n.to_str())
        .context("folder name is not valid UTF-8")?
        .to_string();

    let slug = slugify(&folder_name);
    if slug.is_empty() {
        bail!("folder name '{}' yields an empty slug", folder_name);
    }

    let readme_path = folder.join("README.md");
    let readme = std::fs::read_to_string(&readme_path)
        .with_context(|| format!("failed to read {}", readme_path.display()))?;

    let summary_path = folder.join("SUMMARY.md");
    let summary = if summary_path.is_file() {
        Some(
            std::fs::read_to_string(&summary_path)
                .with_context(|| format!("failed to read {}", summary_path.display()))?,
        )
    } else {
        None
    };

    let entries = summary.as_deref().map(parse_summary).unwrap_or_default();
    let hash = folder_hash(&readme, summary.as_deref(), folder, &entries);

    if !full {
        if let Some(stored) = store.content_hash(&slug).await? {
            if stored == hash {
                tracing::debug!(slug, "unchanged, skipping");
                return Ok(FolderOutcome::Skipped);
            }
        }
    }

    let (fm, body) = parse_document(&readme);
    let meta = extract_metadata(&fm, &body, &folder_name);

    if summary.is_none() {
        let post = store
            .upsert_post(&PostUpsert {
                slug: slug.clone(),
                title: meta.title.clone(),
                excerpt: meta.excerpt,
                content: Some(body.clone()),
                date: meta.date,
                read_time: meta.read_time,
                tags: meta.tags,
                featured: meta.featured,
                status: meta.status,
                is_multipage: false,
                page_count: 1,
                cover_light: meta.cover_light,
                cover_dark: meta.cover_dark,
                cover_y: meta.cover_y,
                cover_visible: meta.cover_visible,
                cover_size: meta.cover_size,
                github_folder_name: Some(folder_name),
                content_hash: None,
            })
            .await?;

        // One uniform "main" page so the /content endpoint reads the same
        // way for every post.
        store
            .upsert_page(&PageUpsert {
                blog_id: post.id,
                slug: "main".to_string(),
                title: meta.title,
                content: body,
                page_order: 0,
            })
            .await?;

        // The hash lands last: a failed page write leaves it unset, so the
        // folder is retried on the next run instead of being skipped.
        store
            .upsert_post(&PostUpsert {
                content_hash: Some(hash),
                ..post_to_upsert(&post)
            })
            .await?;

        tracing::info!(slug = %post.slug, "synced single-page post");
        return Ok(FolderOutcome::Synced { pages: 1 });
    }

    if entries.is_empty() {
        bail!("SUMMARY.md contains no page links");
    }

    // The post row first (pages need its id), then each chapter. A page
    // whose source file is missing fails alone; the rest of the post still
    // syncs. The hash is only stored when every page landed, so a partial
    // folder is retried on the next run.
    let mut page_errors = 0usize;
    let mut pages_written = 0u64;

    let post = store
        .upsert_post(&PostUpsert {
            slug: slug.clone(),
            title: meta.title.clone(),
            excerpt: meta.excerpt,
            content: None,
            date: meta.date,
            read_time: meta.read_time,
            tags: meta.tags,
            featured: meta.featured,
            status: meta.status,
            is_multipage: true,
            page_count: entries.len() as i64,
            cover_light: meta.cover_light,
            cover_dark: meta.cover_dark,
            cover_y: meta.cover_y,
            cover_visible: meta.cover_visible,
            cover_size: meta.cover_size,
            github_folder_name: Some(folder_name),
            content_hash: None,
        })
        .await?;

    for (order, entry) in entries.iter().enumerate() {
        let page_path = folder.join(&entry.relative_path);
        let raw = match std::fs::read_to_string(&page_path) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(
                    page = %entry.title,
                    path = %page_path.display(),
                    error = %err,
                    "page sync failed"
                );
                page_errors += 1;
                continue;
            }
        };

        let (_, page_body) = parse_document(&raw);
        store
            .upsert_page(&PageUpsert {
                blog_id: post.id,
                slug: entry.slug.clone(),
                title: entry.title.clone(),
                content: page_body,
                page_order: order as i64,
            })
            .await?;
        pages_written += 1;
    }

    if page_errors == 0 {
        store
            .upsert_post(&PostUpsert {
                content_hash: Some(hash),
                ..post_to_upsert(&post)
            })
            .await?;
    }

    tracing::info!(slug = %post.slug, pages = pages_written, "synced multi-page post");
    Ok(FolderOutcome::Synced { pages: pages_written })
}

fn post_to_upsert(post: &crate::models::Post) -> PostUpsert {
    PostUpsert {
        slug: post.slug.clone(),
        title: post.title.clone(),
        excerpt: post.excerpt.clone(),
        content: post.content.clone(),
        date: post.date.clone(),
        read_time: post.read_time.clone(),
        tags: post.tags.clone(),
        featured: post.featured,
        status: post.status,
        is_multipage: post.is_multipage,
        page_count: post.page_count,
        cover_light: post.cover_light.clone(),
        cover_dark: post.cover_dark.clone(),
        cover_y: post.cover_y,
        cover_visible: post.cover_visible,
        cover_size: post.cover_size.clone(),
        github_folder_name: post.github_folder_name.clone(),
        content_hash: None,
    }
}

/// SHA-256 over the folder's Markdown sources: README, SUMMARY, and every
/// referenced page file that exists, in table-of-contents order.
fn folder_hash(
    readme: &str,
    summary: Option<&str>,
    folder: &Path,
    entries: &[SummaryEntry],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(readme.as_bytes());
    if let Some(summary) = summary {
        hasher.update(summary.as_bytes());
    }
    for entry in entries {
        if let Ok(content) = std::fs::read(folder.join(&entry.relative_path)) {
            hasher.update(&content);
        }
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DbConfig, GithubConfig, ServerConfig, SyncConfig, UploadsConfig};
    use crate::db;
    use crate::migrate;
    use crate::store::{SqliteStore, StoreError};
    use std::fs;

    fn parse(content: &str) -> Vec<SummaryEntry> {
        parse_summary(content)
    }

    #[test]
    fn summary_parsing_order_and_slugs() {
        let entries = parse("* [Intro](01-intro.md)\n* [Details](02-details.md)\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].slug, "intro");
        assert_eq!(entries[0].relative_path, "01-intro.md");
        assert_eq!(entries[1].slug, "details");
    }

    #[test]
    fn summary_ignores_non_list_lines() {
        let entries = parse("# Table of contents\n\nplain text\n* [Only One](a.md)\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Only One");
    }

    async fn test_store() -> SqliteStore {
        let pool = db::connect_memory().await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn test_config(root: &Path) -> Config {
        Config {
            db: DbConfig {
                path: "unused.sqlite".into(),
            },
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
                api_key: String::new(),
                allowed_origins: vec![],
            },
            github: GithubConfig::default(),
            sync: SyncConfig {
                root: root.to_path_buf(),
            },
            uploads: UploadsConfig::default(),
        }
    }

    #[tokio::test]
    async fn single_page_folder_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = tmp.path().join("my-post");
        fs::create_dir(&folder).unwrap();
        fs::write(
            folder.join("README.md"),
            "---\ntitle: My Post\ntags: [a, b]\n---\n# My Post\n\nHello world.",
        )
        .unwrap();

        let store = test_store().await;
        let report = run_sync(&test_config(tmp.path()), &store, SyncOptions::default())
            .await
            .unwrap();
        assert_eq!(report.synced, 1);
        assert!(report.errors.is_empty());

        let post = store.find_post("my-post").await.unwrap().unwrap();
        assert_eq!(post.title, "My Post");
        assert!(!post.is_multipage);
        assert_eq!(post.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(post.page_count, 1);
        assert!(post.content.as_deref().unwrap().contains("Hello world."));

        let pages = store.pages_for(post.id).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].slug, "main");
        assert_eq!(pages[0].page_order, 0);
    }

    #[tokio::test]
    async fn multipage_folder_orders_pages() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = tmp.path().join("guide");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("README.md"), "# Guide\n\nOverview paragraph.").unwrap();
        fs::write(
            folder.join("SUMMARY.md"),
            "* [Intro](01-intro.md)\n* [Details](02-details.md)\n",
        )
        .unwrap();
        fs::write(folder.join("01-intro.md"), "Intro body.").unwrap();
        fs::write(folder.join("02-details.md"), "Details body.").unwrap();

        let store = test_store().await;
        run_sync(&test_config(tmp.path()), &store, SyncOptions::default())
            .await
            .unwrap();

        let post = store.find_post("guide").await.unwrap().unwrap();
        assert!(post.is_multipage);
        assert_eq!(post.page_count, 2);
        assert!(post.content.is_none());

        let pages = store.pages_for(post.id).await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!((pages[0].slug.as_str(), pages[0].page_order), ("intro", 0));
        assert_eq!((pages[1].slug.as_str(), pages[1].page_order), ("details", 1));
    }

    #[tokio::test]
    async fn missing_page_file_fails_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = tmp.path().join("partial");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("README.md"), "# Partial\n\nBody.").unwrap();
        fs::write(
            folder.join("SUMMARY.md"),
            "* [Exists](ok.md)\n* [Missing](gone.md)\n",
        )
        .unwrap();
        fs::write(folder.join("ok.md"), "I exist.").unwrap();

        let store = test_store().await;
        let report = run_sync(&test_config(tmp.path()), &store, SyncOptions::default())
            .await
            .unwrap();
        assert_eq!(report.synced, 1);
        assert_eq!(report.pages_written, 1);

        let post = store.find_post("partial").await.unwrap().unwrap();
        let pages = store.pages_for(post.id).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].slug, "exists");
    }

    /// Delegates to a real store but fails a set number of page writes,
    /// standing in for a transient database error mid-folder.
    struct FailingPageWrites {
        inner: SqliteStore,
        failures_left: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl BlogStore for FailingPageWrites {
        async fn list_published(&self) -> Result<Vec<crate::models::Post>, StoreError> {
            self.inner.list_published().await
        }
        async fn find_post(
            &self,
            id_or_slug: &str,
        ) -> Result<Option<crate::models::Post>, StoreError> {
            self.inner.find_post(id_or_slug).await
        }
        async fn pages_for(
            &self,
            blog_id: i64,
        ) -> Result<Vec<crate::models::PageRef>, StoreError> {
            self.inner.pages_for(blog_id).await
        }
        async fn find_page(
            &self,
            blog_id: i64,
            slug: &str,
        ) -> Result<Option<crate::models::Page>, StoreError> {
            self.inner.find_page(blog_id, slug).await
        }
        async fn page_by_order(
            &self,
            blog_id: i64,
            page_order: i64,
        ) -> Result<Option<crate::models::Page>, StoreError> {
            self.inner.page_by_order(blog_id, page_order).await
        }
        async fn adjacent_pages(
            &self,
            blog_id: i64,
            page_order: i64,
        ) -> Result<crate::models::PageNav, StoreError> {
            self.inner.adjacent_pages(blog_id, page_order).await
        }
        async fn adjacent_posts(&self, date: &str) -> Result<crate::models::PostNav, StoreError> {
            self.inner.adjacent_posts(date).await
        }
        async fn content_hash(&self, slug: &str) -> Result<Option<String>, StoreError> {
            self.inner.content_hash(slug).await
        }
        async fn upsert_post(
            &self,
            post: &PostUpsert,
        ) -> Result<crate::models::Post, StoreError> {
            self.inner.upsert_post(post).await
        }
        async fn upsert_page(&self, page: &PageUpsert) -> Result<(), StoreError> {
            use std::sync::atomic::Ordering;
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Database(sqlx::Error::PoolClosed));
            }
            self.inner.upsert_page(page).await
        }
        async fn create_post(
            &self,
            post: &PostUpsert,
        ) -> Result<crate::models::Post, StoreError> {
            self.inner.create_post(post).await
        }
        async fn update_post(
            &self,
            id: i64,
            patch: &crate::models::PostPatch,
        ) -> Result<crate::models::Post, StoreError> {
            self.inner.update_post(id, patch).await
        }
        async fn delete_post(&self, id: i64) -> Result<(), StoreError> {
            self.inner.delete_post(id).await
        }
        async fn record_image(
            &self,
            image: &crate::models::NewImage,
        ) -> Result<crate::models::ImageRecord, StoreError> {
            self.inner.record_image(image).await
        }
    }

    #[tokio::test]
    async fn failed_page_write_is_retried_next_run() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = tmp.path().join("flaky");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("README.md"), "# Flaky\n\nBody.").unwrap();

        let store = FailingPageWrites {
            inner: test_store().await,
            failures_left: std::sync::atomic::AtomicUsize::new(1),
        };
        let cfg = test_config(tmp.path());

        // First run: the post row lands but the main page write fails, so
        // the folder must not record a content hash.
        let first = run_sync(&cfg, &store, SyncOptions::default()).await.unwrap();
        assert_eq!(first.synced, 0);
        assert_eq!(first.errors.len(), 1);
        assert!(store.inner.content_hash("flaky").await.unwrap().is_none());

        // Second run retries the folder instead of skipping it.
        let second = run_sync(&cfg, &store, SyncOptions::default()).await.unwrap();
        assert_eq!(second.synced, 1);
        assert_eq!(second.skipped, 0);

        let post = store.inner.find_post("flaky").await.unwrap().unwrap();
        let pages = store.inner.pages_for(post.id).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].slug, "main");

        // Third run finally skips, once page and hash are both in place.
        let third = run_sync(&cfg, &store, SyncOptions::default()).await.unwrap();
        assert_eq!(third.skipped, 1);
    }

    #[tokio::test]
    async fn second_run_skips_unchanged_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = tmp.path().join("stable");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("README.md"), "# Stable\n\nUnchanging.").unwrap();

        let store = test_store().await;
        let cfg = test_config(tmp.path());
        run_sync(&cfg, &store, SyncOptions::default()).await.unwrap();
        let before = store.find_post("stable").await.unwrap().unwrap();

        let second = run_sync(&cfg, &store, SyncOptions::default()).await.unwrap();
        assert_eq!(second.skipped, 1);
        assert_eq!(second.synced, 0);

        let after = store.find_post("stable").await.unwrap().unwrap();
        assert_eq!(before.updated_at, after.updated_at);
        assert_eq!(before.content, after.content);

        // Editing the source makes it sync again.
        fs::write(folder.join("README.md"), "# Stable\n\nChanged now.").unwrap();
        let third = run_sync(&cfg, &store, SyncOptions::default()).await.unwrap();
        assert_eq!(third.synced, 1);
        let changed = store.find_post("stable").await.unwrap().unwrap();
        assert!(changed.content.as_deref().unwrap().contains("Changed now."));
    }

    #[tokio::test]
    async fn folder_without_readme_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("not-a-post")).unwrap();
        let store = test_store().await;
        let report = run_sync(&test_config(tmp.path()), &store, SyncOptions::default())
            .await
            .unwrap();
        assert_eq!(report.folders_found, 0);
    }
}
