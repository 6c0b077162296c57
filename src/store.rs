//! Store layer: a [`BlogStore`] trait over the relational backend plus the
//! SQLite implementation.
//!
//! The pool is constructed by the caller and passed in, so tests and custom
//! binaries can substitute their own store. Constraint violations surface as
//! [`StoreError::Conflict`] with a [`ConflictKind`] tag, populated here at
//! the adapter boundary — nothing above this layer matches on database
//! message strings.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::markdown::{estimate_read_time, slugify};
use crate::models::{
    ImageRecord, NewImage, Page, PageNav, PageRef, PageUpsert, Post, PostNav, PostPatch, PostRef,
    PostRow, PostUpsert,
};

/// Which uniqueness constraint a write collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// `blogs.slug`
    PostSlug,
    /// `blog_pages (blog_id, slug)`
    PageSlug,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::PostSlug => write!(f, "post slug"),
            ConflictKind::PageSlug => write!(f, "page slug"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("duplicate {kind}")]
    Conflict { kind: ConflictKind },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

fn tag_unique(err: sqlx::Error, kind: ConflictKind) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation => {
            StoreError::Conflict { kind }
        }
        _ => StoreError::Database(err),
    }
}

/// Operations the route handlers and the sync pipeline need from a backend.
#[async_trait]
pub trait BlogStore: Send + Sync {
    async fn list_published(&self) -> StoreResult<Vec<Post>>;
    /// Numeric input resolves by id, anything else by slug.
    async fn find_post(&self, id_or_slug: &str) -> StoreResult<Option<Post>>;
    async fn pages_for(&self, blog_id: i64) -> StoreResult<Vec<PageRef>>;
    async fn find_page(&self, blog_id: i64, slug: &str) -> StoreResult<Option<Page>>;
    async fn page_by_order(&self, blog_id: i64, page_order: i64) -> StoreResult<Option<Page>>;
    async fn adjacent_pages(&self, blog_id: i64, page_order: i64) -> StoreResult<PageNav>;
    async fn adjacent_posts(&self, date: &str) -> StoreResult<PostNav>;
    async fn content_hash(&self, slug: &str) -> StoreResult<Option<String>>;
    async fn upsert_post(&self, post: &PostUpsert) -> StoreResult<Post>;
    async fn upsert_page(&self, page: &PageUpsert) -> StoreResult<()>;
    async fn create_post(&self, post: &PostUpsert) -> StoreResult<Post>;
    async fn update_post(&self, id: i64, patch: &PostPatch) -> StoreResult<Post>;
    async fn delete_post(&self, id: i64) -> StoreResult<()>;
    async fn record_image(&self, image: &NewImage) -> StoreResult<ImageRecord>;
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn post_by_id(&self, id: i64) -> StoreResult<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>("SELECT * FROM blogs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Post::from))
    }

    async fn post_by_slug(&self, slug: &str) -> StoreResult<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>("SELECT * FROM blogs WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Post::from))
    }
}

#[async_trait]
impl BlogStore for SqliteStore {
    async fn list_published(&self) -> StoreResult<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            "SELECT * FROM blogs WHERE status = 'published' ORDER BY date DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn find_post(&self, id_or_slug: &str) -> StoreResult<Option<Post>> {
        if let Ok(id) = id_or_slug.parse::<i64>() {
            return self.post_by_id(id).await;
        }
        self.post_by_slug(id_or_slug).await
    }

    async fn pages_for(&self, blog_id: i64) -> StoreResult<Vec<PageRef>> {
        let refs = sqlx::query_as::<_, PageRef>(
            "SELECT id, title, slug, page_order FROM blog_pages \
             WHERE blog_id = ? ORDER BY page_order ASC",
        )
        .bind(blog_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(refs)
    }

    async fn find_page(&self, blog_id: i64, slug: &str) -> StoreResult<Option<Page>> {
        let page = sqlx::query_as::<_, Page>(
            "SELECT * FROM blog_pages WHERE blog_id = ? AND slug = ?",
        )
        .bind(blog_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(page)
    }

    async fn page_by_order(&self, blog_id: i64, page_order: i64) -> StoreResult<Option<Page>> {
        let page = sqlx::query_as::<_, Page>(
            "SELECT * FROM blog_pages WHERE blog_id = ? AND page_order = ?",
        )
        .bind(blog_id)
        .bind(page_order)
        .fetch_optional(&self.pool)
        .await?;
        Ok(page)
    }

    async fn adjacent_pages(&self, blog_id: i64, page_order: i64) -> StoreResult<PageNav> {
        let previous = sqlx::query_as::<_, PageRef>(
            "SELECT id, title, slug, page_order FROM blog_pages \
             WHERE blog_id = ? AND page_order < ? ORDER BY page_order DESC LIMIT 1",
        )
        .bind(blog_id)
        .bind(page_order)
        .fetch_optional(&self.pool)
        .await?;

        let next = sqlx::query_as::<_, PageRef>(
            "SELECT id, title, slug, page_order FROM blog_pages \
             WHERE blog_id = ? AND page_order > ? ORDER BY page_order ASC LIMIT 1",
        )
        .bind(blog_id)
        .bind(page_order)
        .fetch_optional(&self.pool)
        .await?;

        Ok(PageNav { previous, next })
    }

    async fn adjacent_posts(&self, date: &str) -> StoreResult<PostNav> {
        let previous = sqlx::query_as::<_, PostRef>(
            "SELECT id, title, slug, date FROM blogs \
             WHERE status = 'published' AND date < ? ORDER BY date DESC LIMIT 1",
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        let next = sqlx::query_as::<_, PostRef>(
            "SELECT id, title, slug, date FROM blogs \
             WHERE status = 'published' AND date > ? ORDER BY date ASC LIMIT 1",
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(PostNav { previous, next })
    }

    async fn content_hash(&self, slug: &str) -> StoreResult<Option<String>> {
        let hash: Option<Option<String>> =
            sqlx::query_scalar("SELECT content_hash FROM blogs WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash.flatten())
    }

    async fn upsert_post(&self, post: &PostUpsert) -> StoreResult<Post> {
        let now = Utc::now().to_rfc3339();
        let tags_json = serde_json::to_string(&post.tags).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            r#"
            INSERT INTO blogs (
                slug, title, excerpt, content, date, read_time, tags, featured,
                status, is_multipage, page_count, cover_light, cover_dark,
                cover_y, cover_visible, cover_size, github_folder_name,
                content_hash, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(slug) DO UPDATE SET
                title = excluded.title,
                excerpt = excluded.excerpt,
                content = excluded.content,
                date = excluded.date,
                read_time = excluded.read_time,
                tags = excluded.tags,
                featured = excluded.featured,
                status = excluded.status,
                is_multipage = excluded.is_multipage,
                page_count = excluded.page_count,
                cover_light = excluded.cover_light,
                cover_dark = excluded.cover_dark,
                cover_y = excluded.cover_y,
                cover_visible = excluded.cover_visible,
                cover_size = excluded.cover_size,
                github_folder_name = excluded.github_folder_name,
                content_hash = excluded.content_hash,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&post.slug)
        .bind(&post.title)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(&post.date)
        .bind(&post.read_time)
        .bind(&tags_json)
        .bind(post.featured)
        .bind(post.status)
        .bind(post.is_multipage)
        .bind(post.page_count)
        .bind(&post.cover_light)
        .bind(&post.cover_dark)
        .bind(post.cover_y)
        .bind(post.cover_visible)
        .bind(&post.cover_size)
        .bind(&post.github_folder_name)
        .bind(&post.content_hash)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        // Refetch strictly by slug: an all-digit slug must not be mistaken
        // for an id by the lookup resolver.
        self.post_by_slug(&post.slug)
            .await?
            .ok_or(StoreError::NotFound("post"))
    }

    async fn upsert_page(&self, page: &PageUpsert) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO blog_pages (blog_id, slug, title, content, page_order, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(blog_id, slug) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                page_order = excluded.page_order,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(page.blog_id)
        .bind(&page.slug)
        .bind(&page.title)
        .bind(&page.content)
        .bind(page.page_order)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_post(&self, post: &PostUpsert) -> StoreResult<Post> {
        let now = Utc::now().to_rfc3339();
        let tags_json = serde_json::to_string(&post.tags).unwrap_or_else(|_| "[]".to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO blogs (
                slug, title, excerpt, content, date, read_time, tags, featured,
                status, is_multipage, page_count, cover_light, cover_dark,
                cover_y, cover_visible, cover_size, github_folder_name,
                content_hash, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.slug)
        .bind(&post.title)
        .bind(&post.excerpt)
        .bind(&post.content)
        .bind(&post.date)
        .bind(&post.read_time)
        .bind(&tags_json)
        .bind(post.featured)
        .bind(post.status)
        .bind(post.is_multipage)
        .bind(post.page_count)
        .bind(&post.cover_light)
        .bind(&post.cover_dark)
        .bind(post.cover_y)
        .bind(post.cover_visible)
        .bind(&post.cover_size)
        .bind(&post.github_folder_name)
        .bind(&post.content_hash)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| tag_unique(e, ConflictKind::PostSlug))?;

        self.post_by_id(result.last_insert_rowid())
            .await?
            .ok_or(StoreError::NotFound("post"))
    }

    async fn update_post(&self, id: i64, patch: &PostPatch) -> StoreResult<Post> {
        let existing = self
            .post_by_id(id)
            .await?
            .ok_or(StoreError::NotFound("post"))?;

        // Merge: absent fields keep their stored value. A new title re-derives
        // the slug; new content re-derives the read time.
        let title = patch.title.clone().unwrap_or(existing.title);
        let slug = if patch.title.is_some() {
            slugify(&title)
        } else {
            existing.slug
        };
        let content = patch.content.clone().or(existing.content);
        let read_time = match &patch.content {
            Some(body) => estimate_read_time(body),
            None => existing.read_time,
        };
        let tags = patch.tags.clone().unwrap_or(existing.tags);
        let tags_json = serde_json::to_string(&tags).unwrap_or_else(|_| "[]".to_string());
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            UPDATE blogs SET
                slug = ?, title = ?, excerpt = ?, content = ?, date = ?,
                read_time = ?, tags = ?, featured = ?, status = ?,
                cover_light = ?, cover_dark = ?, cover_y = ?, cover_visible = ?,
                cover_size = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&slug)
        .bind(&title)
        .bind(patch.excerpt.clone().unwrap_or(existing.excerpt))
        .bind(&content)
        .bind(patch.date.clone().unwrap_or(existing.date))
        .bind(&read_time)
        .bind(&tags_json)
        .bind(patch.featured.unwrap_or(existing.featured))
        .bind(patch.status.unwrap_or(existing.status))
        .bind(patch.cover_light.clone().or(existing.cover_light))
        .bind(patch.cover_dark.clone().or(existing.cover_dark))
        .bind(patch.cover_y.unwrap_or(existing.cover_y))
        .bind(patch.cover_visible.unwrap_or(existing.cover_visible))
        .bind(patch.cover_size.clone().unwrap_or(existing.cover_size))
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| tag_unique(e, ConflictKind::PostSlug))?;

        self.post_by_id(id).await?.ok_or(StoreError::NotFound("post"))
    }

    async fn delete_post(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM blogs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("post"));
        }
        Ok(())
    }

    async fn record_image(&self, image: &NewImage) -> StoreResult<ImageRecord> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO images (filename, original_name, path, size, mime_type, uploaded_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&image.filename)
        .bind(&image.original_name)
        .bind(&image.path)
        .bind(image.size)
        .bind(&image.mime_type)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let record = sqlx::query_as::<_, ImageRecord>("SELECT * FROM images WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.pool)
            .await?;
        Ok(record)
    }
}
