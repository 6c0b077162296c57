//! Core data models for posts, pages, and uploaded images.
//!
//! Rows come out of SQLite with `tags` as JSON-encoded text; the API types
//! expose tags as a real array. The conversion happens exactly once, at the
//! `PostRow` → `Post` boundary.

use serde::{Deserialize, Serialize};

/// Publication state of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PostStatus {
    Published,
    Draft,
    Archived,
}

impl PostStatus {
    /// Lenient parse for front-matter values; anything unrecognized is
    /// treated as published, matching the sync scripts' default.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        match value {
            Some("draft") => PostStatus::Draft,
            Some("archived") => PostStatus::Archived,
            _ => PostStatus::Published,
        }
    }
}

/// Raw `blogs` row as stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRow {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub content: Option<String>,
    pub date: String,
    pub read_time: String,
    pub tags: String,
    pub featured: bool,
    pub status: PostStatus,
    pub is_multipage: bool,
    pub page_count: i64,
    pub cover_light: Option<String>,
    pub cover_dark: Option<String>,
    pub cover_y: i64,
    pub cover_visible: bool,
    pub cover_size: String,
    pub github_folder_name: Option<String>,
    pub content_hash: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A post as exposed over the API, tags decoded to an array.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub content: Option<String>,
    pub date: String,
    pub read_time: String,
    pub tags: Vec<String>,
    pub featured: bool,
    pub status: PostStatus,
    pub is_multipage: bool,
    pub page_count: i64,
    pub cover_light: Option<String>,
    pub cover_dark: Option<String>,
    pub cover_y: i64,
    pub cover_visible: bool,
    pub cover_size: String,
    pub github_folder_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        let tags = serde_json::from_str(&row.tags).unwrap_or_default();
        Post {
            id: row.id,
            slug: row.slug,
            title: row.title,
            excerpt: row.excerpt,
            content: row.content,
            date: row.date,
            read_time: row.read_time,
            tags,
            featured: row.featured,
            status: row.status,
            is_multipage: row.is_multipage,
            page_count: row.page_count,
            cover_light: row.cover_light,
            cover_dark: row.cover_dark,
            cover_y: row.cover_y,
            cover_visible: row.cover_visible,
            cover_size: row.cover_size,
            github_folder_name: row.github_folder_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A chapter of a multi-page post.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Page {
    pub id: i64,
    pub blog_id: i64,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub page_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Lightweight page reference used in tables of contents and navigation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PageRef {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub page_order: i64,
}

/// Lightweight post reference used in post-to-post navigation.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PostRef {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub date: String,
}

/// Previous/next chapter within one post, by `page_order` adjacency.
#[derive(Debug, Clone, Serialize)]
pub struct PageNav {
    pub previous: Option<PageRef>,
    pub next: Option<PageRef>,
}

/// Previous/next published post, by `date`.
#[derive(Debug, Clone, Serialize)]
pub struct PostNav {
    pub previous: Option<PostRef>,
    pub next: Option<PostRef>,
}

/// Normalized post fields flowing into the store's write path.
#[derive(Debug, Clone)]
pub struct PostUpsert {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub content: Option<String>,
    pub date: String,
    pub read_time: String,
    pub tags: Vec<String>,
    pub featured: bool,
    pub status: PostStatus,
    pub is_multipage: bool,
    pub page_count: i64,
    pub cover_light: Option<String>,
    pub cover_dark: Option<String>,
    pub cover_y: i64,
    pub cover_visible: bool,
    pub cover_size: String,
    pub github_folder_name: Option<String>,
    pub content_hash: Option<String>,
}

/// Normalized page fields flowing into the store's write path.
#[derive(Debug, Clone)]
pub struct PageUpsert {
    pub blog_id: i64,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub page_order: i64,
}

/// Partial update applied by the admin PUT endpoint. `None` leaves the
/// existing value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub date: Option<String>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
    pub status: Option<PostStatus>,
    pub cover_light: Option<String>,
    pub cover_dark: Option<String>,
    pub cover_y: Option<i64>,
    pub cover_visible: Option<bool>,
    pub cover_size: Option<String>,
}

/// Metadata recorded for an uploaded image.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub filename: String,
    pub original_name: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
}

/// An `images` row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ImageRecord {
    pub id: i64,
    pub filename: String,
    pub original_name: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
    pub uploaded_at: String,
}
