use anyhow::Result;
use sqlx::SqlitePool;

/// Creates the schema. Every statement is idempotent, so running this on an
/// existing database is safe.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per logical post. `content` is NULL for multi-page posts,
    // whose chapter bodies live in blog_pages.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blogs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            excerpt TEXT NOT NULL DEFAULT '',
            content TEXT,
            date TEXT NOT NULL,
            read_time TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',
            featured INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'published',
            is_multipage INTEGER NOT NULL DEFAULT 0,
            page_count INTEGER NOT NULL DEFAULT 1,
            cover_light TEXT,
            cover_dark TEXT,
            cover_y INTEGER NOT NULL DEFAULT 0,
            cover_visible INTEGER NOT NULL DEFAULT 1,
            cover_size TEXT NOT NULL DEFAULT 'hero',
            github_folder_name TEXT,
            content_hash TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per chapter of a multi-page post. (blog_id, slug) is the
    // upsert conflict key.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blog_pages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            blog_id INTEGER NOT NULL,
            slug TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            page_order INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(blog_id, slug),
            FOREIGN KEY (blog_id) REFERENCES blogs(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only log of uploaded binary assets.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL,
            original_name TEXT NOT NULL,
            path TEXT NOT NULL,
            size INTEGER,
            mime_type TEXT,
            uploaded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_blogs_status_date ON blogs(status, date DESC)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_blog_pages_order ON blog_pages(blog_id, page_order)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
