//! Seed-data SQL generator.
//!
//! Emits a `.sql` file instead of writing the database directly, so the
//! output can be inspected and applied to any environment. Output is fully
//! deterministic for a given option set.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct SeedOptions {
    pub count: usize,
    /// Percentage of posts generated as multi-page (0-100).
    pub multipage_percent: u8,
    /// Emit DELETE statements before the inserts.
    pub clean: bool,
}

const SAMPLE_TITLES: &[&str] = &[
    "Notes on Analog Synthesis",
    "A Field Guide to Rust Lifetimes",
    "What I Learned Building a Plotter",
    "The Engineer's Sketchbook",
    "On Reading Old Papers",
    "Debugging by Candlelight",
    "Maps, Territories, and Schemas",
    "A Summer of Slow Software",
    "The Unreasonable Depth of Fonts",
    "Letters to a Young Programmer",
];

const SAMPLE_TAGS: &[&[&str]] = &[
    &["engineering", "notes"],
    &["rust", "systems"],
    &["hardware", "art"],
    &["essays"],
    &["history", "papers"],
];

const PAGE_TITLES: &[&str] = &["Introduction", "The Middle Part", "Closing Thoughts"];

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

/// Evenly spreads `percent` of indices across the range.
fn is_multipage(index: usize, percent: u8) -> bool {
    let p = percent.min(100) as usize;
    ((index + 1) * p) / 100 > (index * p) / 100
}

pub fn generate_seed_sql(opts: &SeedOptions) -> String {
    let mut sql = String::new();
    writeln!(sql, "-- generated by `inkpress seed`").unwrap();
    writeln!(
        sql,
        "-- posts: {}, multipage: {}%",
        opts.count, opts.multipage_percent
    )
    .unwrap();
    writeln!(sql).unwrap();

    if opts.clean {
        writeln!(sql, "DELETE FROM blog_pages;").unwrap();
        writeln!(sql, "DELETE FROM blogs;").unwrap();
        writeln!(sql).unwrap();
    }

    let base_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    for i in 0..opts.count {
        let title = format!(
            "{} #{}",
            SAMPLE_TITLES[i % SAMPLE_TITLES.len()],
            i / SAMPLE_TITLES.len() + 1
        );
        let slug = crate::markdown::slugify(&title);
        let tags = SAMPLE_TAGS[i % SAMPLE_TAGS.len()];
        let tags_json = serde_json::to_string(tags).unwrap();
        let date = (base_date + Duration::days((i * 9) as i64))
            .format("%Y-%m-%d")
            .to_string();
        let multipage = is_multipage(i, opts.multipage_percent);
        let page_count = if multipage { PAGE_TITLES.len() } else { 1 };
        let content = if multipage {
            "NULL".to_string()
        } else {
            format!(
                "'# {}\n\nSample body for seed post {}.'",
                escape(&title),
                i
            )
        };

        writeln!(
            sql,
            "INSERT INTO blogs (slug, title, excerpt, content, date, read_time, tags, featured, \
             status, is_multipage, page_count, cover_y, cover_visible, cover_size, created_at, updated_at) \
             VALUES ('{slug}', '{title}', '{excerpt}', {content}, '{date}', '1 min read', '{tags}', {featured}, \
             'published', {multipage}, {page_count}, 0, 1, 'hero', datetime('now'), datetime('now'));",
            slug = escape(&slug),
            title = escape(&title),
            excerpt = escape(&format!("Seed excerpt for {title}.")),
            content = content,
            date = date,
            tags = escape(&tags_json),
            featured = (i % 7 == 0) as u8,
            multipage = multipage as u8,
            page_count = page_count,
        )
        .unwrap();

        if multipage {
            for (order, page_title) in PAGE_TITLES.iter().enumerate() {
                writeln!(
                    sql,
                    "INSERT INTO blog_pages (blog_id, slug, title, content, page_order, created_at, updated_at) \
                     VALUES ((SELECT id FROM blogs WHERE slug = '{slug}'), '{page_slug}', '{page_title}', \
                     '{body}', {order}, datetime('now'), datetime('now'));",
                    slug = escape(&slug),
                    page_slug = crate::markdown::slugify(page_title),
                    page_title = escape(page_title),
                    body = escape(&format!("Page {order} of {title}.")),
                    order = order,
                )
                .unwrap();
            }
        }
    }

    sql
}

pub fn write_seed_file(path: &Path, opts: &SeedOptions) -> Result<()> {
    let sql = generate_seed_sql(opts);
    std::fs::write(path, &sql)
        .with_context(|| format!("failed to write seed file: {}", path.display()))?;

    let posts = opts.count;
    let pages: usize = (0..opts.count)
        .filter(|i| is_multipage(*i, opts.multipage_percent))
        .count()
        * PAGE_TITLES.len();
    println!("seed {}", path.display());
    println!("  posts: {}", posts);
    println!("  pages: {}", pages);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_requested_number_of_posts() {
        let sql = generate_seed_sql(&SeedOptions {
            count: 10,
            multipage_percent: 0,
            clean: false,
        });
        assert_eq!(sql.matches("INSERT INTO blogs").count(), 10);
        assert_eq!(sql.matches("INSERT INTO blog_pages").count(), 0);
        assert!(!sql.contains("DELETE"));
    }

    #[test]
    fn multipage_percentage_is_honored() {
        let sql = generate_seed_sql(&SeedOptions {
            count: 10,
            multipage_percent: 40,
            clean: false,
        });
        // 40% of 10 posts, 3 pages each
        assert_eq!(sql.matches("INSERT INTO blog_pages").count(), 12);
    }

    #[test]
    fn clean_emits_delete_preamble() {
        let sql = generate_seed_sql(&SeedOptions {
            count: 1,
            multipage_percent: 0,
            clean: true,
        });
        let blogs_delete = sql.find("DELETE FROM blogs;").unwrap();
        let pages_delete = sql.find("DELETE FROM blog_pages;").unwrap();
        let first_insert = sql.find("INSERT INTO").unwrap();
        assert!(pages_delete < blogs_delete);
        assert!(blogs_delete < first_insert);
    }

    #[test]
    fn escapes_single_quotes() {
        let sql = generate_seed_sql(&SeedOptions {
            count: 10,
            multipage_percent: 0,
            clean: false,
        });
        // "The Engineer's Sketchbook" must come out doubled
        assert!(sql.contains("Engineer''s"));
    }

    #[test]
    fn deterministic_output() {
        let opts = SeedOptions {
            count: 5,
            multipage_percent: 50,
            clean: true,
        };
        assert_eq!(generate_seed_sql(&opts), generate_seed_sql(&opts));
    }
}
