//! Front-matter parsing and metadata normalization for Markdown posts.
//!
//! Everything here is a pure string transform: slug generation, reading-time
//! estimation, excerpt extraction, and the assembly of post metadata from a
//! parsed front-matter block plus the document body. The sync pipeline and
//! the admin route handlers both derive missing fields through this module
//! so the two write paths agree on normalization.

use gray_matter::{engine::YAML, Matter};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use crate::models::PostStatus;

/// Typed front-matter attributes. Every field is optional; a document with
/// no front-matter block at all normalizes the same as one with an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub description: Option<String>,
    pub excerpt: Option<String>,
    pub tags: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
    pub featured: Option<bool>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub cover: Option<CoverAttr>,
    #[serde(rename = "coverY")]
    pub cover_y: Option<i64>,
    pub layout: Option<LayoutAttr>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoverAttr {
    pub light: Option<String>,
    pub dark: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LayoutAttr {
    pub cover: Option<CoverLayoutAttr>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoverLayoutAttr {
    pub visible: Option<bool>,
    pub size: Option<String>,
}

/// Normalized metadata for one post, ready for the store.
#[derive(Debug, Clone)]
pub struct PostMeta {
    pub title: String,
    pub excerpt: String,
    pub tags: Vec<String>,
    pub featured: bool,
    pub date: String,
    pub read_time: String,
    pub status: PostStatus,
    pub cover_light: Option<String>,
    pub cover_dark: Option<String>,
    pub cover_y: i64,
    pub cover_visible: bool,
    pub cover_size: String,
}

/// Splits a Markdown document into front-matter attributes and body.
/// Malformed front matter degrades to defaults with the raw text as body
/// rather than failing the document.
pub fn parse_document(raw: &str) -> (FrontMatter, String) {
    let matter = Matter::<YAML>::new();
    match matter.parse::<FrontMatter>(raw) {
        Ok(parsed) => (parsed.data.unwrap_or_default(), parsed.content),
        Err(_) => (FrontMatter::default(), raw.to_string()),
    }
}

/// Lowercases, strips everything outside `[a-z0-9 -]`, collapses whitespace
/// and hyphen runs to single hyphens, and trims hyphens at both ends.
///
/// Deterministic and pure; uniqueness is enforced only by the store's slug
/// constraint at write time.
pub fn slugify(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_hyphen = false;
    for c in text.to_lowercase().chars() {
        match c {
            'a'..='z' | '0'..='9' => {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(c);
            }
            ' ' | '-' => pending_hyphen = true,
            _ => {}
        }
    }
    out
}

/// `ceil(words / 200)` minutes, never below one, formatted for display.
pub fn estimate_read_time(body: &str) -> String {
    let words = body.split_whitespace().count();
    let minutes = words.div_ceil(200).max(1);
    format!("{} min read", minutes)
}

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#+\s+.+$").unwrap());
static H1_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").unwrap());
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static QUOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^>\s*").unwrap());

/// Title from front matter, else the first `#` heading, else the folder
/// name with hyphens spaced out.
pub fn extract_title(fm: &FrontMatter, body: &str, folder: &str) -> String {
    if let Some(title) = fm.title.as_deref() {
        if !title.trim().is_empty() {
            return title.trim().to_string();
        }
    }
    if let Some(caps) = H1_RE.captures(body) {
        return caps[1].trim().to_string();
    }
    folder.replace('-', " ")
}

/// Excerpt policy: explicit `description`/`excerpt` attribute verbatim,
/// else the first paragraph after stripping headings, links, emphasis and
/// blockquote markers, truncated to 200 chars plus `...`.
///
/// A body with no paragraph left yields an empty excerpt; that is not an
/// error.
pub fn extract_excerpt(fm: &FrontMatter, body: &str) -> String {
    for attr in [&fm.description, &fm.excerpt] {
        if let Some(text) = attr.as_deref() {
            if !text.trim().is_empty() {
                return text.trim().to_string();
            }
        }
    }

    let without_headings = HEADING_RE.replace_all(body, "");
    let trimmed = without_headings.trim();
    let first_paragraph = trimmed.split("\n\n").next().unwrap_or("");
    if first_paragraph.is_empty() {
        return String::new();
    }

    let text = LINK_RE.replace_all(first_paragraph, "$1");
    let text = text.replace(['*', '_', '`'], "");
    let text = QUOTE_RE.replace_all(&text, "");
    let text = text.trim();

    if text.chars().count() > 200 {
        let truncated: String = text.chars().take(200).collect();
        format!("{}...", truncated.trim_end())
    } else {
        text.to_string()
    }
}

/// Assembles the full normalized metadata for a post folder, mirroring the
/// defaulting rules shared by both sync variants: tags fall back to
/// categories, the date defaults to today, and the cover is visible at
/// "hero" size unless the front matter says otherwise.
pub fn extract_metadata(fm: &FrontMatter, body: &str, folder: &str) -> PostMeta {
    let cover = fm.cover.clone().unwrap_or_default();
    let cover_layout = fm
        .layout
        .as_ref()
        .and_then(|l| l.cover.clone())
        .unwrap_or_default();

    PostMeta {
        title: extract_title(fm, body, folder),
        excerpt: extract_excerpt(fm, body),
        tags: fm
            .tags
            .clone()
            .or_else(|| fm.categories.clone())
            .unwrap_or_default(),
        featured: fm.featured.unwrap_or(false),
        date: fm
            .date
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string()),
        read_time: estimate_read_time(body),
        status: PostStatus::parse_or_default(fm.status.as_deref()),
        cover_light: cover.light,
        cover_dark: cover.dark,
        cover_y: fm.cover_y.unwrap_or(0),
        cover_visible: cover_layout.visible.unwrap_or(true),
        cover_size: cover_layout.size.unwrap_or_else(|| "hero".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("My Post"), "my-post");
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("Rust  &  You"), "rust-you");
    }

    #[test]
    fn slugify_collapses_and_trims_hyphens() {
        assert_eq!(slugify("--a---b--"), "a-b");
        assert_eq!(slugify("  spaced  out  "), "spaced-out");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slugify_output_charset() {
        let slug = slugify("Ünïcode Tîtle — with (parens) & 100% effort");
        assert!(slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        assert!(!slug.starts_with('-') && !slug.ends_with('-'));
        assert!(!slug.contains("--"));
    }

    #[test]
    fn read_time_rounds_up() {
        let exactly_200: String = vec!["word"; 200].join(" ");
        assert_eq!(estimate_read_time(&exactly_200), "1 min read");
        let two_hundred_one: String = vec!["word"; 201].join(" ");
        assert_eq!(estimate_read_time(&two_hundred_one), "2 min read");
        assert_eq!(estimate_read_time(""), "1 min read");
    }

    #[test]
    fn read_time_monotonic() {
        let mut last = 0;
        for n in [1usize, 150, 400, 900, 5000] {
            let body: String = vec!["w"; n].join(" ");
            let text = estimate_read_time(&body);
            let minutes: usize = text.split(' ').next().unwrap().parse().unwrap();
            assert!(minutes >= last);
            last = minutes;
        }
    }

    #[test]
    fn excerpt_prefers_description_attribute() {
        let fm = FrontMatter {
            description: Some("A hand-written summary.".to_string()),
            ..Default::default()
        };
        assert_eq!(
            extract_excerpt(&fm, "# Title\n\nBody text."),
            "A hand-written summary."
        );
    }

    #[test]
    fn excerpt_falls_back_to_first_paragraph() {
        let body = "# Heading\n\nThis has a [link](https://x.test) and *emphasis*.\n\nSecond.";
        let excerpt = extract_excerpt(&FrontMatter::default(), body);
        assert_eq!(excerpt, "This has a link and emphasis.");
    }

    #[test]
    fn excerpt_strips_blockquotes() {
        let body = "> quoted thought\n> continued";
        let excerpt = extract_excerpt(&FrontMatter::default(), body);
        assert_eq!(excerpt, "quoted thought\ncontinued");
    }

    #[test]
    fn excerpt_bounded_at_203_chars() {
        let long = "x".repeat(1000);
        let excerpt = extract_excerpt(&FrontMatter::default(), &long);
        assert!(excerpt.chars().count() <= 203);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn excerpt_empty_when_only_headings() {
        let excerpt = extract_excerpt(&FrontMatter::default(), "# One\n\n## Two\n");
        assert_eq!(excerpt, "");
    }

    #[test]
    fn title_fallback_chain() {
        let fm = FrontMatter::default();
        assert_eq!(extract_title(&fm, "# From Heading\n\nbody", "my-post"), "From Heading");
        assert_eq!(extract_title(&fm, "no heading here", "my-post"), "my post");
        let named = FrontMatter {
            title: Some("Explicit".to_string()),
            ..Default::default()
        };
        assert_eq!(extract_title(&named, "# Ignored", "my-post"), "Explicit");
    }

    #[test]
    fn parse_document_splits_front_matter() {
        let raw = "---\ntitle: My Post\ntags: [a, b]\n---\n# My Post\n\nHello.";
        let (fm, body) = parse_document(raw);
        assert_eq!(fm.title.as_deref(), Some("My Post"));
        assert_eq!(fm.tags.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        assert!(body.contains("Hello."));
        assert!(!body.contains("---"));
    }

    #[test]
    fn parse_document_without_front_matter() {
        let (fm, body) = parse_document("just a body");
        assert!(fm.title.is_none());
        assert_eq!(body, "just a body");
    }

    #[test]
    fn metadata_defaults() {
        let (fm, body) = parse_document("# T\n\nSome text.");
        let meta = extract_metadata(&fm, &body, "fallback-folder");
        assert_eq!(meta.status, PostStatus::Published);
        assert!(!meta.featured);
        assert!(meta.cover_visible);
        assert_eq!(meta.cover_size, "hero");
        assert_eq!(meta.cover_y, 0);
        assert!(meta.tags.is_empty());
    }

    #[test]
    fn metadata_tags_fall_back_to_categories() {
        let fm = FrontMatter {
            categories: Some(vec!["rust".to_string()]),
            ..Default::default()
        };
        let meta = extract_metadata(&fm, "body", "f");
        assert_eq!(meta.tags, vec!["rust".to_string()]);
    }
}
