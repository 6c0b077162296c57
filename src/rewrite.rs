//! Read-time rewriting of repository-local asset paths into absolute
//! raw.githubusercontent.com URLs.
//!
//! Post bodies are stored with their original relative references
//! (`.gitbook/assets/...`, `./...`) and rewritten on every fetch. The GitHub
//! folder name is the *original* source folder, not the slug — GitHub paths
//! are case- and space-sensitive, so both the folder and each filename are
//! percent-encoded independently.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Where a post's assets live: `owner/repo` plus the branch and the
/// case-sensitive source folder inside it.
#[derive(Debug, Clone, Copy)]
pub struct AssetSource<'a> {
    pub repo: &'a str,
    pub branch: &'a str,
    pub folder: &'a str,
}

// Matches encodeURIComponent: everything but alphanumerics and -_.!~*'()
// gets escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

fn encode(component: &str) -> String {
    utf8_percent_encode(component, COMPONENT).to_string()
}

static MD_IMG_GITBOOK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(\.gitbook/assets/([^)]+)\)").unwrap());
static HTML_IMG_GITBOOK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<img[^>]*src=["'])\.gitbook/assets/([^"']+)(["'][^>]*>)"#).unwrap()
});
static MD_LINK_GITBOOK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(\.gitbook/assets/([^)]+)\)").unwrap());
static MD_IMG_RELATIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(\./([^)]+)\)").unwrap());

/// Rewrites every repository-local asset reference in `content` to an
/// absolute raw-content URL.
///
/// An empty repo or folder returns the content unchanged — a silent no-op
/// kept from the original behavior so a misconfigured deployment degrades to
/// broken-but-served links instead of errors.
pub fn rewrite_asset_urls(content: &str, src: &AssetSource) -> String {
    if src.repo.is_empty() || src.folder.is_empty() {
        return content.to_string();
    }

    let base = format!(
        "https://raw.githubusercontent.com/{}/{}/{}",
        src.repo,
        src.branch,
        encode(src.folder)
    );

    // Image syntax first, so the plain-link pass only sees genuine links.
    let content = MD_IMG_GITBOOK.replace_all(content, |caps: &Captures| {
        format!(
            "![{}]({}/.gitbook/assets/{})",
            &caps[1],
            base,
            encode(caps[2].trim())
        )
    });
    let content = HTML_IMG_GITBOOK.replace_all(&content, |caps: &Captures| {
        format!(
            "{}{}/.gitbook/assets/{}{}",
            &caps[1],
            base,
            encode(caps[2].trim()),
            &caps[3]
        )
    });
    let content = MD_LINK_GITBOOK.replace_all(&content, |caps: &Captures| {
        format!(
            "[{}]({}/.gitbook/assets/{})",
            &caps[1],
            base,
            encode(caps[2].trim())
        )
    });
    let content = MD_IMG_RELATIVE.replace_all(&content, |caps: &Captures| {
        format!("![{}]({}/{})", &caps[1], base, encode(caps[2].trim()))
    });

    content.into_owned()
}

/// Rewrites a single cover-image path with the same base-URL logic,
/// short-circuiting when the value is already absolute.
pub fn rewrite_cover_url(value: &str, src: &AssetSource) -> String {
    if value.is_empty()
        || value.starts_with("http://")
        || value.starts_with("https://")
        || src.repo.is_empty()
        || src.folder.is_empty()
    {
        return value.to_string();
    }

    let relative = value.strip_prefix("./").unwrap_or(value);
    let encoded_path: Vec<String> = relative.split('/').map(encode).collect();

    format!(
        "https://raw.githubusercontent.com/{}/{}/{}/{}",
        src.repo,
        src.branch,
        encode(src.folder),
        encoded_path.join("/")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src<'a>() -> AssetSource<'a> {
        AssetSource {
            repo: "knowOne08/blogs",
            branch: "main",
            folder: "My Post Folder",
        }
    }

    #[test]
    fn rewrites_markdown_gitbook_image() {
        let out = rewrite_asset_urls("![diagram](.gitbook/assets/flow chart.png)", &src());
        assert_eq!(
            out,
            "![diagram](https://raw.githubusercontent.com/knowOne08/blogs/main/My%20Post%20Folder/.gitbook/assets/flow%20chart.png)"
        );
    }

    #[test]
    fn rewrites_html_img_tag() {
        let out = rewrite_asset_urls(
            r#"<img alt="x" src=".gitbook/assets/pic.png" width="40">"#,
            &src(),
        );
        assert!(out.contains(
            r#"src="https://raw.githubusercontent.com/knowOne08/blogs/main/My%20Post%20Folder/.gitbook/assets/pic.png""#
        ));
        assert!(out.ends_with(r#" width="40">"#));
    }

    #[test]
    fn rewrites_gitbook_link_and_bare_relative_image() {
        let input = "[download](.gitbook/assets/report.pdf)\n![photo](./photo.jpg)";
        let out = rewrite_asset_urls(input, &src());
        assert!(out.contains("[download](https://raw.githubusercontent.com/knowOne08/blogs/main/My%20Post%20Folder/.gitbook/assets/report.pdf)"));
        assert!(out.contains("![photo](https://raw.githubusercontent.com/knowOne08/blogs/main/My%20Post%20Folder/photo.jpg)"));
    }

    #[test]
    fn rewrite_is_total_over_references() {
        let input = "![a](.gitbook/assets/1.png) text ![b](./2.png)\n\
                     <img src=\".gitbook/assets/3.png\"> [d](.gitbook/assets/4.zip)";
        let out = rewrite_asset_urls(input, &src());
        assert_eq!(out.matches("https://raw.githubusercontent.com/").count(), 4);
        assert!(!out.contains("](.gitbook/assets/"));
        assert!(!out.contains("](./"));
        assert!(!out.contains("src=\".gitbook"));
    }

    #[test]
    fn missing_repo_or_folder_is_a_no_op() {
        let input = "![a](.gitbook/assets/1.png)";
        let no_repo = AssetSource { repo: "", branch: "main", folder: "f" };
        let no_folder = AssetSource { repo: "o/r", branch: "main", folder: "" };
        assert_eq!(rewrite_asset_urls(input, &no_repo), input);
        assert_eq!(rewrite_asset_urls(input, &no_folder), input);
    }

    #[test]
    fn leaves_absolute_urls_alone() {
        let input = "![a](https://example.test/img.png)";
        assert_eq!(rewrite_asset_urls(input, &src()), input);
    }

    #[test]
    fn cover_url_passthrough_and_rewrite() {
        assert_eq!(
            rewrite_cover_url("https://cdn.test/c.png", &src()),
            "https://cdn.test/c.png"
        );
        assert_eq!(
            rewrite_cover_url(".gitbook/assets/cover image.png", &src()),
            "https://raw.githubusercontent.com/knowOne08/blogs/main/My%20Post%20Folder/.gitbook/assets/cover%20image.png"
        );
        assert_eq!(
            rewrite_cover_url("./hero.png", &src()),
            "https://raw.githubusercontent.com/knowOne08/blogs/main/My%20Post%20Folder/hero.png"
        );
    }
}
