use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Shared secret compared against the `X-API-Key` header on admin routes.
    #[serde(default)]
    pub api_key: String,
    /// Allowed CORS origins. Empty means allow any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    /// `owner/repo` whose raw content hosts post assets. Applied to every
    /// post; there is deliberately no per-post override.
    #[serde(default)]
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repo: String::new(),
            branch: default_branch(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Directory containing one subfolder per post.
    #[serde(default = "default_blogs_root")]
    pub root: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: default_blogs_root(),
        }
    }
}

fn default_blogs_root() -> PathBuf {
    PathBuf::from("blogs")
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadsConfig {
    #[serde(default = "default_uploads_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_uploads_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Environment overrides, for CI and secrets kept out of the config file.
    if let Ok(key) = std::env::var("INKPRESS_API_KEY") {
        config.server.api_key = key;
    }
    if let Ok(repo) = std::env::var("INKPRESS_GITHUB_REPO") {
        config.github.repo = repo;
    }

    if config.server.bind.is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    if config.github.repo.is_empty() {
        // Asset rewriting degrades to a no-op without a repo; allowed.
    } else {
        match config.github.repo.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => {}
            _ => anyhow::bail!(
                "github.repo must be of the form 'owner/repo', got '{}'",
                config.github.repo
            ),
        }
    }

    if config.uploads.max_upload_bytes == 0 {
        anyhow::bail!("uploads.max_upload_bytes must be > 0");
    }

    Ok(config)
}
