//! JSON HTTP API over the blog store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/blogs` | Published posts, listing-sized covers |
//! | `GET`  | `/api/blogs/{id}` | One post by numeric id or slug |
//! | `GET`  | `/api/blogs/{id}/pages` | Post plus its table of contents |
//! | `GET`  | `/api/blogs/{id}/page/{page_slug}` | One chapter plus prev/next navigation |
//! | `GET`  | `/api/blogs/{id}/content` | Main-page content (and TOC when multi-page) |
//! | `GET`  | `/api/blogs/{id}/navigation` | Previous/next post by date |
//! | `POST` | `/api/admin/blogs` | Create a post (API key) |
//! | `PUT`  | `/api/admin/blogs/{id}` | Update a post (API key) |
//! | `DELETE` | `/api/admin/blogs/{id}` | Delete a post (API key) |
//! | `POST` | `/api/admin/upload-image` | Multipart image upload (API key) |
//!
//! Asset references inside content and the cover fields are rewritten to
//! absolute GitHub raw URLs on every read; nothing rewritten is persisted.
//!
//! # Error contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "title and content are required" } }
//! ```
//!
//! Codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `conflict` (409), `internal` (500).

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::markdown::{estimate_read_time, extract_excerpt, slugify, FrontMatter};
use crate::models::{Page, PageNav, Post, PostPatch, PostStatus, PostUpsert, NewImage};
use crate::rewrite::{rewrite_asset_urls, rewrite_cover_url, AssetSource};
use crate::store::{BlogStore, SqliteStore, StoreError};

/// Shared application state. The store is a trait object so tests and custom
/// binaries can substitute their own backend.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn BlogStore>,
}

/// Connects the SQLite store and serves the API on the configured bind
/// address until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(SqliteStore::new(pool)),
    };

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "API server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the full router; exposed so integration tests can bind their own
/// listener.
pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.server.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .server
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let admin = Router::new()
        .route("/blogs", post(handle_create_post))
        .route(
            "/blogs/{id}",
            axum::routing::put(handle_update_post).delete(handle_delete_post),
        )
        .route("/upload-image", post(handle_upload_image))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ))
        .layer(DefaultBodyLimit::max(state.config.uploads.max_upload_bytes));

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/blogs", get(handle_list_posts))
        .route("/api/blogs/{id}", get(handle_get_post))
        .route("/api/blogs/{id}/pages", get(handle_get_pages))
        .route("/api/blogs/{id}/page/{page_slug}", get(handle_get_page))
        .route("/api/blogs/{id}/content", get(handle_get_content))
        .route("/api/blogs/{id}/navigation", get(handle_get_navigation))
        .nest("/api/admin", admin)
        .nest_service(
            "/uploads",
            ServeDir::new(state.config.uploads.dir.clone()),
        )
        .layer(cors)
        .with_state(state)
}

// ============ Errors ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: "invalid API key".to_string(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => not_found(format!("{what} not found")),
            StoreError::Conflict { kind } => AppError {
                status: StatusCode::CONFLICT,
                code: "conflict",
                message: format!("duplicate {kind}"),
            },
            StoreError::Database(db_err) => {
                // The client gets a generic message; the cause goes to the log.
                tracing::error!(error = %db_err, "store failure");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message: "internal server error".to_string(),
                }
            }
        }
    }
}

// ============ Auth ============

async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let expected = state.config.server.api_key.as_str();
    let provided = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    // An unset key disables the admin surface entirely rather than leaving
    // it open.
    if expected.is_empty() || provided != Some(expected) {
        return Err(unauthorized());
    }
    Ok(next.run(req).await)
}

// ============ Read-side helpers ============

/// Query-string transform parameters understood by the image CDN layer.
struct ImageTransform {
    width: u32,
    height: Option<u32>,
    quality: u32,
}

const LISTING_COVER: ImageTransform = ImageTransform {
    width: 600,
    height: Some(400),
    quality: 75,
};
const FULL_COVER: ImageTransform = ImageTransform {
    width: 1200,
    height: Some(800),
    quality: 85,
};

fn optimized_image_url(url: &str, t: &ImageTransform) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    match t.height {
        Some(h) => format!("{url}{sep}width={}&height={}&quality={}", t.width, h, t.quality),
        None => format!("{url}{sep}width={}&quality={}", t.width, t.quality),
    }
}

fn asset_source<'a>(config: &'a Config, post: &'a Post) -> AssetSource<'a> {
    AssetSource {
        repo: &config.github.repo,
        branch: &config.github.branch,
        folder: post.github_folder_name.as_deref().unwrap_or(&post.slug),
    }
}

/// Rewrites both cover fields in place and applies the size transform.
fn present_covers(post: &mut Post, config: &Config, transform: &ImageTransform) {
    let src = AssetSource {
        repo: &config.github.repo,
        branch: &config.github.branch,
        folder: post.github_folder_name.as_deref().unwrap_or(&post.slug),
    };
    for cover in [&mut post.cover_light, &mut post.cover_dark] {
        if let Some(value) = cover.take() {
            let rewritten = rewrite_cover_url(&value, &src);
            *cover = Some(optimized_image_url(&rewritten, transform));
        }
    }
}

// ============ Public handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_list_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>, AppError> {
    let mut posts = state.store.list_published().await?;
    for post in &mut posts {
        present_covers(post, &state.config, &LISTING_COVER);
    }
    Ok(Json(posts))
}

async fn handle_get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Post>, AppError> {
    let mut post = state
        .store
        .find_post(&id)
        .await?
        .ok_or_else(|| not_found("blog not found"))?;
    present_covers(&mut post, &state.config, &FULL_COVER);
    Ok(Json(post))
}

#[derive(Serialize)]
struct PostWithPages {
    #[serde(flatten)]
    post: Post,
    pages: Vec<crate::models::PageRef>,
}

async fn handle_get_pages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PostWithPages>, AppError> {
    let mut post = state
        .store
        .find_post(&id)
        .await?
        .ok_or_else(|| not_found("blog not found"))?;
    present_covers(&mut post, &state.config, &FULL_COVER);
    let pages = state.store.pages_for(post.id).await?;
    Ok(Json(PostWithPages { post, pages }))
}

#[derive(Serialize)]
struct PageResponse {
    blog: Post,
    page: Page,
    navigation: PageNav,
}

async fn handle_get_page(
    State(state): State<AppState>,
    Path((id, page_slug)): Path<(String, String)>,
) -> Result<Json<PageResponse>, AppError> {
    let mut post = state
        .store
        .find_post(&id)
        .await?
        .ok_or_else(|| not_found("blog not found"))?;

    let mut page = state
        .store
        .find_page(post.id, &page_slug)
        .await?
        .ok_or_else(|| not_found("page not found"))?;

    page.content = rewrite_asset_urls(&page.content, &asset_source(&state.config, &post));
    let navigation = state.store.adjacent_pages(post.id, page.page_order).await?;
    present_covers(&mut post, &state.config, &FULL_COVER);

    Ok(Json(PageResponse {
        blog: post,
        page,
        navigation,
    }))
}

#[derive(Serialize)]
struct ContentResponse {
    #[serde(flatten)]
    post: Post,
    pages: Vec<crate::models::PageRef>,
    navigation: PageNav,
}

async fn handle_get_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContentResponse>, AppError> {
    let mut post = state
        .store
        .find_post(&id)
        .await?
        .ok_or_else(|| not_found("blog not found"))?;

    let main_page = state
        .store
        .page_by_order(post.id, 0)
        .await?
        .ok_or_else(|| not_found("main page not found"))?;

    let rewritten = rewrite_asset_urls(&main_page.content, &asset_source(&state.config, &post));
    post.content = Some(rewritten);

    let (pages, navigation) = if post.is_multipage {
        let pages = state.store.pages_for(post.id).await?;
        let nav = state.store.adjacent_pages(post.id, 0).await?;
        (pages, PageNav { previous: None, next: nav.next })
    } else {
        (Vec::new(), PageNav { previous: None, next: None })
    };

    present_covers(&mut post, &state.config, &FULL_COVER);
    Ok(Json(ContentResponse {
        post,
        pages,
        navigation,
    }))
}

async fn handle_get_navigation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<crate::models::PostNav>, AppError> {
    let post = state
        .store
        .find_post(&id)
        .await?
        .ok_or_else(|| not_found("blog not found"))?;
    let nav = state.store.adjacent_posts(&post.date).await?;
    Ok(Json(nav))
}

// ============ Admin handlers ============

#[derive(Deserialize)]
struct CreatePostBody {
    title: Option<String>,
    content: Option<String>,
    excerpt: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    featured: bool,
    status: Option<PostStatus>,
    date: Option<String>,
    cover_light: Option<String>,
    cover_dark: Option<String>,
}

async fn handle_create_post(
    State(state): State<AppState>,
    Json(body): Json<CreatePostBody>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let title = body.title.unwrap_or_default();
    let content = body.content.unwrap_or_default();
    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(bad_request("title and content are required"));
    }

    let slug = slugify(&title);
    if slug.is_empty() {
        return Err(bad_request("title yields an empty slug"));
    }

    let excerpt = match body.excerpt {
        Some(e) if !e.trim().is_empty() => e,
        _ => extract_excerpt(&FrontMatter::default(), &content),
    };

    let post = state
        .store
        .create_post(&PostUpsert {
            slug,
            title: title.trim().to_string(),
            excerpt,
            read_time: estimate_read_time(&content),
            content: Some(content),
            date: body
                .date
                .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d").to_string()),
            tags: body.tags,
            featured: body.featured,
            status: body.status.unwrap_or(PostStatus::Published),
            is_multipage: false,
            page_count: 1,
            cover_light: body.cover_light,
            cover_dark: body.cover_dark,
            cover_y: 0,
            cover_visible: true,
            cover_size: "hero".to_string(),
            github_folder_name: None,
            content_hash: None,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

async fn handle_update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<PostPatch>,
) -> Result<Json<Post>, AppError> {
    let post = state.store.update_post(id, &patch).await?;
    Ok(Json(post))
}

#[derive(Serialize)]
struct DeleteResponse {
    message: String,
}

async fn handle_delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, AppError> {
    state.store.delete_post(id).await?;
    Ok(Json(DeleteResponse {
        message: "blog deleted".to_string(),
    }))
}

const ALLOWED_IMAGE_MIMES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    message: String,
    file_name: String,
    urls: UploadUrls,
}

#[derive(Serialize)]
struct UploadUrls {
    original: String,
    large: String,
    medium: String,
    small: String,
    thumbnail: String,
}

async fn handle_upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let field = loop {
        match multipart
            .next_field()
            .await
            .map_err(|e| bad_request(format!("invalid multipart body: {e}")))?
        {
            Some(field) if field.name() == Some("image") => break field,
            Some(_) => continue,
            None => return Err(bad_request("no image file provided")),
        }
    };

    let mime = field.content_type().unwrap_or_default().to_string();
    if !ALLOWED_IMAGE_MIMES.contains(&mime.as_str()) {
        return Err(bad_request("invalid file type, only images are allowed"));
    }

    let original_name = field.file_name().unwrap_or("upload").to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| bad_request(format!("failed to read upload: {e}")))?;

    // Uuid prefix keeps concurrent uploads of the same filename apart.
    let filename = format!("{}-{}", Uuid::new_v4(), sanitize_filename(&original_name));
    let dir = &state.config.uploads.dir;
    std::fs::create_dir_all(dir).map_err(|e| {
        tracing::error!(error = %e, "failed to create uploads dir");
        internal()
    })?;
    std::fs::write(dir.join(&filename), &bytes).map_err(|e| {
        tracing::error!(error = %e, "failed to write upload");
        internal()
    })?;

    let public_path = format!("/uploads/{filename}");
    state
        .store
        .record_image(&NewImage {
            filename: filename.clone(),
            original_name,
            path: public_path.clone(),
            size: bytes.len() as i64,
            mime_type: mime,
        })
        .await?;

    let sized = |width: u32, quality: u32| {
        optimized_image_url(
            &public_path,
            &ImageTransform {
                width,
                height: None,
                quality,
            },
        )
    };

    Ok(Json(UploadResponse {
        message: "image uploaded".to_string(),
        file_name: filename,
        urls: UploadUrls {
            original: public_path.clone(),
            large: sized(1200, 85),
            medium: sized(800, 80),
            small: sized(400, 75),
            thumbnail: sized(200, 70),
        },
    }))
}

fn internal() -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: "internal server error".to_string(),
    }
}

/// Keeps only path-safe characters from a client-supplied filename.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
