#![forbid(unsafe_code)]

//! Read-only web dashboard over the upload queue.
//!
//! Reports what is waiting in the videos directory, which upload sessions
//! exist and how many remote shorts went up already. Nothing here mutates
//! state or starts uploads; that stays with the `autoupload` command.

use std::{
    fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use shorts_autoupload::{
    config::{Settings, SettingsOverrides, resolve_settings},
    ledger::UploadLedger,
    media::LocalMediaStore,
    uploader::list_sessions,
};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "shorts_autoupload=info,dashboard=info";
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Parser)]
#[command(name = "dashboard", about = "Read-only status page for the upload queue")]
struct DashboardArgs {
    /// Settings file (dotenv format).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    videos_dir: Option<PathBuf>,
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    host: IpAddr,
    /// Listening port; the PORT environment variable wins when set.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[derive(Clone)]
struct AppState {
    settings: Arc<Settings>,
}

impl AppState {
    fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
        }
    }

    fn media(&self) -> LocalMediaStore {
        LocalMediaStore::new(&self.settings.videos_dir)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    pending_videos: usize,
    sessions: usize,
    uploaded_shorts: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueuedFile {
    filename: String,
    size: u64,
    upload_date: Option<DateTime<Utc>>,
    path: String,
}

#[derive(Debug, Serialize)]
struct QueuedFiles {
    files: Vec<QueuedFile>,
}

#[derive(Debug, Serialize)]
struct VideoListing {
    success: bool,
    videos: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SessionListing {
    success: bool,
    cookies: Vec<String>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, headers, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = DashboardArgs::parse();

    let settings = resolve_settings(SettingsOverrides {
        videos_dir: args.videos_dir,
        uploader_command: None,
        settings_path: args.config,
    })?;

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(args.port);

    let app = router(AppState::new(settings));

    let addr = SocketAddr::new(args.host, port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("dashboard listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running dashboard server")?;

    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/uploads", get(list_uploads))
        .route("/api/show-videos", get(show_videos))
        .route("/api/show-cookies", get(show_cookies))
        .fallback(endpoint_not_found)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("failed to install Ctrl+C handler: {err}");
    }
}

async fn endpoint_not_found() -> ApiError {
    ApiError::not_found("endpoint not found")
}

/// Directory walks and ledger reads are blocking; keep them off the runtime
/// threads.
async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?
        .map_err(|err| {
            error!("dashboard request failed: {err:#}");
            ApiError::internal(format!("{err:#}"))
        })
}

async fn status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    blocking(move || {
        Ok(StatusResponse {
            pending_videos: state.media().list_videos().len(),
            sessions: list_sessions(&state.settings.cookies_dir)?.len(),
            uploaded_shorts: UploadLedger::load(&state.settings.ledger_path).len(),
        })
    })
    .await
    .map(Json)
}

async fn list_uploads(State(state): State<AppState>) -> ApiResult<Json<QueuedFiles>> {
    blocking(move || {
        let media = state.media();
        let mut files = Vec::new();
        for filename in media.list_videos() {
            let path = media.path_of(&filename);
            let meta =
                fs::metadata(&path).with_context(|| format!("reading {}", path.display()))?;
            let upload_date = meta
                .created()
                .or_else(|_| meta.modified())
                .ok()
                .map(DateTime::<Utc>::from);
            files.push(QueuedFile {
                filename,
                size: meta.len(),
                upload_date,
                path: path.to_string_lossy().into_owned(),
            });
        }
        Ok(QueuedFiles { files })
    })
    .await
    .map(Json)
}

async fn show_videos(State(state): State<AppState>) -> ApiResult<Json<VideoListing>> {
    blocking(move || {
        Ok(VideoListing {
            success: true,
            videos: state.media().list_all(),
        })
    })
    .await
    .map(Json)
}

async fn show_cookies(State(state): State<AppState>) -> ApiResult<Json<SessionListing>> {
    blocking(move || {
        Ok(SessionListing {
            success: true,
            cookies: list_sessions(&state.settings.cookies_dir)?,
        })
    })
    .await
    .map(Json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, extract::State as AxumState};
    use serde_json::Value;
    use shorts_autoupload::config::SESSION_FILE_PREFIX;
    use tempfile::tempdir;

    struct DashboardTestContext {
        _temp: tempfile::TempDir,
        settings: Settings,
        state: AppState,
    }

    impl DashboardTestContext {
        fn new() -> Self {
            let temp = tempdir().unwrap();
            let settings = Settings::rooted_at(temp.path());
            fs::create_dir_all(&settings.videos_dir).unwrap();
            fs::create_dir_all(&settings.cookies_dir).unwrap();
            Self {
                state: AppState::new(settings.clone()),
                settings,
                _temp: temp,
            }
        }

        fn add_file(&self, name: &str, contents: &str) {
            fs::write(self.settings.videos_dir.join(name), contents).unwrap();
        }

        fn add_session(&self, name: &str) {
            fs::write(
                self.settings
                    .cookies_dir
                    .join(format!("{SESSION_FILE_PREFIX}{name}.json")),
                "{}",
            )
            .unwrap();
        }
    }

    #[tokio::test]
    async fn status_counts_queue_sessions_and_ledger() {
        let ctx = DashboardTestContext::new();
        ctx.add_file("clip.mp4", "video");
        ctx.add_file("notes.txt", "x");
        ctx.add_session("alice");
        let mut ledger = UploadLedger::load(&ctx.settings.ledger_path);
        ledger.add("abc12345678").unwrap();
        ledger.add("def12345678").unwrap();

        let Json(status) = super::status(AxumState(ctx.state.clone())).await.unwrap();
        assert_eq!(status.pending_videos, 1);
        assert_eq!(status.sessions, 1);
        assert_eq!(status.uploaded_shorts, 2);
    }

    #[tokio::test]
    async fn uploads_list_only_videos_with_sizes() {
        let ctx = DashboardTestContext::new();
        ctx.add_file("clip.mp4", "12345");
        ctx.add_file("cover.jpg", "x");

        let Json(listing) = super::list_uploads(AxumState(ctx.state.clone()))
            .await
            .unwrap();
        assert_eq!(listing.files.len(), 1);
        let file = &listing.files[0];
        assert_eq!(file.filename, "clip.mp4");
        assert_eq!(file.size, 5);
        assert!(file.path.ends_with("clip.mp4"));

        let json = serde_json::to_value(&listing).unwrap();
        assert!(json["files"][0].get("uploadDate").is_some());
    }

    #[tokio::test]
    async fn show_endpoints_mirror_cli_listings() {
        let ctx = DashboardTestContext::new();
        ctx.add_file("clip.mp4", "video");
        ctx.add_file("notes.txt", "x");
        ctx.add_session("bob");
        ctx.add_session("alice");

        let Json(videos) = super::show_videos(AxumState(ctx.state.clone()))
            .await
            .unwrap();
        assert!(videos.success);
        let mut names = videos.videos;
        names.sort();
        assert_eq!(names, vec!["clip.mp4", "notes.txt"]);

        let Json(sessions) = super::show_cookies(AxumState(ctx.state.clone()))
            .await
            .unwrap();
        assert_eq!(sessions.cookies, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn missing_directories_report_empty_lists() {
        let temp = tempdir().unwrap();
        let state = AppState::new(Settings::rooted_at(temp.path()));

        let Json(status) = super::status(AxumState(state.clone())).await.unwrap();
        assert_eq!(status.pending_videos, 0);
        assert_eq!(status.sessions, 0);
        assert_eq!(status.uploaded_shorts, 0);

        let Json(listing) = super::list_uploads(AxumState(state)).await.unwrap();
        assert!(listing.files.is_empty());
    }

    #[tokio::test]
    async fn unknown_endpoint_is_json_404() {
        let response = endpoint_not_found().await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "endpoint not found");
    }

    #[test]
    fn internal_error_maps_to_500() {
        let response = ApiError::internal("boom").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
