// ============================================================
// Layer 1 — Web Front-End (axum)
// ============================================================
// Routes:
//
//   GET  /                    page on example 0
//   GET  /?example=i          page on example i
//   POST /summarize           page with the summary of the form
//   GET  /thumbnails/:index   thumbnail image of example `index`
//
//   GET  /api/examples        catalogue as JSON
//   GET  /api/examples/:index parsed post of example `index`
//   POST /api/summarize       {content, title?, topic?} → {summary}
//
// Parsing and generation block, so every handler hands its work
// to tokio's blocking pool; the async workers only move bytes.
// A bad example index is a 404, anything else that fails a 500
// carrying the error chain.
//
// Reference: axum documentation (Router, extractors, IntoResponse)

use anyhow::{Context, Result};
use axum::{
    extract::{Form, Json, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::application::{session::Session, summarizer_service::SummarizerService};
use crate::domain::{
    example::{ExampleNotFound, ExampleRecord},
    post::{ParsedPost, SummaryRequest},
    traits::{ExampleSource, PostSummarizer},
};
use crate::ui::page::{render_page, PageView};

type SharedService = Arc<SummarizerService>;

// ─── Errors ───────────────────────────────────────────────────────────────────
/// Any failure inside a handler, rendered as a plain-text response.
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<ExampleNotFound>().is_some() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {:#}", self.0);
        }
        (status, format!("{:#}", self.0)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> Self {
        Self(e.into())
    }
}

/// Run `work` on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(work)
        .await
        .context("Blocking task panicked")??)
}

// ─── Payloads ─────────────────────────────────────────────────────────────────
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub example: usize,
}

#[derive(Debug, Deserialize)]
pub struct SummaryForm {
    pub example: usize,
    pub topic:   String,
    pub title:   String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

fn page_of(session: &Session<'_, SummarizerService>) -> String {
    render_page(&PageView {
        examples: session.examples(),
        selected: session.selected(),
        topic:    &session.topic,
        title:    &session.title,
        content:  &session.content,
        summary:  session.summary(),
    })
}

// ─── Handlers ─────────────────────────────────────────────────────────────────
async fn index(
    State(service): State<SharedService>,
    Query(query):   Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let html = blocking(move || {
        let session = Session::open(&*service, query.example)?;
        Ok(page_of(&session))
    })
    .await?;
    Ok(Html(html))
}

async fn summarize_form(
    State(service): State<SharedService>,
    Form(form):     Form<SummaryForm>,
) -> Result<Html<String>, AppError> {
    let html = blocking(move || {
        let fields = ParsedPost::new(form.topic, form.title, form.content);
        let mut session = Session::with_fields(&*service, form.example, fields)?;
        session.summarize()?;
        Ok(page_of(&session))
    })
    .await?;
    Ok(Html(html))
}

fn content_type(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("png")          => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif")          => "image/gif",
        Some("webp")         => "image/webp",
        Some("svg")          => "image/svg+xml",
        _                    => "application/octet-stream",
    }
}

async fn thumbnail(
    State(service): State<SharedService>,
    Path(index):    Path<usize>,
) -> Result<Response, AppError> {
    let path = service.thumbnail_path(index)?;
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, content_type(&path))], bytes).into_response()),
        Err(e) => {
            tracing::warn!("Thumbnail '{}' unavailable: {e}", path.display());
            Ok((StatusCode::NOT_FOUND, format!("Thumbnail {index} not found")).into_response())
        }
    }
}

async fn api_examples(State(service): State<SharedService>) -> Json<Vec<ExampleRecord>> {
    Json(service.examples().to_vec())
}

async fn api_example(
    State(service): State<SharedService>,
    Path(index):    Path<usize>,
) -> Result<Json<ParsedPost>, AppError> {
    let post = blocking(move || service.load_example(index)).await?;
    Ok(Json(post))
}

async fn api_summarize(
    State(service): State<SharedService>,
    Json(request):  Json<SummaryRequest>,
) -> Result<Json<SummaryResponse>, AppError> {
    let summary = blocking(move || service.summarize(&request)).await?;
    Ok(Json(SummaryResponse { summary }))
}

// ─── Server ───────────────────────────────────────────────────────────────────
pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/summarize", post(summarize_form))
        .route("/thumbnails/:index", get(thumbnail))
        .route("/api/examples", get(api_examples))
        .route("/api/examples/:index", get(api_example))
        .route("/api/summarize", post(api_summarize))
        .with_state(service)
}

/// Serve the web front-end on `address` until Ctrl-C.
pub async fn serve(service: SharedService, address: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Cannot bind web server to '{address}'"))?;
    tracing::info!("Web front-end listening on http://{address}");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down web front-end");
        })
        .await
        .context("Web server failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::AppConfig;
    use crate::ml::{
        generator::{
            testing::{write_tiny_adapter, write_tiny_model},
            GenerationConfig,
        },
        worker::ComputeDevice,
    };
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::fs;
    use tower::ServiceExt;

    fn app(dir: &std::path::Path) -> Router {
        let data = dir.join("data");
        fs::create_dir_all(data.join("texts")).unwrap();
        fs::create_dir_all(data.join("thumbnails")).unwrap();
        fs::write(
            data.join("examples.json"),
            r#"[
                {"image": "cats.png", "text": "cats.txt", "title": "Cats"},
                {"image": "gone.png", "text": "paper.txt", "title": "<Paper>"}
            ]"#,
        )
        .unwrap();
        fs::write(
            data.join("texts/cats.txt"),
            "TOPIC: cats\nTITLE: Why do cats sleep\nCONTENT: cats sleep a lot",
        )
        .unwrap();
        fs::write(data.join("texts/paper.txt"), "We study <cats>.").unwrap();
        fs::write(data.join("thumbnails/cats.png"), b"\x89PNG").unwrap();

        let model = dir.join("model");
        fs::create_dir_all(&model).unwrap();
        write_tiny_model(&model);
        let checkpoint = write_tiny_adapter(&model);

        let config = AppConfig {
            data_dir:   data,
            base_model: model.to_str().unwrap().to_string(),
            checkpoint,
            device:     ComputeDevice::Cpu,
            generation: GenerationConfig { do_sample: false, max_new_tokens: 4, ..Default::default() },
            ..AppConfig::default()
        };
        router(Arc::new(SummarizerService::new(config).unwrap()))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.unwrap();
        let status   = response.status();
        let bytes    = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_index_shows_first_example() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(app(dir.path()), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("value=\"Why do cats sleep\""));
        assert!(body.contains("&lt;Paper&gt;"));
    }

    #[tokio::test]
    async fn test_choose_example_and_bad_index() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, body) = send(app.clone(), get("/?example=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("value=\"paper.txt\""));
        assert!(body.contains("We study &lt;cats&gt;."));

        let (status, _) = send(app, get("/?example=7")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_other_examples_render_without_first_text() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        fs::remove_file(dir.path().join("data/texts/cats.txt")).unwrap();

        let (status, body) = send(app.clone(), get("/?example=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("value=\"paper.txt\""));

        let (status, _) = send(app, get("/")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_thumbnails() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let response = app.clone().oneshot(get("/thumbnails/0")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        // listed in the catalogue but missing on disk
        assert_eq!(send(app.clone(), get("/thumbnails/1")).await.0, StatusCode::NOT_FOUND);
        assert_eq!(send(app, get("/thumbnails/9")).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_json_api() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());

        let (status, body) = send(app.clone(), get("/api/examples")).await;
        assert_eq!(status, StatusCode::OK);
        let records: Vec<ExampleRecord> = serde_json::from_str(&body).unwrap();
        assert_eq!(records.len(), 2);

        let (_, body) = send(app.clone(), get("/api/examples/0")).await;
        let post: ParsedPost = serde_json::from_str(&body).unwrap();
        assert_eq!(post, ParsedPost::new("cats", "Why do cats sleep", "cats sleep a lot"));

        let request = Request::builder()
            .method("POST")
            .uri("/api/summarize")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"content": "cats sleep a lot"}"#))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let response: SummaryResponse = serde_json::from_str(&body).unwrap();
        assert!(response.summary.split_whitespace().count() <= 4);
    }

    #[tokio::test]
    async fn test_summarize_form_renders_summary() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/summarize")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("example=0&topic=cats&title=Nap&content=cats+sleep"))
            .unwrap();
        let (status, body) = send(app(dir.path()), request).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert!(body.contains("id=\"summary_output\""));
        assert!(body.contains("value=\"Nap\""));
    }
}
