//! Browser UI: the chat page and the Retell call page, embedded in the binary.
//!
//! Uses `rust-embed` to bake the `ui/` directory into the binary.
//! In debug mode (`debug-embed` feature), files are read from disk
//! so you can edit JS/CSS and just refresh the browser.

use axum::{
    extract::Path,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use rust_embed::Embed;
use tracing::debug;

#[derive(Embed)]
#[folder = "ui/"]
struct UiAssets;

/// Build an axum `Router` that serves the embedded UI.
///
/// Merge this **after** the API routes so `/api` and `/health` take priority
/// over the asset catch-all.
pub fn ui_router() -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/call", get(call_handler))
        .route("/{*path}", get(asset_handler))
}

async fn index_handler() -> Response {
    serve_file("index.html")
}

async fn call_handler() -> Response {
    serve_file("call.html")
}

async fn asset_handler(Path(path): Path<String>) -> Response {
    serve_file(&path)
}

fn serve_file(path: &str) -> Response {
    match UiAssets::get(path) {
        Some(asset) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime.as_ref()),
                    (header::CACHE_CONTROL, "no-cache"),
                ],
                asset.data.into_owned(),
            )
                .into_response()
        }
        None => {
            debug!(path, "UI asset not found");
            (StatusCode::NOT_FOUND, Html("<h1>404</h1>")).into_response()
        }
    }
}
