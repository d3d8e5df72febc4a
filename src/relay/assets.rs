//! `GET /*` static viewer asset fallback (spec §4.3.1). The asset itself is
//! an external collaborator (spec §1); this module only guarantees it's
//! served with a conventional content type, embedded into the binary the
//! way this codebase already ships other browser-facing assets.

use axum::body::Body;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

const INDEX: &str = "viewer.html";

/// Serve `path` from the embedded asset bundle, falling back to
/// `viewer.html` for any unknown path (single-page-app style fallback).
pub async fn serve(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    let path = if path.is_empty() { INDEX } else { path };

    match Assets::get(path).or_else(|| Assets::get(INDEX)) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, mime.as_ref())
                .body(Body::from(file.data.into_owned()))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_index_for_root() {
        let response = serve(Uri::from_static("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_path_falls_back_to_index() {
        let response = serve(Uri::from_static("/does-not-exist")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
