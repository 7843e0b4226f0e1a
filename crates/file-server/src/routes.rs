//! HTTP routing: one read-only route per stored file.

use axum::Router;
use axum::body::Body;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio_util::io::ReaderStream;
use tracing::debug;

use appdb_file_store::{LocalFileStore, validate_file_name};

pub(crate) fn router(store: LocalFileStore) -> Router {
    Router::new()
        .route("/{name}", get(serve_file).fallback(not_found))
        .fallback(not_found)
        .with_state(store)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn serve_file(
    State(store): State<LocalFileStore>,
    name: Result<Path<String>, PathRejection>,
) -> Response {
    let Ok(Path(name)) = name else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match open_contained(&store, &name).await {
        Some((file, len)) => {
            debug!(file = %name, size = len, "serving file");
            let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
            let headers = response.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            );
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
            response
        }
        None => {
            debug!(file = %name, "not served");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Opens `name` if it is a regular file whose real path lies inside the
/// store root. Any failure along the way means "not found".
async fn open_contained(store: &LocalFileStore, name: &str) -> Option<(tokio::fs::File, u64)> {
    validate_file_name(name).ok()?;

    let root = tokio::fs::canonicalize(store.root()).await.ok()?;
    let path = tokio::fs::canonicalize(store.resolve_path(name)).await.ok()?;
    if !path.starts_with(&root) {
        return None;
    }

    let file = tokio::fs::File::open(&path).await.ok()?;
    let meta = file.metadata().await.ok()?;
    if !meta.is_file() {
        return None;
    }
    Some((file, meta.len()))
}
