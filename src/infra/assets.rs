//! Embedded static asset serving.

use axum::{
    body::Body,
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, File, include_dir};

use crate::application::error::ErrorReport;

static STATIC_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

/// Serve the stylesheets, scripts and icons compiled into the binary.
pub async fn serve_static_asset(Path(path): Path<String>) -> Response {
    match lookup(&STATIC_ASSETS, &path) {
        Some(file) => asset_response(file),
        None => {
            let mut response = StatusCode::NOT_FOUND.into_response();
            ErrorReport::from_message(
                "infra::assets::serve_static_asset",
                StatusCode::NOT_FOUND,
                format!("Static asset `{path}` not found"),
            )
            .attach(&mut response);
            response
        }
    }
}

fn lookup(bundle: &'static Dir<'static>, path: &str) -> Option<&'static File<'static>> {
    let candidate = path.trim_start_matches('/');

    // No directory listings and nothing that could climb out of the bundle.
    if candidate.is_empty() || candidate.ends_with('/') || candidate.contains("..") {
        return None;
    }

    bundle.get_file(candidate)
}

fn asset_response(file: &'static File<'static>) -> Response {
    let contents = file.contents();
    let mime = mime_guess::from_path(file.path()).first_or_octet_stream();

    let mut response = Response::new(Body::from(Bytes::from_static(contents)));
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(contents.len()));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );

    response
}
