use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, StatusCode},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use url::Url;

use crate::{
    application::results::{RenderedResult, ResultFileSummary, ResultService},
    presentation::views::{
        IndexTemplate, IndexView, ResultFileView, format_size, render_not_found_response,
        render_template_response,
    },
};

use super::middleware::{log_responses, set_request_context};

/// Response header telling whether a results page came from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-resultview-cache";

// Only the path of this base is ever emitted.
const LINK_BASE: &str = "http://resultview.local/";

#[derive(Clone)]
pub struct HttpState {
    pub results: Arc<ResultService>,
}

impl HttpState {
    pub fn new(results: ResultService) -> Self {
        Self {
            results: Arc::new(results),
        }
    }
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/results/{name}", get(result_table))
        .route("/_health", get(health))
        .route(
            "/static/{*path}",
            get(crate::infra::assets::serve_static_asset),
        )
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn index(State(state): State<HttpState>) -> Response {
    match state.results.list().await {
        Ok(files) => {
            let view = IndexView {
                files: files.iter().filter_map(file_view).collect(),
                cache_enabled: state.results.cache().is_some(),
            };
            render_template_response(IndexTemplate { view }, StatusCode::OK)
        }
        Err(err) => err.into_response(),
    }
}

async fn result_table(State(state): State<HttpState>, Path(name): Path<String>) -> Response {
    match state.results.render(&name).await {
        Ok(RenderedResult { html, from_cache }) => {
            let mut response = (StatusCode::OK, Html(html)).into_response();
            response.headers_mut().insert(
                CACHE_STATUS_HEADER,
                HeaderValue::from_static(if from_cache { "hit" } else { "miss" }),
            );
            response
        }
        Err(err) if err.is_not_found() => render_not_found_response(),
        Err(err) => err.into_response(),
    }
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn fallback() -> Response {
    render_not_found_response()
}

fn file_view(file: &ResultFileSummary) -> Option<ResultFileView> {
    Some(ResultFileView {
        name: file.name.clone(),
        href: result_href(&file.name)?,
        size: format_size(file.size_bytes),
        created: file
            .created
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        modified: file
            .modified
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        cached: file.cached,
    })
}

/// Link to the rendered table for `name`, percent-encoded as one path segment.
fn result_href(name: &str) -> Option<String> {
    let mut url = Url::parse(LINK_BASE).ok()?;
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(["results", name]);
    Some(url.path().to_string())
}
