use crate::application::error::{ErrorReport, HttpError};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response() -> Response {
    let view = ErrorPageView::not_found();
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// One row of the result file index.
#[derive(Clone)]
pub struct ResultFileView {
    pub name: String,
    pub href: String,
    pub size: String,
    pub modified: String,
    pub created: String,
    pub cached: bool,
}

pub struct IndexView {
    pub files: Vec<ResultFileView>,
    pub cache_enabled: bool,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: IndexView,
}

/// Popover attached to a flagged cell. Both fields hold markup that has
/// already been escaped; the template escapes them once more as attributes.
#[derive(Clone)]
pub struct PopoverView {
    pub title_html: String,
    pub content_html: String,
}

#[derive(Clone)]
pub struct CellView {
    pub class: String,
    pub text: String,
    pub title: String,
    pub popover: Option<PopoverView>,
}

#[derive(Clone)]
pub struct ResultRowView {
    pub url: String,
    pub url_comment: String,
    /// Status, block page, DNS tampering, sequence number and TTL columns,
    /// in display order. `None` renders as a blank cell.
    pub cells: Vec<Option<CellView>>,
}

pub struct ResultsView {
    pub title: String,
    pub rows: Vec<ResultRowView>,
}

#[derive(Template)]
#[template(path = "results.html")]
pub struct ResultsTemplate {
    pub view: ResultsView,
}

#[derive(Template)]
#[template(path = "partials/popover_title.html")]
pub struct PopoverTitleTemplate<'a> {
    pub label: &'a str,
    pub url: &'a str,
}

#[derive(Template)]
#[template(path = "partials/comment_popover.html")]
pub struct CommentPopoverTemplate<'a> {
    pub comment: &'a str,
}

pub struct TtlAnomalyRowView {
    pub number: usize,
    pub ipid: i64,
    pub ttl: i64,
    pub rst_class: &'static str,
    pub rst_text: String,
}

#[derive(Template)]
#[template(path = "partials/ttl_popover.html")]
pub struct TtlPopoverTemplate {
    pub syn_ack_ipid: String,
    pub syn_ack_ttl: String,
    pub anomalies: Vec<TtlAnomalyRowView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Not Found".to_string(),
            message: "No result file by that name. Return to the index to pick another one."
                .to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: ErrorPageView,
}

/// Human-readable size using decimal kilobytes.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let kilobytes = bytes as f64 / 1000.0;
    if kilobytes < 1000.0 {
        format!("{kilobytes:.1} kB")
    } else {
        format!("{:.1} MB", kilobytes / 1000.0)
    }
}
