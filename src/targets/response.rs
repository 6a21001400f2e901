//! Error response formats and renderers.

use super::templates;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Response, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use serde::Serialize;
use std::time::Duration;

/// Body type shared by the proxy and the error renderers.
pub type BoxedBody = BoxBody<Bytes, hyper::Error>;

/// A body holding the given bytes.
#[must_use]
pub fn full_body(data: impl Into<Bytes>) -> BoxedBody {
    Full::new(data.into()).map_err(|never| match never {}).boxed()
}

/// An empty body.
#[must_use]
pub fn empty_body() -> BoxedBody {
    Empty::new().map_err(|never| match never {}).boxed()
}

/// How error responses are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// The format string was not recognized.
    Unknown,
    /// HTML pages from the built-in templates.
    Html,
    /// JSON `{"code": int, "message": string}` objects.
    Json,
    /// A single plain-text line with a trailing newline.
    #[default]
    Plain,
}

/// The format used when none is configured.
pub const DEFAULT_RESPONSE_FORMAT: ResponseFormat = ResponseFormat::Plain;

impl ResponseFormat {
    /// Parse a format from its string form.
    #[must_use]
    pub fn parse(v: &str) -> Self {
        if v.eq_ignore_ascii_case("html") {
            Self::Html
        } else if v.eq_ignore_ascii_case("json") {
            Self::Json
        } else if v.eq_ignore_ascii_case("plain") {
            Self::Plain
        } else {
            Self::Unknown
        }
    }

    /// The format's name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Html => "html",
            Self::Json => "json",
            Self::Plain => "plain",
        }
    }
}

/// The JSON error body.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseError {
    /// HTTP status code.
    pub code: u16,
    /// Human-readable message.
    pub message: String,
}

/// Render a 403 Forbidden response; sent when no listener rule matched.
#[must_use]
pub fn forbidden(format: ResponseFormat) -> Response<BoxedBody> {
    render(
        format,
        StatusCode::FORBIDDEN,
        "Forbidden",
        templates::forbidden_page(),
    )
}

/// Render a 503 Service Unavailable response; sent when every backend is
/// exhausted.
#[must_use]
pub fn service_unavailable(format: ResponseFormat) -> Response<BoxedBody> {
    render(
        format,
        StatusCode::SERVICE_UNAVAILABLE,
        "Service not available",
        templates::service_unavailable_page(),
    )
}

/// Render a 429 Too Many Requests response carrying the projected wait.
#[must_use]
pub fn too_many_requests(format: ResponseFormat, wait: Duration) -> Response<BoxedBody> {
    let seconds = wait.as_secs();
    render(
        format,
        StatusCode::TOO_MANY_REQUESTS,
        &format!("Too many requests - try again in {seconds} seconds"),
        templates::too_many_requests_page(seconds),
    )
}

fn render(
    format: ResponseFormat,
    status: StatusCode,
    message: &str,
    html: String,
) -> Response<BoxedBody> {
    let (content_type, body) = match format {
        ResponseFormat::Html => ("text/html", html),
        ResponseFormat::Json => {
            match serde_json::to_string(&ResponseError {
                code: status.as_u16(),
                message: message.to_owned(),
            }) {
                Ok(json) => ("application/json", json),
                Err(_) => ("text/plain", format!("{message}\n")),
            }
        },
        _ => ("text/plain", format!("{message}\n")),
    };
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(full_body(body))
        .expect("static response construction")
}
