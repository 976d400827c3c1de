use axum::{
    extract::Extension,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use modkit::{Problem, ProblemResponse};
use rust_embed::RustEmbed;

use crate::request_id::XRequestId;

const INDEX: &str = "index.html";

/// Browser client compiled into the binary.
#[derive(RustEmbed)]
#[folder = "assets/public/"]
pub struct ClientAssets;

/// Router fallback: GET/HEAD get the matching asset or the client entry page,
/// every other method gets a 404 problem.
pub async fn serve_client(
    method: Method,
    uri: Uri,
    request_id: Option<Extension<XRequestId>>,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        let mut problem = Problem::from_status(
            StatusCode::NOT_FOUND,
            format!("No route for {} {}", method, uri.path()),
        )
        .with_instance(uri.path());
        if let Some(Extension(XRequestId(id))) = request_id {
            problem = problem.with_request_id(id);
        }
        return ProblemResponse(problem).into_response();
    }

    let requested = uri.path().trim_start_matches('/');
    let (name, file) = match lookup(requested) {
        Some(found) => found,
        None => match lookup(INDEX) {
            Some(found) => found,
            None => {
                tracing::error!("Embedded client is missing {}", INDEX);
                return StatusCode::NOT_FOUND.into_response();
            }
        },
    };

    (
        [
            (header::CONTENT_TYPE, content_type_for(name)),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        file.data,
    )
        .into_response()
}

fn lookup(name: &str) -> Option<(&str, rust_embed::EmbeddedFile)> {
    if name.is_empty() {
        return None;
    }
    ClientAssets::get(name).map(|f| (name, f))
}

pub(crate) fn content_type_for(file: &str) -> &'static str {
    match file.rsplit('.').next().unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" | "map" => "application/json; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "ico" => "image/x-icon",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}
