use axum::{
    http::header,
    response::{Html, IntoResponse, Response},
    Json,
};
use axum::body::Bytes;

const DOCS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8"/>
  <title>Registrar API</title>
  <script src="https://unpkg.com/@stoplight/elements@latest/web-components.min.js"></script>
  <link rel="stylesheet" href="https://unpkg.com/@stoplight/elements@latest/styles.min.css">
</head>
<body>
  <elements-api apiDescriptionUrl="/openapi.json" router="hash" layout="sidebar"></elements-api>
</body>
</html>"#;

/// Liveness probe used by the client and by deploy checks.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// The merged document, serialized once when the router was finalized.
pub async fn serve_openapi(body: Bytes) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
        .into_response()
}

pub async fn serve_docs() -> Html<&'static str> {
    Html(DOCS_PAGE)
}
