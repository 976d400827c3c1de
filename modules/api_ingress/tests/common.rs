#![allow(dead_code)]

use api_ingress::{ApiIngress, ApiIngressConfig};
use axum::{body::Body, http::Request, response::Response, routing::post, Json, Router};
use modkit::{ModuleCtx, ModuleCtxBuilder, OpenApiRegistry, RestHostModule};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;
use utoipa::openapi::path::{HttpMethod, OperationBuilder, PathItem, PathsBuilder};
use utoipa::openapi::OpenApiBuilder;

pub fn ctx() -> ModuleCtx {
    ModuleCtxBuilder::new(CancellationToken::new())
        .for_module(api_ingress::MODULE_NAME)
        .build()
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(body)
}

/// Runs the host's REST phase around one provider route, `POST /api/echo`.
pub fn build_router(config: ApiIngressConfig) -> (Arc<ApiIngress>, Router) {
    let host = Arc::new(ApiIngress::new(config));
    let ctx = ctx();

    let router = host.rest_prepare(&ctx, Router::new()).unwrap();
    let router = router.route("/api/echo", post(echo));
    host.register_document(
        OpenApiBuilder::new()
            .paths(PathsBuilder::new().path(
                "/api/echo",
                PathItem::new(
                    HttpMethod::Post,
                    OperationBuilder::new().operation_id(Some("echo")).build(),
                ),
            ))
            .build(),
    );
    let router = host.rest_finalize(&ctx, router).unwrap();
    (host, router)
}

pub async fn send(router: &Router, req: Request<Body>) -> Response {
    router.clone().oneshot(req).await.unwrap()
}

pub async fn body_bytes(resp: Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(resp: Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn content_type(resp: &Response) -> String {
    resp.headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
