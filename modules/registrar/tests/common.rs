#![allow(dead_code)]

use std::sync::Arc;

use axum::{body::Body, http::Request, response::Response, Router};
use modkit::{ModuleCtxBuilder, ModuleRegistry, Registrator};
use registrar::domain::service::{Service, ServiceConfig};
use registrar::infra::storage::memory_repo::{
    InMemoryCoursesRepository, InMemoryStudentsRepository,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::util::ServiceExt;

/// Service over fresh in-memory repositories.
pub fn service() -> Service {
    Service::new(
        Arc::new(InMemoryCoursesRepository::new()),
        Arc::new(InMemoryStudentsRepository::new()),
        ServiceConfig::default(),
    )
}

/// Runs init and REST phases for the ingress and registrar modules without a
/// database, returning the registry and the finalized router.
pub async fn app() -> (ModuleRegistry, Router) {
    let registry = ModuleRegistry::from_registrators(&[
        Registrator(api_ingress::register),
        Registrator(registrar::register),
    ])
    .unwrap();
    let ctx = ModuleCtxBuilder::new(CancellationToken::new()).build();
    registry.run_init_phase(&ctx).await.unwrap();
    let router = registry.run_rest_phase(&ctx, Router::new()).unwrap();
    (registry, router)
}

pub async fn send(router: &Router, req: Request<Body>) -> Response {
    router.clone().oneshot(req).await.unwrap()
}

pub async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn content_type(resp: &Response) -> String {
    resp.headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
