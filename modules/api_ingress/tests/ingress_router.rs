mod common;

use api_ingress::ApiIngressConfig;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{body_bytes, body_json, build_router, content_type, get, send};
use serde_json::json;

#[tokio::test]
async fn health_reports_ok() {
    let (_, router) = build_router(ApiIngressConfig::default());

    let resp = send(&router, get("/api/health")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({ "ok": true }));
}

#[tokio::test]
async fn root_serves_client_entry_page() {
    let (_, router) = build_router(ApiIngressConfig::default());

    let resp = send(&router, get("/")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(content_type(&resp), "text/html; charset=utf-8");
    let html = String::from_utf8(body_bytes(resp).await).unwrap();
    assert!(html.contains("id=\"courses-table\""));
    assert!(html.contains("id=\"seed-btn\""));
}

#[tokio::test]
async fn client_assets_are_served_with_their_content_type() {
    let (_, router) = build_router(ApiIngressConfig::default());

    let js = send(&router, get("/app.js")).await;
    assert_eq!(js.status(), StatusCode::OK);
    assert_eq!(content_type(&js), "application/javascript; charset=utf-8");

    let css = send(&router, get("/styles.css")).await;
    assert_eq!(css.status(), StatusCode::OK);
    assert_eq!(content_type(&css), "text/css; charset=utf-8");
}

#[tokio::test]
async fn unmatched_get_falls_back_to_entry_page() {
    let (_, router) = build_router(ApiIngressConfig::default());

    for uri in ["/students/42", "/api/unknown", "/openapi.json"] {
        let resp = send(&router, get(uri)).await;
        assert_eq!(resp.status(), StatusCode::OK, "{uri}");
        assert_eq!(content_type(&resp), "text/html; charset=utf-8", "{uri}");
    }
}

#[tokio::test]
async fn unmatched_non_get_is_a_404_problem() {
    let (_, router) = build_router(ApiIngressConfig::default());

    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/api/nothing-here")
        .header("x-request-id", "req-404")
        .body(Body::empty())
        .unwrap();
    let resp = send(&router, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(content_type(&resp), "application/problem+json");
    let problem = body_json(resp).await;
    assert_eq!(problem["status"], 404);
    assert_eq!(problem["instance"], "/api/nothing-here");
    assert_eq!(problem["request_id"], "req-404");
}

#[tokio::test]
async fn docs_serve_merged_openapi_document() {
    let (_, router) = build_router(ApiIngressConfig {
        enable_docs: true,
        ..Default::default()
    });

    let resp = send(&router, get("/openapi.json")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
    let doc = body_json(resp).await;
    assert_eq!(doc["info"]["title"], "Registrar API");
    assert_eq!(doc["paths"]["/api/echo"]["post"]["operationId"], "echo");

    let docs = send(&router, get("/docs")).await;
    assert_eq!(docs.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(docs).await).unwrap();
    assert!(html.contains("/openapi.json"));
}

#[tokio::test]
async fn cors_is_permissive_by_default() {
    let (_, router) = build_router(ApiIngressConfig::default());

    let req = Request::builder()
        .uri("/api/health")
        .header(header::ORIGIN, "http://elsewhere.example")
        .body(Body::empty())
        .unwrap();
    let resp = send(&router, req).await;
    assert_eq!(
        resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

#[tokio::test]
async fn cors_can_be_disabled() {
    let (_, router) = build_router(ApiIngressConfig {
        cors_enabled: false,
        ..Default::default()
    });

    let req = Request::builder()
        .uri("/api/health")
        .header(header::ORIGIN, "http://elsewhere.example")
        .body(Body::empty())
        .unwrap();
    let resp = send(&router, req).await;
    assert!(resp
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let (_, router) = build_router(ApiIngressConfig {
        body_limit_bytes: 16,
        ..Default::default()
    });

    let payload = json!({ "padding": "x".repeat(64) }).to_string();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/echo")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Body::from(payload))
        .unwrap();
    let resp = send(&router, req).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let small = Request::builder()
        .method(Method::POST)
        .uri("/api/echo")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"a\":1}"))
        .unwrap();
    let resp = send(&router, small).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({ "a": 1 }));
}
