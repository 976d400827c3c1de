mod common;

use api_ingress::{ApiIngress, ApiIngressConfig};
use axum::Router;
use modkit::{RestHostModule, StatefulModule, Status, WithLifecycle};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

fn loopback() -> ApiIngressConfig {
    ApiIngressConfig {
        bind_addr: "127.0.0.1:0".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn serves_over_tcp_until_stopped() {
    let host = Arc::new(ApiIngress::new(loopback()));
    let ctx = common::ctx();
    let router = host.rest_prepare(&ctx, Router::new()).unwrap();
    host.rest_finalize(&ctx, router).unwrap();

    let svc = WithLifecycle::from_arc(host.clone()).with_stop_timeout(Duration::from_secs(5));
    let cancel = CancellationToken::new();
    svc.start(cancel.clone()).await.unwrap();
    assert_eq!(svc.status(), Status::Running);

    let addr = host.bound_addr().expect("server should report its address");
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /api/health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw);
    assert!(text.starts_with("HTTP/1.1 200"), "unexpected response: {text}");
    assert!(text.contains(r#"{"ok":true}"#));
    assert!(text.to_ascii_lowercase().contains("x-request-id"));

    svc.stop(cancel).await.unwrap();
    assert_eq!(svc.status(), Status::Stopped);
}

#[tokio::test]
async fn invalid_bind_address_fails_start() {
    let host = Arc::new(ApiIngress::new(ApiIngressConfig {
        bind_addr: "not-an-address".into(),
        ..Default::default()
    }));
    let svc = WithLifecycle::from_arc(host).with_ready_timeout(Duration::from_secs(5));

    let err = svc.start(CancellationToken::new()).await.unwrap_err();
    assert!(err.to_string().contains("exited before becoming ready"));
}

#[tokio::test]
async fn serves_without_rest_phase() {
    let host = Arc::new(ApiIngress::new(loopback()));
    let svc = WithLifecycle::from_arc(host.clone());
    let cancel = CancellationToken::new();
    svc.start(cancel.clone()).await.unwrap();

    let addr = host.bound_addr().unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    assert!(String::from_utf8_lossy(&raw).contains("<title>Registrar</title>"));

    svc.stop(cancel).await.unwrap();
}
