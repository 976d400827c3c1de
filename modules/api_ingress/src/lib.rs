//! HTTP ingress: owns the listening socket, the shared middleware stack, the
//! embedded browser client and the merged OpenAPI document.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use axum::{middleware::from_fn, routing::get, Router};
use modkit::lifecycle::ReadySignal;
use modkit::{OpenApiRegistry, RegistryBuilder, WithLifecycle};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

pub mod assets;
mod config;
mod openapi;
pub mod request_id;
mod web;

pub use config::ApiIngressConfig;

pub const MODULE_NAME: &str = "api_ingress";

const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// REST host module. Collects module routes and OpenAPI documents during the
/// REST phase, then serves the finalized router until cancelled.
pub struct ApiIngress {
    config: ArcSwap<ApiIngressConfig>,
    openapi: Mutex<utoipa::openapi::OpenApi>,
    // Finalized router from the REST phase, taken by `serve`
    final_router: Mutex<Option<Router>>,
    bound_addr: Mutex<Option<SocketAddr>>,
}

impl Default for ApiIngress {
    fn default() -> Self {
        Self::new(ApiIngressConfig::default())
    }
}

impl ApiIngress {
    pub fn new(config: ApiIngressConfig) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            openapi: Mutex::new(openapi::base_document()),
            final_router: Mutex::new(None),
            bound_addr: Mutex::new(None),
        }
    }

    pub fn get_config(&self) -> ApiIngressConfig {
        (**self.config.load()).clone()
    }

    /// Address the server is listening on, once bound.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.bound_addr.lock()
    }

    /// Snapshot of the merged OpenAPI document.
    pub fn openapi_document(&self) -> utoipa::openapi::OpenApi {
        self.openapi.lock().clone()
    }

    /// Wrap `router` in the shared middleware stack.
    ///
    /// Layers added later wrap earlier ones, so they are listed innermost first.
    /// Request order: SetRequestId, PropagateRequestId, trace span, request id
    /// extension, timeout, CORS, body limit.
    fn apply_middleware(&self, mut router: Router) -> Router {
        let config = self.get_config();
        let x_request_id = request_id::header();

        router = router.layer(RequestBodyLimitLayer::new(config.body_limit_bytes));
        if config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }
        if config.request_timeout_secs > 0 {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(
                config.request_timeout_secs,
            )));
        }
        router = router.layer(from_fn(request_id::push_req_id_to_extensions));
        router = router.layer(request_id::create_trace_layer());
        router = router.layer(PropagateRequestIdLayer::new(x_request_id.clone()));
        router.layer(SetRequestIdLayer::new(x_request_id, request_id::MakeReqId))
    }

    /// Bind, notify ready, serve until cancelled.
    async fn serve(self: Arc<Self>, cancel: CancellationToken, ready: ReadySignal) -> Result<()> {
        let cfg = self.get_config();
        let addr: SocketAddr = cfg
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", cfg.bind_addr))?;

        // Take the router in its own scope so the guard is dropped before awaiting
        let stored = { self.final_router.lock().take() };
        let router = match stored {
            Some(r) => r,
            None => {
                tracing::debug!("No router from REST phase, serving health and client only");
                self.apply_middleware(
                    Router::new()
                        .route("/api/health", get(web::health_check))
                        .fallback(assets::serve_client),
                )
            }
        };

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        let local = listener.local_addr()?;
        *self.bound_addr.lock() = Some(local);
        tracing::info!("HTTP server listening on http://{}", local);
        ready.notify();

        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully");
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server failed")
    }
}

#[async_trait]
impl modkit::Module for ApiIngress {
    async fn init(&self, ctx: &modkit::ModuleCtx) -> Result<()> {
        let cfg = ctx.module_config::<ApiIngressConfig>();
        tracing::debug!(bind_addr = %cfg.bind_addr, docs = cfg.enable_docs, "api_ingress configured");
        self.config.store(Arc::new(cfg));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl modkit::RestHostModule for ApiIngress {
    fn rest_prepare(&self, _ctx: &modkit::ModuleCtx, router: Router) -> Result<Router> {
        Ok(router.route("/api/health", get(web::health_check)))
    }

    fn rest_finalize(&self, _ctx: &modkit::ModuleCtx, mut router: Router) -> Result<Router> {
        let config = self.get_config();

        if config.enable_docs {
            let doc = self.openapi_document();
            tracing::info!(paths = doc.paths.paths.len(), "Publishing OpenAPI document");
            let body = axum::body::Bytes::from(serde_json::to_vec(&doc)?);
            router = router
                .route("/openapi.json", get(move || web::serve_openapi(body.clone())))
                .route("/docs", get(web::serve_docs));
        }

        let router = self.apply_middleware(router.fallback(assets::serve_client));
        *self.final_router.lock() = Some(router.clone());
        Ok(router)
    }

    fn as_registry(&self) -> &dyn OpenApiRegistry {
        self
    }
}

impl OpenApiRegistry for ApiIngress {
    fn register_document(&self, doc: utoipa::openapi::OpenApi) {
        openapi::merge_into(&mut self.openapi.lock(), doc);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[async_trait]
impl modkit::Runnable for ApiIngress {
    async fn run(self: Arc<Self>, cancel: CancellationToken, ready: ReadySignal) -> Result<()> {
        self.serve(cancel, ready).await
    }
}

/// Registers the ingress as core, REST host and stateful module.
pub fn register(b: &mut RegistryBuilder) {
    let module = Arc::new(ApiIngress::default());
    b.register_core(MODULE_NAME, module.clone());
    b.register_rest_host(MODULE_NAME, module.clone());
    b.register_stateful(
        MODULE_NAME,
        Arc::new(WithLifecycle::from_arc(module).with_stop_timeout(STOP_TIMEOUT)),
    );
}
