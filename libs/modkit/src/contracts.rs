//! Capabilities a module can register. Every module has a [`Module`] core;
//! the rest are optional roles driven by the registry phases.

use async_trait::async_trait;
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::context::ModuleCtx;
pub use crate::api::OpenApiRegistry;

/// Wiring only: read config, build services. The schema may not exist yet.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()>;
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Storage setup (collections, indexes). Runs after init, only when a database is configured.
#[async_trait]
pub trait DbModule: Send + Sync {
    async fn migrate(&self, db: &modkit_db::DbHandle) -> anyhow::Result<()>;
}

/// Contributes routes and an OpenAPI document to the shared router.
pub trait RestfulModule: Send + Sync {
    fn register_rest(
        &self,
        ctx: &ModuleCtx,
        router: Router,
        openapi: &dyn OpenApiRegistry,
    ) -> anyhow::Result<Router>;
}

/// Owns the HTTP ingress. Wraps the provider routes but never serves from
/// these hooks; serving belongs to its [`StatefulModule`] side.
pub trait RestHostModule: Send + Sync + 'static {
    /// Routes the host owns itself, added before any provider.
    fn rest_prepare(&self, ctx: &ModuleCtx, router: Router) -> anyhow::Result<Router>;

    /// Fallback, docs and middleware, applied after every provider. The host
    /// keeps the returned router for serving.
    fn rest_finalize(&self, ctx: &ModuleCtx, router: Router) -> anyhow::Result<Router>;

    fn as_registry(&self) -> &dyn OpenApiRegistry;
}

/// Something with a running phase between start and stop.
#[async_trait]
pub trait StatefulModule: Send + Sync {
    async fn start(&self, cancel: CancellationToken) -> anyhow::Result<()>;
    async fn stop(&self, cancel: CancellationToken) -> anyhow::Result<()>;
}
