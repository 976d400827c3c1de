//! HTTP API helpers shared by REST modules.

pub mod problem;

/// Sink for OpenAPI documents published by REST modules during the REST phase.
///
/// The REST host merges every document it receives into the one it serves.
pub trait OpenApiRegistry: Send + Sync {
    fn register_document(&self, doc: utoipa::openapi::OpenApi);

    fn as_any(&self) -> &dyn std::any::Any;
}
