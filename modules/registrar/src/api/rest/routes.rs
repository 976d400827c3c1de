use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use modkit::OpenApiRegistry;
use utoipa::OpenApi;

use crate::api::rest::{handlers, openapi::RegistrarApi};
use crate::domain::service::Service;

/// Mounts the registrar endpoints on `router` and publishes their OpenAPI document.
pub fn register_routes(
    router: Router,
    openapi: &dyn OpenApiRegistry,
    service: Arc<Service>,
) -> anyhow::Result<Router> {
    let api = Router::new()
        .route(
            "/api/courses",
            get(handlers::list_courses).post(handlers::create_course),
        )
        .route(
            "/api/courses/{id}",
            get(handlers::get_course)
                .put(handlers::update_course)
                .delete(handlers::delete_course),
        )
        .route(
            "/api/students",
            get(handlers::list_students).post(handlers::create_student),
        )
        .route(
            "/api/students/{id}",
            get(handlers::get_student)
                .put(handlers::update_student)
                .delete(handlers::delete_student),
        )
        .route("/api/students/{id}/register", post(handlers::register))
        .route("/api/students/{id}/unregister", post(handlers::unregister))
        .route("/api/seed", post(handlers::seed))
        .layer(Extension(service));

    openapi.register_document(RegistrarApi::openapi());

    Ok(router.merge(api))
}
