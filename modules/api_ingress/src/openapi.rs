use utoipa::openapi::{InfoBuilder, OpenApi, OpenApiBuilder};

const API_TITLE: &str = "Registrar API";
const API_DESCRIPTION: &str = "Courses, students and course registrations";

/// Empty document that module documents are merged into.
pub fn base_document() -> OpenApi {
    OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title(API_TITLE)
                .version(env!("CARGO_PKG_VERSION"))
                .description(Some(API_DESCRIPTION))
                .build(),
        )
        .build()
}

/// Merge `doc` into `target`. Paths and schemas already present in `target` win.
pub fn merge_into(target: &mut OpenApi, doc: OpenApi) {
    let before = target.paths.paths.len();
    target.merge(doc);
    tracing::debug!(
        added_paths = target.paths.paths.len() - before,
        total_paths = target.paths.paths.len(),
        "Merged OpenAPI document"
    );
}
