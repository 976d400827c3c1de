use std::convert::Infallible;

use axum::extract::{rejection::JsonRejection, FromRequestParts};
use axum::http::{request::Parts, StatusCode};
use modkit::{Problem, ProblemResponse, ValidationError};

use crate::domain::error::DomainError;

/// Request path and `x-request-id`, used to fill `instance` and `request_id`.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub path: String,
    pub request_id: Option<String>,
}

impl RequestMeta {
    pub fn attach(&self, resp: ProblemResponse) -> ProblemResponse {
        match &self.request_id {
            Some(id) => ProblemResponse(resp.0.with_request_id(id.as_str())),
            None => resp,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            path: parts.uri.path().to_owned(),
            request_id: parts
                .headers
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        })
    }
}

/// Build a problem response with the module's error type and code.
pub fn from_parts(
    status: StatusCode,
    code: &str,
    title: &str,
    detail: impl Into<String>,
    instance: &str,
) -> ProblemResponse {
    ProblemResponse(
        Problem::new(status, title, detail)
            .with_type(format!("https://errors.registrar.local/{}", code.to_lowercase()))
            .with_code(code)
            .with_instance(instance),
    )
}

/// Map domain error to RFC 9457 problem response.
pub fn map_domain_error(e: &DomainError, instance: &str) -> ProblemResponse {
    match e {
        DomainError::CourseNotFound { .. } => from_parts(
            StatusCode::NOT_FOUND,
            "COURSE_NOT_FOUND",
            "Course not found",
            e.to_string(),
            instance,
        ),
        DomainError::StudentNotFound { .. } => from_parts(
            StatusCode::NOT_FOUND,
            "STUDENT_NOT_FOUND",
            "Student not found",
            e.to_string(),
            instance,
        ),
        DomainError::CourseCodeExists { .. } => from_parts(
            StatusCode::CONFLICT,
            "COURSE_CODE_EXISTS",
            "Course code already exists",
            e.to_string(),
            instance,
        ),
        DomainError::AlreadyRegistered { .. } => from_parts(
            StatusCode::CONFLICT,
            "ALREADY_REGISTERED",
            "Already registered",
            e.to_string(),
            instance,
        ),
        DomainError::Validation { field, message } => {
            let resp = from_parts(
                StatusCode::BAD_REQUEST,
                "VALIDATION",
                "Validation error",
                format!("{field} {message}"),
                instance,
            );
            ProblemResponse(resp.0.with_errors(vec![ValidationError {
                detail: message.clone(),
                pointer: format!("/{field}"),
            }]))
        }
        DomainError::Database { .. } => {
            // Log the internal error details but don't expose them to the client
            tracing::error!(error = %e, "Database error occurred");
            from_parts(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_DB",
                "Internal error",
                "An internal database error occurred",
                instance,
            )
        }
    }
}

/// Unparseable or mistyped JSON bodies are client errors.
pub fn map_json_rejection(rejection: &JsonRejection, instance: &str) -> ProblemResponse {
    from_parts(
        StatusCode::BAD_REQUEST,
        "INVALID_BODY",
        "Invalid request body",
        rejection.body_text(),
        instance,
    )
}
