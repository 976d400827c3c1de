use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    http::StatusCode,
    response::Json,
    Extension,
};
use modkit::{Problem, ProblemResponse};
use tracing::{info, warn};

use crate::api::rest::dto::{
    CourseDto, CourseReq, ListStudentsQuery, OkDto, RegistrationReq, StudentDto, StudentReq,
};
use crate::api::rest::error::{map_domain_error, map_json_rejection, RequestMeta};
use crate::domain::error::DomainError;
use crate::domain::service::Service;

type ApiResult<T> = Result<T, ProblemResponse>;

fn fail(e: DomainError, meta: &RequestMeta) -> ProblemResponse {
    if !matches!(e, DomainError::Database { .. }) {
        warn!(path = %meta.path, "Request rejected: {}", e);
    }
    meta.attach(map_domain_error(&e, &meta.path))
}

fn body<T>(body: Result<Json<T>, JsonRejection>, meta: &RequestMeta) -> ApiResult<T> {
    body.map(|Json(v)| v).map_err(|rejection| {
        warn!(path = %meta.path, "Malformed request body: {}", rejection.body_text());
        meta.attach(map_json_rejection(&rejection, &meta.path))
    })
}

// --- courses ---

/// List all courses ordered by title.
#[utoipa::path(
    get,
    path = "/api/courses",
    responses(
        (status = 200, description = "Courses sorted by title", body = [CourseDto]),
        (status = 500, description = "Internal error", body = Problem, content_type = "application/problem+json")
    ),
    tag = "courses",
    operation_id = "listCourses"
)]
pub async fn list_courses(
    Extension(svc): Extension<Arc<Service>>,
    meta: RequestMeta,
) -> ApiResult<Json<Vec<CourseDto>>> {
    let courses = svc.list_courses().await.map_err(|e| fail(e, &meta))?;
    Ok(Json(courses.into_iter().map(CourseDto::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/courses/{id}",
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course found", body = CourseDto),
        (status = 404, description = "Course not found", body = Problem, content_type = "application/problem+json")
    ),
    tag = "courses",
    operation_id = "getCourse"
)]
pub async fn get_course(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
    meta: RequestMeta,
) -> ApiResult<Json<CourseDto>> {
    let course = svc.get_course(&id).await.map_err(|e| fail(e, &meta))?;
    Ok(Json(course.into()))
}

/// Create a course with a unique code.
#[utoipa::path(
    post,
    path = "/api/courses",
    request_body = CourseReq,
    responses(
        (status = 201, description = "Created course", body = CourseDto),
        (status = 400, description = "Missing title or code", body = Problem, content_type = "application/problem+json"),
        (status = 409, description = "Code already exists", body = Problem, content_type = "application/problem+json"),
        (status = 500, description = "Internal error", body = Problem, content_type = "application/problem+json")
    ),
    tag = "courses",
    operation_id = "createCourse"
)]
pub async fn create_course(
    Extension(svc): Extension<Arc<Service>>,
    meta: RequestMeta,
    req: Result<Json<CourseReq>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CourseDto>)> {
    let req = body(req, &meta)?;
    info!("Creating course: {:?}", req);

    let course = svc
        .create_course(req.into())
        .await
        .map_err(|e| fail(e, &meta))?;
    Ok((StatusCode::CREATED, Json(course.into())))
}

/// Replace a course's title and code.
#[utoipa::path(
    put,
    path = "/api/courses/{id}",
    params(("id" = String, Path, description = "Course id")),
    request_body = CourseReq,
    responses(
        (status = 200, description = "Updated course", body = CourseDto),
        (status = 400, description = "Missing title or code", body = Problem, content_type = "application/problem+json"),
        (status = 404, description = "Course not found", body = Problem, content_type = "application/problem+json"),
        (status = 409, description = "Code belongs to another course", body = Problem, content_type = "application/problem+json")
    ),
    tag = "courses",
    operation_id = "updateCourse"
)]
pub async fn update_course(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
    meta: RequestMeta,
    req: Result<Json<CourseReq>, JsonRejection>,
) -> ApiResult<Json<CourseDto>> {
    let req = body(req, &meta)?;
    info!("Updating course {} with: {:?}", id, req);

    let course = svc
        .update_course(&id, req.into())
        .await
        .map_err(|e| fail(e, &meta))?;
    Ok(Json(course.into()))
}

/// Delete a course and remove it from every student's registrations.
#[utoipa::path(
    delete,
    path = "/api/courses/{id}",
    params(("id" = String, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course deleted", body = OkDto),
        (status = 404, description = "Course not found", body = Problem, content_type = "application/problem+json")
    ),
    tag = "courses",
    operation_id = "deleteCourse"
)]
pub async fn delete_course(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
    meta: RequestMeta,
) -> ApiResult<Json<OkDto>> {
    info!("Deleting course: {}", id);
    svc.delete_course(&id).await.map_err(|e| fail(e, &meta))?;
    Ok(Json(OkDto::ok()))
}

// --- students ---

/// List students ordered by name, optionally filtered by name substring.
#[utoipa::path(
    get,
    path = "/api/students",
    params(ListStudentsQuery),
    responses(
        (status = 200, description = "Students sorted by name", body = [StudentDto]),
        (status = 500, description = "Internal error", body = Problem, content_type = "application/problem+json")
    ),
    tag = "students",
    operation_id = "listStudents"
)]
pub async fn list_students(
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<ListStudentsQuery>,
    meta: RequestMeta,
) -> ApiResult<Json<Vec<StudentDto>>> {
    let students = svc
        .list_students(query.name.as_deref())
        .await
        .map_err(|e| fail(e, &meta))?;
    Ok(Json(students.into_iter().map(StudentDto::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/students/{id}",
    params(("id" = String, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student found", body = StudentDto),
        (status = 404, description = "Student not found", body = Problem, content_type = "application/problem+json")
    ),
    tag = "students",
    operation_id = "getStudent"
)]
pub async fn get_student(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
    meta: RequestMeta,
) -> ApiResult<Json<StudentDto>> {
    let student = svc.get_student(&id).await.map_err(|e| fail(e, &meta))?;
    Ok(Json(student.into()))
}

/// Create a student with no registrations.
#[utoipa::path(
    post,
    path = "/api/students",
    request_body = StudentReq,
    responses(
        (status = 201, description = "Created student", body = StudentDto),
        (status = 400, description = "Missing name", body = Problem, content_type = "application/problem+json")
    ),
    tag = "students",
    operation_id = "createStudent"
)]
pub async fn create_student(
    Extension(svc): Extension<Arc<Service>>,
    meta: RequestMeta,
    req: Result<Json<StudentReq>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StudentDto>)> {
    let req = body(req, &meta)?;
    info!("Creating student: {:?}", req);

    let student = svc
        .create_student(req.into())
        .await
        .map_err(|e| fail(e, &meta))?;
    Ok((StatusCode::CREATED, Json(student.into())))
}

/// Replace a student's name and email. Registrations are kept.
#[utoipa::path(
    put,
    path = "/api/students/{id}",
    params(("id" = String, Path, description = "Student id")),
    request_body = StudentReq,
    responses(
        (status = 200, description = "Updated student", body = StudentDto),
        (status = 400, description = "Missing name", body = Problem, content_type = "application/problem+json"),
        (status = 404, description = "Student not found", body = Problem, content_type = "application/problem+json")
    ),
    tag = "students",
    operation_id = "updateStudent"
)]
pub async fn update_student(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
    meta: RequestMeta,
    req: Result<Json<StudentReq>, JsonRejection>,
) -> ApiResult<Json<StudentDto>> {
    let req = body(req, &meta)?;
    info!("Updating student {} with: {:?}", id, req);

    let student = svc
        .update_student(&id, req.into())
        .await
        .map_err(|e| fail(e, &meta))?;
    Ok(Json(student.into()))
}

#[utoipa::path(
    delete,
    path = "/api/students/{id}",
    params(("id" = String, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student deleted", body = OkDto),
        (status = 404, description = "Student not found", body = Problem, content_type = "application/problem+json")
    ),
    tag = "students",
    operation_id = "deleteStudent"
)]
pub async fn delete_student(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
    meta: RequestMeta,
) -> ApiResult<Json<OkDto>> {
    info!("Deleting student: {}", id);
    svc.delete_student(&id).await.map_err(|e| fail(e, &meta))?;
    Ok(Json(OkDto::ok()))
}

// --- registrations ---

/// Register a student for a course.
#[utoipa::path(
    post,
    path = "/api/students/{id}/register",
    params(("id" = String, Path, description = "Student id")),
    request_body = RegistrationReq,
    responses(
        (status = 200, description = "Student with the new registration", body = StudentDto),
        (status = 400, description = "Missing courseId", body = Problem, content_type = "application/problem+json"),
        (status = 404, description = "Student or course not found", body = Problem, content_type = "application/problem+json"),
        (status = 409, description = "Already registered", body = Problem, content_type = "application/problem+json")
    ),
    tag = "registrations",
    operation_id = "registerStudent"
)]
pub async fn register(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
    meta: RequestMeta,
    req: Result<Json<RegistrationReq>, JsonRejection>,
) -> ApiResult<Json<StudentDto>> {
    let req = body(req, &meta)?;
    let course_id = req.course_id.unwrap_or_default();
    info!("Registering student {} for course {}", id, course_id);

    let student = svc
        .register(&id, &course_id)
        .await
        .map_err(|e| fail(e, &meta))?;
    Ok(Json(student.into()))
}

/// Remove a course from a student's registrations. Succeeds when not registered.
#[utoipa::path(
    post,
    path = "/api/students/{id}/unregister",
    params(("id" = String, Path, description = "Student id")),
    request_body = RegistrationReq,
    responses(
        (status = 200, description = "Student without the registration", body = StudentDto),
        (status = 400, description = "Missing courseId", body = Problem, content_type = "application/problem+json"),
        (status = 404, description = "Student not found", body = Problem, content_type = "application/problem+json")
    ),
    tag = "registrations",
    operation_id = "unregisterStudent"
)]
pub async fn unregister(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
    meta: RequestMeta,
    req: Result<Json<RegistrationReq>, JsonRejection>,
) -> ApiResult<Json<StudentDto>> {
    let req = body(req, &meta)?;
    let course_id = req.course_id.unwrap_or_default();
    info!("Unregistering student {} from course {}", id, course_id);

    let student = svc
        .unregister(&id, &course_id)
        .await
        .map_err(|e| fail(e, &meta))?;
    Ok(Json(student.into()))
}

// --- seed ---

/// Replace all courses and students with the demo data set.
#[utoipa::path(
    post,
    path = "/api/seed",
    responses(
        (status = 200, description = "Demo data loaded", body = OkDto),
        (status = 500, description = "Internal error", body = Problem, content_type = "application/problem+json")
    ),
    tag = "seed",
    operation_id = "seed"
)]
pub async fn seed(Extension(svc): Extension<Arc<Service>>, meta: RequestMeta) -> ApiResult<Json<OkDto>> {
    info!("Seeding demo data");
    svc.seed().await.map_err(|e| fail(e, &meta))?;
    Ok(Json(OkDto::ok()))
}
