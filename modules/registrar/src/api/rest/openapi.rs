use modkit::Problem;
use utoipa::OpenApi;

use crate::api::rest::dto::{
    CourseDto, CourseReq, OkDto, RegistrationDto, RegistrationReq, StudentDto, StudentReq,
};
use crate::api::rest::handlers;

/// Paths and schemas published by the registrar module.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_courses,
        handlers::get_course,
        handlers::create_course,
        handlers::update_course,
        handlers::delete_course,
        handlers::list_students,
        handlers::get_student,
        handlers::create_student,
        handlers::update_student,
        handlers::delete_student,
        handlers::register,
        handlers::unregister,
        handlers::seed,
    ),
    components(schemas(
        CourseDto,
        CourseReq,
        StudentDto,
        StudentReq,
        RegistrationDto,
        RegistrationReq,
        OkDto,
        Problem
    )),
    tags(
        (name = "courses", description = "Course catalog"),
        (name = "students", description = "Student records"),
        (name = "registrations", description = "Student course registrations"),
        (name = "seed", description = "Demo data reset")
    )
)]
pub struct RegistrarApi;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = RegistrarApi::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/api/courses",
            "/api/courses/{id}",
            "/api/students",
            "/api/students/{id}",
            "/api/students/{id}/register",
            "/api/students/{id}/unregister",
            "/api/seed",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
        let schemas = doc.components.expect("components").schemas;
        assert!(schemas.contains_key("StudentDto"));
        assert!(schemas.contains_key("Problem"));
    }
}
