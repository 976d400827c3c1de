use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Course not found: {id}")]
    CourseNotFound { id: String },

    #[error("Student not found: {id}")]
    StudentNotFound { id: String },

    #[error("Course with code '{code}' already exists")]
    CourseCodeExists { code: String },

    #[error("Student {student_id} is already registered for course {course_id}")]
    AlreadyRegistered {
        student_id: String,
        course_id: String,
    },

    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Database error: {message}")]
    Database { message: String },
}

impl DomainError {
    pub fn course_not_found(id: impl Into<String>) -> Self {
        Self::CourseNotFound { id: id.into() }
    }

    pub fn student_not_found(id: impl Into<String>) -> Self {
        Self::StudentNotFound { id: id.into() }
    }

    pub fn course_code_exists(code: impl Into<String>) -> Self {
        Self::CourseCodeExists { code: code.into() }
    }

    pub fn already_registered(student_id: impl Into<String>, course_id: impl Into<String>) -> Self {
        Self::AlreadyRegistered {
            student_id: student_id.into(),
            course_id: course_id.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn database(err: anyhow::Error) -> Self {
        Self::Database {
            message: format!("{err:#}"),
        }
    }
}
