use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::contract::model::{Course, NewCourse, NewStudent, Registration, Student};

/// Course as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CourseDto {
    /// 24-character hex id.
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub code: String,
}

/// Student with its registrations.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentDto {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    /// `null` when the student has no email.
    pub email: Option<String>,
    pub registered_courses: Vec<RegistrationDto>,
}

/// Course snapshot taken at registration time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDto {
    pub course_id: String,
    pub title: String,
    pub code: String,
    pub registered_at: DateTime<Utc>,
}

/// Body for course create and update. Missing fields are reported as validation errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CourseReq {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// Body for student create and update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StudentReq {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Body for register and unregister.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationReq {
    #[serde(default)]
    pub course_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OkDto {
    pub ok: bool,
}

impl OkDto {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListStudentsQuery {
    /// Case-insensitive substring of the student name.
    pub name: Option<String>,
}

impl From<Course> for CourseDto {
    fn from(c: Course) -> Self {
        Self {
            id: c.id,
            title: c.title,
            code: c.code,
        }
    }
}

impl From<Student> for StudentDto {
    fn from(s: Student) -> Self {
        Self {
            id: s.id,
            name: s.name,
            email: s.email,
            registered_courses: s.registered_courses.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Registration> for RegistrationDto {
    fn from(r: Registration) -> Self {
        Self {
            course_id: r.course_id,
            title: r.title,
            code: r.code,
            registered_at: r.registered_at,
        }
    }
}

impl From<CourseReq> for NewCourse {
    fn from(req: CourseReq) -> Self {
        Self {
            title: req.title.unwrap_or_default(),
            code: req.code.unwrap_or_default(),
        }
    }
}

impl From<StudentReq> for NewStudent {
    fn from(req: StudentReq) -> Self {
        Self {
            name: req.name.unwrap_or_default(),
            email: req.email,
        }
    }
}
