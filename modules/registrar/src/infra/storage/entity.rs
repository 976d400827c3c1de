//! Stored document shapes and their mapping to contract models.

use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::contract::model::{Course, Registration, Student};

pub const COURSES: &str = "courses";
pub const STUDENTS: &str = "students";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub registered_courses: Vec<RegistrationDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDoc {
    pub course_id: String,
    pub title: String,
    pub code: String,
    pub registered_at: bson::DateTime,
}

/// Parses a hex id; `None` for anything that is not a valid ObjectId.
pub fn parse_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

impl From<CourseDoc> for Course {
    fn from(d: CourseDoc) -> Self {
        Self {
            id: d.id.to_hex(),
            title: d.title,
            code: d.code,
        }
    }
}

impl From<StudentDoc> for Student {
    fn from(d: StudentDoc) -> Self {
        Self {
            id: d.id.to_hex(),
            name: d.name,
            email: d.email,
            registered_courses: d.registered_courses.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<RegistrationDoc> for Registration {
    fn from(d: RegistrationDoc) -> Self {
        let millis = d.registered_at.timestamp_millis();
        Self {
            course_id: d.course_id,
            title: d.title,
            code: d.code,
            registered_at: DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default(),
        }
    }
}

impl From<&Registration> for RegistrationDoc {
    fn from(r: &Registration) -> Self {
        Self {
            course_id: r.course_id.clone(),
            title: r.title.clone(),
            code: r.code.clone(),
            registered_at: bson::DateTime::from_millis(r.registered_at.timestamp_millis()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_doc_uses_wire_field_names() {
        let doc = StudentDoc {
            id: ObjectId::new(),
            name: "Ada".into(),
            email: None,
            registered_courses: vec![RegistrationDoc {
                course_id: ObjectId::new().to_hex(),
                title: "Algorithms".into(),
                code: "CS301".into(),
                registered_at: bson::DateTime::now(),
            }],
        };
        let stored = bson::to_document(&doc).unwrap();
        assert!(stored.contains_key("_id"));
        assert!(stored.get("email").unwrap().as_null().is_some());
        let regs = stored.get_array("registeredCourses").unwrap();
        let first = regs[0].as_document().unwrap();
        assert!(first.contains_key("courseId"));
        assert!(first.get_datetime("registeredAt").is_ok());
    }

    #[test]
    fn registration_time_survives_mapping_at_millisecond_precision() {
        let at = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap();
        let reg = Registration {
            course_id: "c".into(),
            title: "t".into(),
            code: "k".into(),
            registered_at: at,
        };
        let back: Registration = RegistrationDoc::from(&reg).into();
        assert_eq!(back, reg);
    }

    #[test]
    fn malformed_ids_do_not_parse() {
        assert!(parse_id("not-an-id").is_none());
        assert!(parse_id("").is_none());
        assert!(parse_id(&ObjectId::new().to_hex()).is_some());
    }
}
