use chrono::{DateTime, Utc};

/// A course. `code` is unique across all courses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    /// 24-character hex ObjectId.
    pub id: String,
    pub title: String,
    pub code: String,
}

/// Fields accepted when creating or replacing a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCourse {
    pub title: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    /// In registration order, at most one entry per course id.
    pub registered_courses: Vec<Registration>,
}

/// Fields accepted when creating a student or updating its profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub name: String,
    pub email: Option<String>,
}

/// Snapshot of a course taken when the student registered. Later edits to
/// the course are not reflected here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub course_id: String,
    pub title: String,
    pub code: String,
    pub registered_at: DateTime<Utc>,
}
