use crate::contract::model::{Course, NewCourse, NewStudent, Registration, Student};
use async_trait::async_trait;

/// Raised by a repository when a write collides with the unique course code.
/// Travels inside `anyhow::Error`; the service downcasts it into a conflict.
#[derive(Debug, thiserror::Error)]
#[error("duplicate key: {0}")]
pub struct DuplicateKey(pub String);

impl DuplicateKey {
    pub fn is(err: &anyhow::Error) -> bool {
        err.downcast_ref::<DuplicateKey>().is_some()
    }
}

/// Persistence port for courses. Ids that are not valid store ids simply match nothing.
#[async_trait]
pub trait CoursesRepository: Send + Sync {
    /// All courses ordered by title.
    async fn list(&self) -> anyhow::Result<Vec<Course>>;
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Course>>;
    /// True if another course (not `except_id`) already uses `code`.
    async fn code_taken(&self, code: &str, except_id: Option<&str>) -> anyhow::Result<bool>;
    /// Store a new course under a freshly generated id.
    async fn insert(&self, course: NewCourse) -> anyhow::Result<Course>;
    /// Replace title and code; `None` if the id is absent.
    async fn update(&self, id: &str, course: NewCourse) -> anyhow::Result<Option<Course>>;
    /// Remove and return the course.
    async fn delete(&self, id: &str) -> anyhow::Result<Option<Course>>;
    /// Drop every course and insert `courses`.
    async fn replace_all(&self, courses: Vec<NewCourse>) -> anyhow::Result<()>;
}

/// Persistence port for students and their embedded registrations.
#[async_trait]
pub trait StudentsRepository: Send + Sync {
    /// Students ordered by name, optionally limited to names containing
    /// `name_filter` (case-insensitive, literal).
    async fn list(&self, name_filter: Option<&str>) -> anyhow::Result<Vec<Student>>;
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Student>>;
    /// Store a new student with no registrations.
    async fn insert(&self, student: NewStudent) -> anyhow::Result<Student>;
    /// Replace name and email, leaving registrations untouched.
    async fn update_profile(&self, id: &str, student: NewStudent)
        -> anyhow::Result<Option<Student>>;
    async fn delete(&self, id: &str) -> anyhow::Result<bool>;
    /// Append `registration` unless the student already holds one for the same
    /// course. `None` when the student is absent or the course was already present.
    async fn push_registration(
        &self,
        id: &str,
        registration: Registration,
    ) -> anyhow::Result<Option<Student>>;
    /// Remove any registration for `course_id`; `None` if the student is absent.
    async fn pull_registration(&self, id: &str, course_id: &str)
        -> anyhow::Result<Option<Student>>;
    /// Remove registrations for `course_id` from every student; returns how many changed.
    async fn pull_course_everywhere(&self, course_id: &str) -> anyhow::Result<u64>;
    /// Drop every student and insert `students`.
    async fn replace_all(&self, students: Vec<NewStudent>) -> anyhow::Result<()>;
}
