use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::contract::model::{Course, NewCourse, NewStudent, Registration, Student};
use crate::domain::error::DomainError;
use crate::domain::repo::{CoursesRepository, DuplicateKey, StudentsRepository};
use crate::domain::seed;

/// Business rules for courses, students and registrations.
/// Depends only on the repository ports, not on infra types.
#[derive(Clone)]
pub struct Service {
    courses: Arc<dyn CoursesRepository>,
    students: Arc<dyn StudentsRepository>,
    config: ServiceConfig,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// `None` accepts any length.
    pub max_name_length: Option<usize>,
}

impl Service {
    pub fn new(
        courses: Arc<dyn CoursesRepository>,
        students: Arc<dyn StudentsRepository>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            courses,
            students,
            config,
        }
    }

    // --- courses ---

    #[instrument(name = "registrar.service.list_courses", skip(self))]
    pub async fn list_courses(&self) -> Result<Vec<Course>, DomainError> {
        let courses = self.courses.list().await.map_err(DomainError::database)?;
        debug!(count = courses.len(), "Listed courses");
        Ok(courses)
    }

    #[instrument(name = "registrar.service.get_course", skip(self))]
    pub async fn get_course(&self, id: &str) -> Result<Course, DomainError> {
        self.courses
            .find_by_id(id)
            .await
            .map_err(DomainError::database)?
            .ok_or_else(|| DomainError::course_not_found(id))
    }

    #[instrument(
        name = "registrar.service.create_course",
        skip(self, input),
        fields(code = %input.code)
    )]
    pub async fn create_course(&self, input: NewCourse) -> Result<Course, DomainError> {
        let input = self.validate_course(input)?;

        if self
            .courses
            .code_taken(&input.code, None)
            .await
            .map_err(DomainError::database)?
        {
            return Err(DomainError::course_code_exists(input.code));
        }

        let code = input.code.clone();
        let course = self
            .courses
            .insert(input)
            .await
            .map_err(|e| duplicate_code_or_database(e, &code))?;

        info!(course_id = %course.id, "Created course");
        Ok(course)
    }

    #[instrument(
        name = "registrar.service.update_course",
        skip(self, input),
        fields(code = %input.code)
    )]
    pub async fn update_course(&self, id: &str, input: NewCourse) -> Result<Course, DomainError> {
        let input = self.validate_course(input)?;

        let current = self.get_course(id).await?;
        if self
            .courses
            .code_taken(&input.code, Some(&current.id))
            .await
            .map_err(DomainError::database)?
        {
            return Err(DomainError::course_code_exists(input.code));
        }

        let code = input.code.clone();
        let updated = self
            .courses
            .update(&current.id, input)
            .await
            .map_err(|e| duplicate_code_or_database(e, &code))?
            .ok_or_else(|| DomainError::course_not_found(id))?;

        info!("Updated course");
        Ok(updated)
    }

    /// Deletes the course, then strips its registrations from every student.
    /// The two steps are not atomic.
    #[instrument(name = "registrar.service.delete_course", skip(self))]
    pub async fn delete_course(&self, id: &str) -> Result<(), DomainError> {
        let deleted = self
            .courses
            .delete(id)
            .await
            .map_err(DomainError::database)?
            .ok_or_else(|| DomainError::course_not_found(id))?;

        match self.students.pull_course_everywhere(&deleted.id).await {
            Ok(changed) => {
                info!(students_updated = changed, "Deleted course and its registrations");
                Ok(())
            }
            Err(e) => {
                warn!(course_id = %deleted.id, "Course deleted but registrations were not cleaned up");
                Err(DomainError::database(e))
            }
        }
    }

    // --- students ---

    #[instrument(name = "registrar.service.list_students", skip(self))]
    pub async fn list_students(&self, name_filter: Option<&str>) -> Result<Vec<Student>, DomainError> {
        let filter = name_filter.filter(|s| !s.is_empty());
        let students = self
            .students
            .list(filter)
            .await
            .map_err(DomainError::database)?;
        debug!(count = students.len(), "Listed students");
        Ok(students)
    }

    #[instrument(name = "registrar.service.get_student", skip(self))]
    pub async fn get_student(&self, id: &str) -> Result<Student, DomainError> {
        self.students
            .find_by_id(id)
            .await
            .map_err(DomainError::database)?
            .ok_or_else(|| DomainError::student_not_found(id))
    }

    #[instrument(name = "registrar.service.create_student", skip(self, input))]
    pub async fn create_student(&self, input: NewStudent) -> Result<Student, DomainError> {
        let input = self.validate_student(input)?;
        let student = self
            .students
            .insert(input)
            .await
            .map_err(DomainError::database)?;
        info!(student_id = %student.id, "Created student");
        Ok(student)
    }

    #[instrument(name = "registrar.service.update_student", skip(self, input))]
    pub async fn update_student(&self, id: &str, input: NewStudent) -> Result<Student, DomainError> {
        let input = self.validate_student(input)?;
        let student = self
            .students
            .update_profile(id, input)
            .await
            .map_err(DomainError::database)?
            .ok_or_else(|| DomainError::student_not_found(id))?;
        info!("Updated student");
        Ok(student)
    }

    #[instrument(name = "registrar.service.delete_student", skip(self))]
    pub async fn delete_student(&self, id: &str) -> Result<(), DomainError> {
        if !self
            .students
            .delete(id)
            .await
            .map_err(DomainError::database)?
        {
            return Err(DomainError::student_not_found(id));
        }
        info!("Deleted student");
        Ok(())
    }

    // --- registrations ---

    /// Appends a snapshot of the course to the student's registrations.
    #[instrument(name = "registrar.service.register", skip(self))]
    pub async fn register(&self, student_id: &str, course_id: &str) -> Result<Student, DomainError> {
        let course_id = required("courseId", course_id)?;
        let student = self.get_student(student_id).await?;
        let course = self.get_course(&course_id).await?;

        if student
            .registered_courses
            .iter()
            .any(|r| r.course_id == course.id)
        {
            return Err(DomainError::already_registered(&student.id, &course.id));
        }

        let registration = Registration {
            course_id: course.id.clone(),
            title: course.title,
            code: course.code,
            registered_at: now_millis(),
        };

        match self
            .students
            .push_registration(&student.id, registration)
            .await
            .map_err(DomainError::database)?
        {
            Some(updated) => {
                info!(course_id = %course.id, "Registered student for course");
                Ok(updated)
            }
            // Lost a race: either the student vanished or the same course was pushed concurrently
            None => match self.students.find_by_id(&student.id).await {
                Ok(Some(_)) => Err(DomainError::already_registered(&student.id, &course.id)),
                Ok(None) => Err(DomainError::student_not_found(student_id)),
                Err(e) => Err(DomainError::database(e)),
            },
        }
    }

    /// Removes the course from the student's registrations; a no-op if absent.
    #[instrument(name = "registrar.service.unregister", skip(self))]
    pub async fn unregister(&self, student_id: &str, course_id: &str) -> Result<Student, DomainError> {
        let course_id = required("courseId", course_id)?;
        let student = self
            .students
            .pull_registration(student_id, &course_id)
            .await
            .map_err(DomainError::database)?
            .ok_or_else(|| DomainError::student_not_found(student_id))?;
        info!("Unregistered student from course");
        Ok(student)
    }

    // --- seed ---

    /// Replaces all data with the fixed demo set.
    #[instrument(name = "registrar.service.seed", skip(self))]
    pub async fn seed(&self) -> Result<(), DomainError> {
        let courses = seed::demo_courses();
        let students = seed::demo_students();
        let (course_count, student_count) = (courses.len(), students.len());

        self.courses
            .replace_all(courses)
            .await
            .map_err(DomainError::database)?;
        self.students
            .replace_all(students)
            .await
            .map_err(DomainError::database)?;

        info!(courses = course_count, students = student_count, "Reset demo data");
        Ok(())
    }

    // --- validation helpers ---

    fn validate_course(&self, input: NewCourse) -> Result<NewCourse, DomainError> {
        Ok(NewCourse {
            title: self.bounded("title", &input.title)?,
            code: self.bounded("code", &input.code)?,
        })
    }

    fn validate_student(&self, input: NewStudent) -> Result<NewStudent, DomainError> {
        let email = input.email.filter(|e| !e.trim().is_empty());
        Ok(NewStudent {
            name: self.bounded("name", &input.name)?,
            email,
        })
    }

    fn bounded(&self, field: &str, value: &str) -> Result<String, DomainError> {
        let value = required(field, value)?;
        if let Some(max) = self.config.max_name_length {
            let len = value.chars().count();
            if len > max {
                return Err(DomainError::validation(
                    field,
                    format!("must be at most {max} characters (got {len})"),
                ));
            }
        }
        Ok(value)
    }
}

/// The value as sent, or a validation error when it is blank.
fn required(field: &str, value: &str) -> Result<String, DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "is required"));
    }
    Ok(value.to_string())
}

fn duplicate_code_or_database(err: anyhow::Error, code: &str) -> DomainError {
    if DuplicateKey::is(&err) {
        DomainError::course_code_exists(code)
    } else {
        DomainError::database(err)
    }
}

/// Current time at the store's millisecond precision.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_keeps_value_and_rejects_blank() {
        assert_eq!(required("title", "  Algorithms ").unwrap(), "  Algorithms ");
        assert!(matches!(
            required("title", "   "),
            Err(DomainError::Validation { field, .. }) if field == "title"
        ));
    }

    #[test]
    fn now_millis_drops_sub_millisecond_precision() {
        let t = now_millis();
        assert_eq!(t.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
