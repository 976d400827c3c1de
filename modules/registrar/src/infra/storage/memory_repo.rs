//! In-process repositories with the same observable behavior as the MongoDB
//! ones. Used by `--mock` runs and tests.

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use parking_lot::RwLock;

use crate::contract::model::{Course, NewCourse, NewStudent, Registration, Student};
use crate::domain::repo::{CoursesRepository, DuplicateKey, StudentsRepository};
use crate::infra::storage::entity::parse_id;

fn new_id() -> String {
    ObjectId::new().to_hex()
}

/// Canonical lowercase hex for a lookup id; `None` when it is not an ObjectId,
/// which matches nothing, as in MongoDB.
fn key(id: &str) -> Option<String> {
    parse_id(id).map(|oid| oid.to_hex())
}

#[derive(Default)]
pub struct InMemoryCoursesRepository {
    rows: RwLock<Vec<Course>>,
}

impl InMemoryCoursesRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoursesRepository for InMemoryCoursesRepository {
    async fn list(&self) -> anyhow::Result<Vec<Course>> {
        let mut courses = self.rows.read().clone();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(courses)
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Course>> {
        let Some(id) = key(id) else { return Ok(None) };
        Ok(self.rows.read().iter().find(|c| c.id == id).cloned())
    }

    async fn code_taken(&self, code: &str, except_id: Option<&str>) -> anyhow::Result<bool> {
        let except_id = except_id.and_then(key);
        let except_id = except_id.as_deref();
        Ok(self
            .rows
            .read()
            .iter()
            .any(|c| c.code == code && Some(c.id.as_str()) != except_id))
    }

    async fn insert(&self, course: NewCourse) -> anyhow::Result<Course> {
        let mut rows = self.rows.write();
        if rows.iter().any(|c| c.code == course.code) {
            return Err(DuplicateKey(course.code).into());
        }
        let stored = Course {
            id: new_id(),
            title: course.title,
            code: course.code,
        };
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: &str, course: NewCourse) -> anyhow::Result<Option<Course>> {
        let Some(id) = key(id) else { return Ok(None) };
        let mut rows = self.rows.write();
        if rows.iter().any(|c| c.code == course.code && c.id != id) {
            return Err(DuplicateKey(course.code).into());
        }
        Ok(rows.iter_mut().find(|c| c.id == id).map(|c| {
            c.title = course.title;
            c.code = course.code;
            c.clone()
        }))
    }

    async fn delete(&self, id: &str) -> anyhow::Result<Option<Course>> {
        let Some(id) = key(id) else { return Ok(None) };
        let mut rows = self.rows.write();
        Ok(rows
            .iter()
            .position(|c| c.id == id)
            .map(|pos| rows.remove(pos)))
    }

    async fn replace_all(&self, courses: Vec<NewCourse>) -> anyhow::Result<()> {
        *self.rows.write() = courses
            .into_iter()
            .map(|c| Course {
                id: new_id(),
                title: c.title,
                code: c.code,
            })
            .collect();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryStudentsRepository {
    rows: RwLock<Vec<Student>>,
}

impl InMemoryStudentsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StudentsRepository for InMemoryStudentsRepository {
    async fn list(&self, name_filter: Option<&str>) -> anyhow::Result<Vec<Student>> {
        let needle = name_filter.map(str::to_lowercase);
        let mut students: Vec<Student> = self
            .rows
            .read()
            .iter()
            .filter(|s| match &needle {
                Some(n) => s.name.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        students.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(students)
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Student>> {
        let Some(id) = key(id) else { return Ok(None) };
        Ok(self.rows.read().iter().find(|s| s.id == id).cloned())
    }

    async fn insert(&self, student: NewStudent) -> anyhow::Result<Student> {
        let stored = Student {
            id: new_id(),
            name: student.name,
            email: student.email,
            registered_courses: Vec::new(),
        };
        self.rows.write().push(stored.clone());
        Ok(stored)
    }

    async fn update_profile(
        &self,
        id: &str,
        student: NewStudent,
    ) -> anyhow::Result<Option<Student>> {
        let Some(id) = key(id) else { return Ok(None) };
        Ok(self
            .rows
            .write()
            .iter_mut()
            .find(|s| s.id == id)
            .map(|s| {
                s.name = student.name;
                s.email = student.email;
                s.clone()
            }))
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let Some(id) = key(id) else { return Ok(false) };
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|s| s.id != id);
        Ok(rows.len() != before)
    }

    async fn push_registration(
        &self,
        id: &str,
        registration: Registration,
    ) -> anyhow::Result<Option<Student>> {
        let Some(id) = key(id) else { return Ok(None) };
        let mut rows = self.rows.write();
        let Some(student) = rows.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if student
            .registered_courses
            .iter()
            .any(|r| r.course_id == registration.course_id)
        {
            return Ok(None);
        }
        student.registered_courses.push(registration);
        Ok(Some(student.clone()))
    }

    async fn pull_registration(
        &self,
        id: &str,
        course_id: &str,
    ) -> anyhow::Result<Option<Student>> {
        let Some(id) = key(id) else { return Ok(None) };
        Ok(self
            .rows
            .write()
            .iter_mut()
            .find(|s| s.id == id)
            .map(|s| {
                s.registered_courses.retain(|r| r.course_id != course_id);
                s.clone()
            }))
    }

    async fn pull_course_everywhere(&self, course_id: &str) -> anyhow::Result<u64> {
        let mut changed = 0;
        for student in self.rows.write().iter_mut() {
            let before = student.registered_courses.len();
            student
                .registered_courses
                .retain(|r| r.course_id != course_id);
            if student.registered_courses.len() != before {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn replace_all(&self, students: Vec<NewStudent>) -> anyhow::Result<()> {
        *self.rows.write() = students
            .into_iter()
            .map(|s| Student {
                id: new_id(),
                name: s.name,
                email: s.email,
                registered_courses: Vec::new(),
            })
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn registration(course_id: &str) -> Registration {
        Registration {
            course_id: course_id.to_string(),
            title: "Algorithms".into(),
            code: "CS301".into(),
            registered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_code_with_marker() {
        let repo = InMemoryCoursesRepository::new();
        let course = NewCourse {
            title: "A".into(),
            code: "CS101".into(),
        };
        repo.insert(course.clone()).await.unwrap();

        let err = repo.insert(course).await.unwrap_err();
        assert!(DuplicateKey::is(&err));
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ids_look_like_object_ids() {
        let repo = InMemoryStudentsRepository::new();
        let s = repo
            .insert(NewStudent {
                name: "Ada".into(),
                email: None,
            })
            .await
            .unwrap();
        assert_eq!(s.id.len(), 24);
        assert!(ObjectId::parse_str(&s.id).is_ok());
    }

    #[tokio::test]
    async fn lookups_accept_any_hex_case_and_reject_malformed_ids() {
        let courses = InMemoryCoursesRepository::new();
        let c = courses
            .insert(NewCourse {
                title: "A".into(),
                code: "CS101".into(),
            })
            .await
            .unwrap();
        let upper = c.id.to_uppercase();

        assert_eq!(courses.find_by_id(&upper).await.unwrap().unwrap().id, c.id);
        assert!(courses.find_by_id("not-an-id").await.unwrap().is_none());

        let students = InMemoryStudentsRepository::new();
        let s = students
            .insert(NewStudent {
                name: "Ada".into(),
                email: None,
            })
            .await
            .unwrap();
        let pushed = students
            .push_registration(&s.id.to_uppercase(), registration(&c.id))
            .await
            .unwrap();
        assert!(pushed.is_some());
        assert!(students.delete(&s.id.to_uppercase()).await.unwrap());
        assert!(courses.delete(&upper).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn push_is_conditional_on_course_absence() {
        let repo = InMemoryStudentsRepository::new();
        let s = repo
            .insert(NewStudent {
                name: "Ada".into(),
                email: None,
            })
            .await
            .unwrap();

        assert!(repo.push_registration(&s.id, registration("c1")).await.unwrap().is_some());
        assert!(repo.push_registration(&s.id, registration("c1")).await.unwrap().is_none());
        assert!(repo.push_registration("missing", registration("c1")).await.unwrap().is_none());

        let stored = repo.find_by_id(&s.id).await.unwrap().unwrap();
        assert_eq!(stored.registered_courses.len(), 1);
    }

    #[tokio::test]
    async fn pull_course_everywhere_counts_changed_students() {
        let repo = InMemoryStudentsRepository::new();
        let mut ids = Vec::new();
        for name in ["A", "B", "C"] {
            let s = repo
                .insert(NewStudent {
                    name: name.into(),
                    email: None,
                })
                .await
                .unwrap();
            ids.push(s.id);
        }
        repo.push_registration(&ids[0], registration("c1")).await.unwrap();
        repo.push_registration(&ids[1], registration("c1")).await.unwrap();
        repo.push_registration(&ids[1], registration("c2")).await.unwrap();

        assert_eq!(repo.pull_course_everywhere("c1").await.unwrap(), 2);
        let b = repo.find_by_id(&ids[1]).await.unwrap().unwrap();
        assert_eq!(b.registered_courses.len(), 1);
        assert_eq!(b.registered_courses[0].course_id, "c2");
    }
}
