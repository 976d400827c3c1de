//! MongoDB adapters for the repository ports.

use anyhow::Context;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, to_bson, Document},
    options::{IndexOptions, ReturnDocument},
    Collection, IndexModel,
};
use modkit_db::DbHandle;

use crate::contract::model::{Course, NewCourse, NewStudent, Registration, Student};
use crate::domain::repo::{CoursesRepository, DuplicateKey, StudentsRepository};
use crate::infra::storage::entity::{
    parse_id, CourseDoc, RegistrationDoc, StudentDoc, COURSES, STUDENTS,
};

/// Creates the unique index on `courses.code`. Idempotent.
pub async fn ensure_indexes(db: &DbHandle) -> anyhow::Result<()> {
    let index = IndexModel::builder()
        .keys(doc! { "code": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();
    db.collection::<CourseDoc>(COURSES)
        .create_index(index)
        .await
        .context("creating unique index on courses.code")?;
    Ok(())
}

fn by_id(id: ObjectId) -> Document {
    doc! { "_id": id }
}

fn map_write_error(err: mongodb::error::Error, key: &str) -> anyhow::Error {
    if modkit_db::is_duplicate_key(&err) {
        DuplicateKey(key.to_string()).into()
    } else {
        anyhow::Error::new(err)
    }
}

pub struct MongoCoursesRepository {
    coll: Collection<CourseDoc>,
}

impl MongoCoursesRepository {
    pub fn new(db: &DbHandle) -> Self {
        Self {
            coll: db.collection(COURSES),
        }
    }
}

#[async_trait]
impl CoursesRepository for MongoCoursesRepository {
    async fn list(&self) -> anyhow::Result<Vec<Course>> {
        let docs: Vec<CourseDoc> = self
            .coll
            .find(doc! {})
            .sort(doc! { "title": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(Into::into).collect())
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Course>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        Ok(self.coll.find_one(by_id(oid)).await?.map(Into::into))
    }

    async fn code_taken(&self, code: &str, except_id: Option<&str>) -> anyhow::Result<bool> {
        let mut filter = doc! { "code": code };
        if let Some(oid) = except_id.and_then(parse_id) {
            filter.insert("_id", doc! { "$ne": oid });
        }
        Ok(self.coll.find_one(filter).await?.is_some())
    }

    async fn insert(&self, course: NewCourse) -> anyhow::Result<Course> {
        let doc = CourseDoc {
            id: ObjectId::new(),
            title: course.title,
            code: course.code,
        };
        self.coll
            .insert_one(&doc)
            .await
            .map_err(|e| map_write_error(e, &doc.code))?;
        Ok(doc.into())
    }

    async fn update(&self, id: &str, course: NewCourse) -> anyhow::Result<Option<Course>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let updated = self
            .coll
            .find_one_and_update(
                by_id(oid),
                doc! { "$set": { "title": course.title.as_str(), "code": course.code.as_str() } },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| map_write_error(e, &course.code))?;
        Ok(updated.map(Into::into))
    }

    async fn delete(&self, id: &str) -> anyhow::Result<Option<Course>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        Ok(self.coll.find_one_and_delete(by_id(oid)).await?.map(Into::into))
    }

    async fn replace_all(&self, courses: Vec<NewCourse>) -> anyhow::Result<()> {
        self.coll.delete_many(doc! {}).await?;
        let docs: Vec<CourseDoc> = courses
            .into_iter()
            .map(|c| CourseDoc {
                id: ObjectId::new(),
                title: c.title,
                code: c.code,
            })
            .collect();
        if !docs.is_empty() {
            self.coll.insert_many(docs).await?;
        }
        Ok(())
    }
}

pub struct MongoStudentsRepository {
    coll: Collection<StudentDoc>,
}

impl MongoStudentsRepository {
    pub fn new(db: &DbHandle) -> Self {
        Self {
            coll: db.collection(STUDENTS),
        }
    }
}

#[async_trait]
impl StudentsRepository for MongoStudentsRepository {
    async fn list(&self, name_filter: Option<&str>) -> anyhow::Result<Vec<Student>> {
        let filter = match name_filter {
            Some(term) => doc! { "name": { "$regex": regex::escape(term), "$options": "i" } },
            None => doc! {},
        };
        let docs: Vec<StudentDoc> = self
            .coll
            .find(filter)
            .sort(doc! { "name": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(docs.into_iter().map(Into::into).collect())
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<Student>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        Ok(self.coll.find_one(by_id(oid)).await?.map(Into::into))
    }

    async fn insert(&self, student: NewStudent) -> anyhow::Result<Student> {
        let doc = StudentDoc {
            id: ObjectId::new(),
            name: student.name,
            email: student.email,
            registered_courses: Vec::new(),
        };
        self.coll.insert_one(&doc).await?;
        Ok(doc.into())
    }

    async fn update_profile(
        &self,
        id: &str,
        student: NewStudent,
    ) -> anyhow::Result<Option<Student>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let updated = self
            .coll
            .find_one_and_update(
                by_id(oid),
                doc! { "$set": { "name": student.name.as_str(), "email": student.email.clone() } },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated.map(Into::into))
    }

    async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let Some(oid) = parse_id(id) else {
            return Ok(false);
        };
        Ok(self.coll.delete_one(by_id(oid)).await?.deleted_count > 0)
    }

    async fn push_registration(
        &self,
        id: &str,
        registration: Registration,
    ) -> anyhow::Result<Option<Student>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let entry = to_bson(&RegistrationDoc::from(&registration))?;
        let updated = self
            .coll
            .find_one_and_update(
                doc! {
                    "_id": oid,
                    "registeredCourses.courseId": { "$ne": registration.course_id.as_str() },
                },
                doc! { "$push": { "registeredCourses": entry } },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated.map(Into::into))
    }

    async fn pull_registration(
        &self,
        id: &str,
        course_id: &str,
    ) -> anyhow::Result<Option<Student>> {
        let Some(oid) = parse_id(id) else {
            return Ok(None);
        };
        let updated = self
            .coll
            .find_one_and_update(
                by_id(oid),
                doc! { "$pull": { "registeredCourses": { "courseId": course_id } } },
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated.map(Into::into))
    }

    async fn pull_course_everywhere(&self, course_id: &str) -> anyhow::Result<u64> {
        let result = self
            .coll
            .update_many(
                doc! { "registeredCourses.courseId": course_id },
                doc! { "$pull": { "registeredCourses": { "courseId": course_id } } },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn replace_all(&self, students: Vec<NewStudent>) -> anyhow::Result<()> {
        self.coll.delete_many(doc! {}).await?;
        let docs: Vec<StudentDoc> = students
            .into_iter()
            .map(|s| StudentDoc {
                id: ObjectId::new(),
                name: s.name,
                email: s.email,
                registered_courses: Vec::new(),
            })
            .collect();
        if !docs.is_empty() {
            self.coll.insert_many(docs).await?;
        }
        Ok(())
    }
}
