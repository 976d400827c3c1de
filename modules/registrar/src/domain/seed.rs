use crate::contract::model::{NewCourse, NewStudent};

const COURSES: &[(&str, &str)] = &[
    ("Intro to Programming", "CS101"),
    ("Data Structures", "CS201"),
    ("Web Development", "WEB101"),
    ("Databases", "DB101"),
    ("Operating Systems", "OS201"),
];

const STUDENTS: &[(&str, &str)] = &[
    ("Majd Kassem", "majd@example.com"),
    ("Maradona", "maradona@example.com"),
    ("Elon Musk", "Elon@example.com"),
    ("John doe", "jd@example.com"),
];

/// Demo courses restored by a reset.
pub fn demo_courses() -> Vec<NewCourse> {
    COURSES
        .iter()
        .map(|(title, code)| NewCourse {
            title: (*title).to_string(),
            code: (*code).to_string(),
        })
        .collect()
}

/// Demo students restored by a reset, all without registrations.
pub fn demo_students() -> Vec<NewStudent> {
    STUDENTS
        .iter()
        .map(|(name, email)| NewStudent {
            name: (*name).to_string(),
            email: Some((*email).to_string()),
        })
        .collect()
}
