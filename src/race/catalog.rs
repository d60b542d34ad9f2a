//! Course catalog: the pool a new match draws its shared course from.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;

use crate::race::course::{Course, CourseError};
use crate::race::types::Cursor;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read course file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse course file: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidCourse(#[from] CourseError),
    #[error("course file contains no course")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct CourseCatalog {
    courses: Vec<Arc<Course>>,
}

impl CourseCatalog {
    /// Build a catalog from validated courses.
    pub fn new(courses: Vec<Course>) -> Result<Self, CatalogError> {
        if courses.is_empty() {
            return Err(CatalogError::Empty);
        }
        for course in &courses {
            course.validate()?;
        }
        Ok(Self { courses: courses.into_iter().map(Arc::new).collect() })
    }

    /// Load a JSON array of courses.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)?;
        let courses: Vec<Course> = serde_json::from_str(&raw)?;
        Self::new(courses)
    }

    pub fn builtin() -> Self {
        let courses = vec![
            Course::motion(
                "motion-fn-body",
                "Into the function body",
                &["fn main() {", "    let total = 40 + 2;", "    println!(\"{}\", total);", "}"],
                Cursor::new(0, 0),
                Cursor::new(2, 19),
            ),
            Course::motion(
                "motion-list-end",
                "Last item",
                &["- alpha", "- beta", "", "- gamma", "- delta"],
                Cursor::new(0, 2),
                Cursor::new(4, 6),
            ),
            Course::typing("typing-fox", "Quick fox", "the quick brown fox jumps over the lazy dog"),
            Course::typing("typing-borrow", "Borrow checker", "let r = &mut v; r.push(1);"),
        ];
        Self { courses: courses.into_iter().map(Arc::new).collect() }
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    /// Pick a course at random.
    pub fn pick(&self) -> Arc<Course> {
        // Never empty: both constructors refuse an empty list.
        let idx = rand::rng().random_range(0..self.courses.len());
        self.courses[idx].clone()
    }
}
