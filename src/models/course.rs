// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Course fields loaded alongside mastery records.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CourseSummary {
    pub id: i64,
    pub code: String,
    pub title: String,
}

/// Semester fields loaded alongside mastery records.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SemesterSummary {
    pub id: i64,
    pub name: String,
}
