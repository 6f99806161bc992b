// src/models/assessment.rs

use serde::{Deserialize, Serialize};

/// `assessments.kind` value whose submissions count towards the assignment average.
pub const ASSIGNMENT_KIND: &str = "assignment";

/// A quiz attempt, flattened with the offering its quiz belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub student_id: i64,
    pub course_id: i64,
    pub semester_id: i64,

    /// Missing scores still count as an attempt.
    pub score: Option<f64>,
}

/// A submission, flattened with the offering and kind of its assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub student_id: i64,
    pub course_id: i64,
    pub semester_id: i64,
    pub kind: String,
    pub marks: Option<f64>,
}

impl Submission {
    pub fn is_assignment(&self) -> bool {
        self.kind == ASSIGNMENT_KIND
    }
}
