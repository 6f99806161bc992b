// src/models/mastery.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{
    course::{CourseSummary, SemesterSummary},
    user::StudentSummary,
};

/// Uniqueness key of a mastery record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MasteryKey {
    pub student_id: i64,
    pub course_id: i64,
    pub semester_id: i64,
}

/// Represents the 'course_mastery' table.
/// A derived rollup; rewritten wholesale on every recalculation.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CourseMastery {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub semester_id: i64,
    pub mastery_level: f64,
    pub quiz_average: f64,
    pub assignment_average: f64,
    pub topic_completion_percentage: f64,
    pub total_topics_completed: i64,
    pub total_topics: i64,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl CourseMastery {
    /// The computed values, without identity or timestamp.
    pub const fn values(&self) -> MasteryValues {
        MasteryValues {
            mastery_level: self.mastery_level,
            quiz_average: self.quiz_average,
            assignment_average: self.assignment_average,
            topic_completion_percentage: self.topic_completion_percentage,
            total_topics_completed: self.total_topics_completed,
            total_topics: self.total_topics,
        }
    }
}

/// The values a recalculation produces for one key.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MasteryValues {
    pub mastery_level: f64,
    pub quiz_average: f64,
    pub assignment_average: f64,
    pub topic_completion_percentage: f64,
    pub total_topics_completed: i64,
    pub total_topics: i64,
}

/// A mastery record with its student, course and semester loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MasteryDetail {
    #[serde(flatten)]
    pub mastery: CourseMastery,
    pub student: StudentSummary,
    pub course: CourseSummary,
    pub semester: SemesterSummary,
}

/// Band a mastery level falls into. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryBand {
    /// Below 25.
    Low,
    /// 25 up to 50.
    Medium,
    /// 50 up to 75.
    High,
    /// 75 and above.
    Mastered,
}

impl MasteryBand {
    pub fn from_level(level: f64) -> Self {
        if level >= 75.0 {
            Self::Mastered
        } else if level >= 50.0 {
            Self::High
        } else if level >= 25.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Per-band student counts. Every band is always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MasteryDistribution {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub mastered: i64,
}

impl MasteryDistribution {
    pub fn record(&mut self, level: f64) {
        match MasteryBand::from_level(level) {
            MasteryBand::Low => self.low += 1,
            MasteryBand::Medium => self.medium += 1,
            MasteryBand::High => self.high += 1,
            MasteryBand::Mastered => self.mastered += 1,
        }
    }
}

/// Cohort-wide statistics for a course offering.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MasteryStatistics {
    pub total_students: i64,
    pub average_mastery_level: f64,
    pub average_quiz_score: f64,
    pub average_assignment_score: f64,
    pub average_completion_rate: f64,
    pub distribution: MasteryDistribution,
}

/// Query parameters / body naming a course offering.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OfferingParams {
    pub course_id: i64,
    pub semester_id: i64,
}

/// Query parameters for a student's mastery history.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub semester_id: Option<i64>,
}
