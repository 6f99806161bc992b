// src/models/progress.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::mastery::CourseMastery;

/// Represents the 'topic_progress' table. One row per (student, topic).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TopicProgress {
    pub id: i64,
    pub student_id: i64,
    pub topic_id: i64,
    pub is_completed: bool,

    /// Set on the first transition to completed and never cleared afterwards.
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,

    /// 0-100.
    pub mastery_level: f64,

    /// Accumulates across updates.
    pub time_spent_minutes: i64,

    pub assessment_result: Option<serde_json::Value>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// The merged state to persist for a (student, topic) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressWrite {
    pub student_id: i64,
    pub topic_id: i64,
    pub is_completed: bool,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub mastery_level: f64,
    pub time_spent_minutes: i64,
    pub assessment_result: Option<serde_json::Value>,
}

/// DTO for recording progress on a topic.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProgressUpdate {
    /// `true` marks the topic complete; `false` or absent leaves completion untouched.
    pub is_completed: Option<bool>,

    #[validate(range(min = 0.0, max = 100.0, message = "Mastery level must be between 0 and 100"))]
    pub mastery_level: Option<f64>,

    /// Minutes to add to the running total.
    #[validate(range(min = 0, max = 1440))]
    pub time_spent_minutes: Option<i64>,

    #[validate(custom(function = validate_payload_size))]
    pub assessment_result: Option<serde_json::Value>,
}

/// Result of the progress workflow.
#[derive(Debug, Serialize)]
pub struct ProgressOutcome {
    pub progress: TopicProgress,
    pub mastery: CourseMastery,

    /// Whether this update moved the topic to completed.
    pub newly_completed: bool,
}

/// Limits an assessment payload to roughly 50KB.
fn validate_payload_size(data: &serde_json::Value) -> Result<(), validator::ValidationError> {
    if data.to_string().len() > 50000 {
        return Err(validator::ValidationError::new("payload_too_large"));
    }
    Ok(())
}
