// src/models/topic.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Difficulty tier of a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// Represents the 'topics' table: one unit of course content in an ordered syllabus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub course_id: i64,
    pub semester_id: i64,
    pub title: String,

    /// Sanitised HTML body.
    pub description: Option<String>,

    /// 1-based position, unique within the course offering.
    pub order_index: i32,

    pub duration_hours: f64,
    pub difficulty: Difficulty,

    /// Cleared instead of deleting once progress references the topic.
    pub is_active: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// A topic ready to be inserted, with its order index already resolved.
#[derive(Debug, Clone)]
pub struct NewTopic {
    pub course_id: i64,
    pub semester_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub duration_hours: f64,
    pub difficulty: Difficulty,
}

/// DTO for creating a topic. Omitting `order_index` appends the topic.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTopicRequest {
    pub course_id: i64,
    pub semester_id: i64,
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(max = 20000))]
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Order index must be positive"))]
    pub order_index: Option<i32>,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub duration_hours: Option<f64>,
    pub difficulty: Option<Difficulty>,
}

/// DTO for updating a topic. Fields are optional; ordering goes through reorder.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTopicRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 20000))]
    pub description: Option<String>,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub duration_hours: Option<f64>,
    pub difficulty: Option<Difficulty>,
    pub is_active: Option<bool>,
}

impl UpdateTopicRequest {
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.duration_hours.is_none()
            && self.difficulty.is_none()
            && self.is_active.is_none()
    }
}

/// DTO for reordering every topic of a course offering.
#[derive(Debug, Deserialize)]
pub struct ReorderTopicsRequest {
    pub course_id: i64,
    pub semester_id: i64,

    /// Topic ids in their new order; position `i` receives order index `i + 1`.
    pub topic_ids: Vec<i64>,
}

/// Query parameters for listing topics.
#[derive(Debug, Deserialize)]
pub struct ListTopicsParams {
    pub course_id: i64,
    pub semester_id: i64,
    #[serde(default)]
    pub include_inactive: bool,
}

/// Which branch `delete_topic` took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Progress referenced the topic, so it was only marked inactive.
    Deactivated,
    Deleted,
}
