// src/store/mod.rs

//! Storage ports for the mastery subsystem.
//!
//! Services take a store handle explicitly; `PgStore` backs production and
//! `InMemoryStore` backs tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    mastery::{CourseMastery, MasteryDetail, MasteryKey, MasteryValues},
    progress::{ProgressWrite, TopicProgress},
    topic::{NewTopic, Topic, UpdateTopicRequest},
};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Errors raised by storage adapters.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    UniqueViolation(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Course topics and their ordering.
#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Topics of a course offering ordered by `order_index`.
    async fn list_topics(
        &self,
        course_id: i64,
        semester_id: i64,
        include_inactive: bool,
    ) -> Result<Vec<Topic>, StoreError>;

    async fn find_topic(&self, topic_id: i64) -> Result<Option<Topic>, StoreError>;

    /// Highest order index in the offering, counting inactive topics.
    async fn max_order_index(
        &self,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Option<i32>, StoreError>;

    async fn insert_topic(&self, topic: &NewTopic) -> Result<Topic, StoreError>;

    async fn update_topic(
        &self,
        topic_id: i64,
        changes: &UpdateTopicRequest,
    ) -> Result<Option<Topic>, StoreError>;

    /// Assigns `i + 1` to `ordered_ids[i]` atomically.
    async fn apply_topic_order(
        &self,
        course_id: i64,
        semester_id: i64,
        ordered_ids: &[i64],
    ) -> Result<(), StoreError>;

    /// Number of progress records referencing the topic.
    async fn count_topic_progress(&self, topic_id: i64) -> Result<i64, StoreError>;

    /// Returns `false` if the topic does not exist.
    async fn deactivate_topic(&self, topic_id: i64) -> Result<bool, StoreError>;

    /// Returns `false` if the topic does not exist.
    async fn delete_topic(&self, topic_id: i64) -> Result<bool, StoreError>;
}

/// Per-student topic progress.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// The student's progress restricted to `topic_ids`, ordered by topic id.
    async fn find_progress(
        &self,
        student_id: i64,
        topic_ids: &[i64],
    ) -> Result<Vec<TopicProgress>, StoreError>;

    async fn find_progress_entry(
        &self,
        student_id: i64,
        topic_id: i64,
    ) -> Result<Option<TopicProgress>, StoreError>;

    /// Create-or-replace keyed on (student, topic).
    async fn upsert_progress(&self, write: &ProgressWrite) -> Result<TopicProgress, StoreError>;
}

/// Read-only view of quiz and assignment results.
#[async_trait]
pub trait AssessmentRepository: Send + Sync {
    /// One entry per quiz attempt in the offering; `None` for unscored attempts.
    async fn quiz_scores(
        &self,
        student_id: i64,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Vec<Option<f64>>, StoreError>;

    /// One entry per assignment-kind submission in the offering.
    async fn assignment_marks(
        &self,
        student_id: i64,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Vec<Option<f64>>, StoreError>;
}

/// Derived mastery records.
#[async_trait]
pub trait MasteryRepository: Send + Sync {
    /// Create-or-replace keyed on (student, course, semester).
    async fn upsert_mastery(
        &self,
        key: MasteryKey,
        values: &MasteryValues,
        updated_at: DateTime<Utc>,
    ) -> Result<CourseMastery, StoreError>;

    async fn list_mastery_records(
        &self,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Vec<CourseMastery>, StoreError>;

    async fn find_mastery_detail(
        &self,
        key: MasteryKey,
    ) -> Result<Option<MasteryDetail>, StoreError>;

    /// Sorted by mastery level descending, then student id.
    async fn list_cohort_details(
        &self,
        course_id: i64,
        semester_id: i64,
    ) -> Result<Vec<MasteryDetail>, StoreError>;

    /// Sorted by last update descending.
    async fn list_student_details(
        &self,
        student_id: i64,
        semester_id: Option<i64>,
    ) -> Result<Vec<MasteryDetail>, StoreError>;
}

/// Lecturer-to-offering assignments.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn is_lecturer_assigned(
        &self,
        lecturer_id: i64,
        course_id: i64,
        semester_id: i64,
    ) -> Result<bool, StoreError>;
}

/// Everything the services need from storage.
pub trait LmsStore:
    TopicRepository
    + ProgressRepository
    + AssessmentRepository
    + MasteryRepository
    + DirectoryRepository
{
}

impl<T> LmsStore for T where
    T: TopicRepository
        + ProgressRepository
        + AssessmentRepository
        + MasteryRepository
        + DirectoryRepository
{
}
