// src/services/notifier.rs

use async_trait::async_trait;
use serde::Serialize;

/// Emitted when a student completes a topic for the first time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicCompleted {
    pub student_id: i64,
    pub topic_id: i64,
    pub course_id: i64,
    pub semester_id: i64,
    pub topic_title: String,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, thiserror::Error)]
#[error("notification dispatch failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound notification collaborator. Failures never fail the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn topic_completed(&self, event: &TopicCompleted) -> Result<(), NotifyError>;
}

/// Emits completion events on the `notifications` tracing target for a log shipper to forward.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn topic_completed(&self, event: &TopicCompleted) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(event).map_err(|e| NotifyError(e.to_string()))?;
        tracing::info!(
            target: "notifications",
            student_id = event.student_id,
            topic_id = event.topic_id,
            %payload,
            "Topic completed"
        );
        Ok(())
    }
}
