// src/services/progress.rs

use chrono::{DateTime, Utc};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        mastery::MasteryKey,
        progress::{ProgressOutcome, ProgressUpdate, ProgressWrite, TopicProgress},
    },
    services::{
        mastery::recompute_mastery,
        notifier::{Notifier, TopicCompleted},
    },
    store::LmsStore,
};

/// Merges an update into the stored record.
///
/// * Completion is sticky and `completed_at` is only set on the first transition.
/// * A fresh completion without an explicit level sets mastery to 100.
/// * Time spent accumulates.
fn merge_progress(
    student_id: i64,
    topic_id: i64,
    existing: Option<&TopicProgress>,
    update: &ProgressUpdate,
    now: DateTime<Utc>,
) -> ProgressWrite {
    let was_completed = existing.is_some_and(|p| p.is_completed);
    let is_completed = was_completed || update.is_completed.unwrap_or(false);

    let completed_at = existing
        .and_then(|p| p.completed_at)
        .or_else(|| is_completed.then_some(now));

    let mastery_level = match update.mastery_level {
        Some(level) => level,
        None if is_completed && !was_completed => 100.0,
        None => existing.map_or(0.0, |p| p.mastery_level),
    };

    let time_spent_minutes = existing
        .map_or(0, |p| p.time_spent_minutes)
        .saturating_add(update.time_spent_minutes.unwrap_or(0));

    let assessment_result = update
        .assessment_result
        .clone()
        .or_else(|| existing.and_then(|p| p.assessment_result.clone()));

    ProgressWrite {
        student_id,
        topic_id,
        is_completed,
        completed_at,
        mastery_level,
        time_spent_minutes,
        assessment_result,
    }
}

/// Records a student's progress on a topic and recomputes their course mastery.
///
/// The notifier hears about first-time completions only; its failure is logged
/// and does not affect the stored progress or mastery.
pub async fn record_progress<S, N>(
    store: &S,
    notifier: &N,
    student_id: i64,
    topic_id: i64,
    update: ProgressUpdate,
) -> Result<ProgressOutcome, AppError>
where
    S: LmsStore + ?Sized,
    N: Notifier + ?Sized,
{
    update.validate()?;

    let topic = store
        .find_topic(topic_id)
        .await?
        .ok_or(AppError::NotFound("Topic not found".to_string()))?;

    if !topic.is_active {
        return Err(AppError::BadRequest("Topic is no longer active".to_string()));
    }

    let existing = store.find_progress_entry(student_id, topic_id).await?;
    let write = merge_progress(student_id, topic_id, existing.as_ref(), &update, Utc::now());
    let newly_completed = write.is_completed && !existing.as_ref().is_some_and(|p| p.is_completed);

    let progress = store.upsert_progress(&write).await?;

    let key = MasteryKey {
        student_id,
        course_id: topic.course_id,
        semester_id: topic.semester_id,
    };
    let mastery = recompute_mastery(store, key).await?;

    if newly_completed {
        let event = TopicCompleted {
            student_id,
            topic_id,
            course_id: topic.course_id,
            semester_id: topic.semester_id,
            topic_title: topic.title.clone(),
            completed_at: progress.completed_at.unwrap_or_else(Utc::now),
        };
        if let Err(e) = notifier.topic_completed(&event).await {
            tracing::warn!(student_id, topic_id, "Failed to dispatch completion notice: {}", e);
        }
    }

    tracing::info!(
        student_id,
        topic_id,
        newly_completed,
        mastery_level = mastery.mastery_level,
        "Progress recorded"
    );

    Ok(ProgressOutcome {
        progress,
        mastery,
        newly_completed,
    })
}

/// A student's progress records for every topic of a course offering.
pub async fn student_progress<S>(
    store: &S,
    student_id: i64,
    course_id: i64,
    semester_id: i64,
) -> Result<Vec<TopicProgress>, AppError>
where
    S: LmsStore + ?Sized,
{
    let topic_ids: Vec<i64> = store
        .list_topics(course_id, semester_id, true)
        .await?
        .iter()
        .map(|t| t.id)
        .collect();

    Ok(store.find_progress(student_id, &topic_ids).await?)
}
