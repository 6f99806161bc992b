// src/services/topics.rs

use std::collections::HashSet;

use validator::Validate;

use crate::{
    error::AppError,
    models::topic::{
        CreateTopicRequest, DeleteOutcome, NewTopic, ReorderTopicsRequest, Topic,
        UpdateTopicRequest,
    },
    store::LmsStore,
    utils::html::clean_html,
};

fn topic_not_found() -> AppError {
    AppError::NotFound("Topic not found".to_string())
}

/// Creates a topic. Without an explicit order index it is appended after the
/// highest existing index of the offering (or placed at 1).
pub async fn create_topic<S>(
    store: &S,
    mut payload: CreateTopicRequest,
) -> Result<Topic, AppError>
where
    S: LmsStore + ?Sized,
{
    // Trim before validating so a blank title fails the length check.
    payload.title = payload.title.trim().to_string();
    payload.validate()?;

    let order_index = match payload.order_index {
        Some(index) => index,
        None => match store
            .max_order_index(payload.course_id, payload.semester_id)
            .await?
        {
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| AppError::BadRequest("Order index overflow".to_string()))?,
            None => 1,
        },
    };

    let new_topic = NewTopic {
        course_id: payload.course_id,
        semester_id: payload.semester_id,
        title: payload.title,
        description: payload.description.as_deref().map(clean_html),
        order_index,
        duration_hours: payload.duration_hours.unwrap_or(0.0),
        difficulty: payload.difficulty.unwrap_or_default(),
    };

    let topic = store.insert_topic(&new_topic).await?;

    tracing::info!(
        topic_id = topic.id,
        course_id = topic.course_id,
        semester_id = topic.semester_id,
        order_index = topic.order_index,
        "Topic created"
    );

    Ok(topic)
}

pub async fn get_topic<S>(store: &S, topic_id: i64) -> Result<Topic, AppError>
where
    S: LmsStore + ?Sized,
{
    store.find_topic(topic_id).await?.ok_or_else(topic_not_found)
}

pub async fn list_topics<S>(
    store: &S,
    course_id: i64,
    semester_id: i64,
    include_inactive: bool,
) -> Result<Vec<Topic>, AppError>
where
    S: LmsStore + ?Sized,
{
    Ok(store
        .list_topics(course_id, semester_id, include_inactive)
        .await?)
}

/// Applies a partial update. An empty patch returns the topic unchanged.
pub async fn update_topic<S>(
    store: &S,
    topic_id: i64,
    mut payload: UpdateTopicRequest,
) -> Result<Topic, AppError>
where
    S: LmsStore + ?Sized,
{
    payload.title = payload.title.map(|title| title.trim().to_string());
    payload.validate()?;

    if payload.is_empty() {
        return get_topic(store, topic_id).await;
    }

    payload.description = payload.description.as_deref().map(clean_html);

    let topic = store
        .update_topic(topic_id, &payload)
        .await?
        .ok_or_else(topic_not_found)?;

    tracing::info!(topic_id, "Topic updated");
    Ok(topic)
}

/// Checks that `ordered_ids` is exactly the id set of `existing`.
fn validate_reorder(existing: &[Topic], ordered_ids: &[i64]) -> Result<(), AppError> {
    if existing.len() != ordered_ids.len() {
        return Err(AppError::BadRequest(format!(
            "Expected {} topic ids, received {}",
            existing.len(),
            ordered_ids.len()
        )));
    }

    let expected: HashSet<i64> = existing.iter().map(|t| t.id).collect();
    let mut seen = HashSet::with_capacity(ordered_ids.len());

    for id in ordered_ids {
        if !expected.contains(id) {
            return Err(AppError::BadRequest(format!(
                "Topic {} does not belong to this course offering",
                id
            )));
        }
        if !seen.insert(*id) {
            return Err(AppError::BadRequest(format!("Topic {} is listed twice", id)));
        }
    }

    Ok(())
}

/// Renumbers every topic of an offering to match `topic_ids`, in one transaction.
/// Inactive topics are part of the set.
pub async fn reorder_topics<S>(
    store: &S,
    payload: ReorderTopicsRequest,
) -> Result<Vec<Topic>, AppError>
where
    S: LmsStore + ?Sized,
{
    let existing = store
        .list_topics(payload.course_id, payload.semester_id, true)
        .await?;

    validate_reorder(&existing, &payload.topic_ids)?;

    store
        .apply_topic_order(payload.course_id, payload.semester_id, &payload.topic_ids)
        .await?;

    tracing::info!(
        course_id = payload.course_id,
        semester_id = payload.semester_id,
        topics = payload.topic_ids.len(),
        "Topics reordered"
    );

    Ok(store
        .list_topics(payload.course_id, payload.semester_id, true)
        .await?)
}

/// Deletes a topic, or only deactivates it when progress records reference it.
pub async fn delete_topic<S>(store: &S, topic_id: i64) -> Result<DeleteOutcome, AppError>
where
    S: LmsStore + ?Sized,
{
    let references = store.count_topic_progress(topic_id).await?;

    let (found, outcome) = if references > 0 {
        (
            store.deactivate_topic(topic_id).await?,
            DeleteOutcome::Deactivated,
        )
    } else {
        (store.delete_topic(topic_id).await?, DeleteOutcome::Deleted)
    };

    if !found {
        return Err(topic_not_found());
    }

    tracing::info!(topic_id, references, outcome = ?outcome, "Topic removed");
    Ok(outcome)
}
