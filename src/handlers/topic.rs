// src/handlers/topic.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    handlers::ensure_offering_access,
    models::topic::{
        CreateTopicRequest, ListTopicsParams, ReorderTopicsRequest, UpdateTopicRequest,
    },
    services::topics,
    state::AppState,
    utils::jwt::Claims,
};

/// Lists the topics of a course offering in syllabus order.
pub async fn list_topics(
    State(state): State<AppState>,
    Query(params): Query<ListTopicsParams>,
) -> Result<impl IntoResponse, AppError> {
    let listed = topics::list_topics(
        state.store.as_ref(),
        params.course_id,
        params.semester_id,
        params.include_inactive,
    )
    .await?;

    Ok(Json(listed))
}

/// Retrieves a single topic by ID.
pub async fn get_topic(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let topic = topics::get_topic(state.store.as_ref(), id).await?;
    Ok(Json(topic))
}

/// Creates a topic.
/// Lecturer (assigned) or admin only.
pub async fn create_topic(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_offering_access(
        state.store.as_ref(),
        &claims,
        payload.course_id,
        payload.semester_id,
    )
    .await?;

    let topic = topics::create_topic(state.store.as_ref(), payload).await?;

    Ok((StatusCode::CREATED, Json(topic)))
}

/// Updates a topic by ID.
/// Lecturer (assigned) or admin only.
pub async fn update_topic(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    let current = topics::get_topic(state.store.as_ref(), id).await?;
    ensure_offering_access(
        state.store.as_ref(),
        &claims,
        current.course_id,
        current.semester_id,
    )
    .await?;

    let topic = topics::update_topic(state.store.as_ref(), id, payload).await?;

    Ok(Json(topic))
}

/// Deletes a topic by ID, deactivating it instead when progress references it.
/// Lecturer (assigned) or admin only.
pub async fn delete_topic(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let current = topics::get_topic(state.store.as_ref(), id).await?;
    ensure_offering_access(
        state.store.as_ref(),
        &claims,
        current.course_id,
        current.semester_id,
    )
    .await?;

    let outcome = topics::delete_topic(state.store.as_ref(), id).await?;

    Ok(Json(serde_json::json!({ "id": id, "outcome": outcome })))
}

/// Renumbers all topics of a course offering.
/// Lecturer (assigned) or admin only.
pub async fn reorder_topics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ReorderTopicsRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_offering_access(
        state.store.as_ref(),
        &claims,
        payload.course_id,
        payload.semester_id,
    )
    .await?;

    let ordered = topics::reorder_topics(state.store.as_ref(), payload).await?;

    Ok(Json(ordered))
}
