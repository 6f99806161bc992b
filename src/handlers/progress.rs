// src/handlers/progress.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{mastery::OfferingParams, progress::ProgressUpdate},
    services::progress,
    state::AppState,
    utils::jwt::Claims,
};

/// Records the caller's progress on a topic.
///
/// * Marks completion, adds time spent, stores the assessment payload.
/// * Recomputes the caller's mastery for the topic's course offering.
/// * Returns the stored progress together with the new mastery.
pub async fn record_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(topic_id): Path<i64>,
    Json(update): Json<ProgressUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let outcome = progress::record_progress(
        state.store.as_ref(),
        state.notifier.as_ref(),
        student_id,
        topic_id,
        update,
    )
    .await?;

    Ok(Json(outcome))
}

/// Lists the caller's progress records for a course offering.
pub async fn list_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<OfferingParams>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let records = progress::student_progress(
        state.store.as_ref(),
        student_id,
        params.course_id,
        params.semester_id,
    )
    .await?;

    Ok(Json(records))
}
