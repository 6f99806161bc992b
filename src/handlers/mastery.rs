// src/handlers/mastery.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::mastery::{HistoryParams, MasteryKey, OfferingParams},
    services::{mastery, mastery_query},
    state::AppState,
    utils::jwt::Claims,
};

/// Retrieves the caller's mastery for a course offering.
pub async fn get_my_mastery(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<OfferingParams>,
) -> Result<impl IntoResponse, AppError> {
    let key = MasteryKey {
        student_id: claims.user_id()?,
        course_id: params.course_id,
        semester_id: params.semester_id,
    };

    let detail = mastery_query::student_mastery(state.store.as_ref(), key)
        .await?
        .ok_or(AppError::NotFound("Mastery record not found".to_string()))?;

    Ok(Json(detail))
}

/// Lists the caller's mastery records, most recently updated first.
pub async fn get_my_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let history =
        mastery_query::student_masteries(state.store.as_ref(), student_id, params.semester_id)
            .await?;

    Ok(Json(history))
}

/// Recomputes the caller's mastery for a course offering.
pub async fn recalculate_my_mastery(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(params): Json<OfferingParams>,
) -> Result<impl IntoResponse, AppError> {
    let key = MasteryKey {
        student_id: claims.user_id()?,
        course_id: params.course_id,
        semester_id: params.semester_id,
    };

    let record = mastery::recompute_mastery(state.store.as_ref(), key).await?;

    Ok(Json(record))
}
