// src/handlers/lecturer.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    handlers::ensure_offering_access,
    models::mastery::MasteryKey,
    services::{mastery, mastery_query},
    state::AppState,
    utils::jwt::Claims,
};

/// Lists the cohort's masteries for a course offering, highest first.
pub async fn cohort_mastery(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, semester_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    ensure_offering_access(state.store.as_ref(), &claims, course_id, semester_id).await?;

    let cohort = mastery_query::cohort_mastery(state.store.as_ref(), course_id, semester_id).await?;

    Ok(Json(cohort))
}

/// Cohort averages and mastery band distribution.
/// Always well-formed: an offering without records reports zeros.
pub async fn mastery_statistics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, semester_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    ensure_offering_access(state.store.as_ref(), &claims, course_id, semester_id).await?;

    let stats = mastery::mastery_statistics(state.store.as_ref(), course_id, semester_id).await?;

    Ok(Json(stats))
}

/// Retrieves one student's mastery for a course offering.
pub async fn student_mastery(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, semester_id, student_id)): Path<(i64, i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    ensure_offering_access(state.store.as_ref(), &claims, course_id, semester_id).await?;

    let key = MasteryKey {
        student_id,
        course_id,
        semester_id,
    };
    let detail = mastery_query::student_mastery(state.store.as_ref(), key)
        .await?
        .ok_or(AppError::NotFound("Mastery record not found".to_string()))?;

    Ok(Json(detail))
}

/// Recomputes one student's mastery for a course offering.
pub async fn recalculate_student_mastery(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((course_id, semester_id, student_id)): Path<(i64, i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    ensure_offering_access(state.store.as_ref(), &claims, course_id, semester_id).await?;

    let key = MasteryKey {
        student_id,
        course_id,
        semester_id,
    };
    let record = mastery::recompute_mastery(state.store.as_ref(), key).await?;

    tracing::info!(
        lecturer = %claims.sub,
        student_id,
        course_id,
        semester_id,
        "Mastery recalculated by staff"
    );

    Ok(Json(record))
}
