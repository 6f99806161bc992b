// src/services/mastery_query.rs

//! Read paths over stored mastery records. No computation happens here.

use crate::{
    error::AppError,
    models::mastery::{MasteryDetail, MasteryKey},
    store::LmsStore,
};

/// One student's mastery for a course offering, if it has been calculated.
pub async fn student_mastery<S>(
    store: &S,
    key: MasteryKey,
) -> Result<Option<MasteryDetail>, AppError>
where
    S: LmsStore + ?Sized,
{
    Ok(store.find_mastery_detail(key).await?)
}

/// A cohort's masteries, highest mastery level first.
pub async fn cohort_mastery<S>(
    store: &S,
    course_id: i64,
    semester_id: i64,
) -> Result<Vec<MasteryDetail>, AppError>
where
    S: LmsStore + ?Sized,
{
    Ok(store.list_cohort_details(course_id, semester_id).await?)
}

/// Every mastery record of a student, most recently updated first.
pub async fn student_masteries<S>(
    store: &S,
    student_id: i64,
    semester_id: Option<i64>,
) -> Result<Vec<MasteryDetail>, AppError>
where
    S: LmsStore + ?Sized,
{
    Ok(store.list_student_details(student_id, semester_id).await?)
}
