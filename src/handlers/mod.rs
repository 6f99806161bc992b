// src/handlers/mod.rs

pub mod health;
pub mod lecturer;
pub mod mastery;
pub mod progress;
pub mod topic;

use crate::{
    error::AppError,
    models::user::Role,
    store::LmsStore,
    utils::jwt::Claims,
};

/// Checks that the caller may manage or inspect a course offering.
///
/// Admins always pass; lecturers must be assigned to the offering.
pub(crate) async fn ensure_offering_access(
    store: &dyn LmsStore,
    claims: &Claims,
    course_id: i64,
    semester_id: i64,
) -> Result<(), AppError> {
    match claims.role() {
        Some(Role::Admin) => Ok(()),
        Some(Role::Lecturer) => {
            let lecturer_id = claims.user_id()?;
            if store
                .is_lecturer_assigned(lecturer_id, course_id, semester_id)
                .await?
            {
                Ok(())
            } else {
                Err(AppError::Forbidden(
                    "Lecturer is not assigned to this course offering".to_string(),
                ))
            }
        }
        _ => Err(AppError::Forbidden("Lecturer access required".to_string())),
    }
}
