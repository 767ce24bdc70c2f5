use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::db::models::{Quiz, User};
use crate::db::types::UserRole;
use crate::repositories;

/// Quiz lookup scoped to the caller. Educators see only their own quizzes;
/// admins see all. Anything else reads as absent.
pub(crate) async fn load_owned_quiz(
    state: &AppState,
    caller: &User,
    quiz_id: &str,
) -> Result<Quiz, ApiError> {
    let quiz = if caller.role == UserRole::Admin {
        repositories::quizzes::find_by_id(state.db(), quiz_id).await
    } else {
        repositories::quizzes::find_by_id_for_educator(state.db(), quiz_id, &caller.id).await
    }
    .map_err(|e| ApiError::internal(e, "Failed to fetch quiz"))?;

    quiz.ok_or_else(|| ApiError::not_found("quiz_not_found", "Quiz not found"))
}
