pub(crate) mod helpers;
mod educator;
mod student;

use axum::{routing::post, Router};

use crate::core::state::AppState;

/// Routes mounted under `/student/quizzes`.
pub(crate) fn student_router() -> Router<AppState> {
    Router::new()
        .route("/:quiz_id/start", post(student::start_quiz))
        .route("/:quiz_id/submit", post(student::submit_attempt))
}

/// Routes mounted under `/educator/quizzes`.
pub(crate) fn educator_router() -> Router<AppState> {
    Router::new()
        .route("/:quiz_id/questions/:question_id/replace", post(educator::replace_question))
        .route("/:quiz_id/enrollments/:enrollment_id/reassign", post(educator::reassign_enrollment))
}
