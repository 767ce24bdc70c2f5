use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentEducator;
use crate::api::quizzes::helpers::load_owned_quiz;
use crate::core::state::AppState;
use crate::schemas::generation::JobStatusResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/:job_id", get(poll_job))
}

/// Polling endpoint for question replacement jobs. Access follows the quiz
/// the job belongs to; a job on someone else's quiz reads as absent.
async fn poll_job(
    Path(job_id): Path<String>,
    CurrentEducator(educator): CurrentEducator,
    State(state): State<AppState>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let job = state
        .jobs()
        .get(&job_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to read generation job"))?
        .ok_or_else(|| ApiError::not_found("job_not_found", "Generation job not found"))?;

    match load_owned_quiz(&state, &educator, &job.request.quiz_id).await {
        Ok(_) => {}
        Err(ApiError::NotFound { .. }) => {
            return Err(ApiError::not_found("job_not_found", "Generation job not found"));
        }
        Err(other) => return Err(other),
    }

    Ok(Json(JobStatusResponse::from_job(&job)))
}
