use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::api::errors::ApiError;
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::generation::{WebhookAck, WebhookCallback};
use crate::services::job_store::{GenerationJob, JobStatus, JobStoreError, JobUpdate};
use crate::services::{question_import, quiz_cache};

const TOKEN_HEADER: &str = "x-webhook-token";

/// Callback endpoint for the question generator. Authenticated by shared
/// token, correlated by job id, and idempotent: replayed callbacks for a
/// finished job acknowledge without touching anything.
pub(super) async fn question_replacement(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<WebhookCallback>,
) -> Result<Json<WebhookAck>, ApiError> {
    authenticate(&state, &headers)?;

    let job = state.jobs().get(&payload.job_id).await.map_err(|e| {
        ApiError::internal(e, "Failed to read generation job")
            .with_context(json!({ "jobId": payload.job_id }))
    })?;

    // A populated error field marks a failure report even when the status
    // string says otherwise.
    let status = payload.status.trim().to_ascii_lowercase();
    let reports_failure = matches!(status.as_str(), "failed" | "error")
        || payload.error.as_deref().is_some_and(|error| !error.trim().is_empty());

    let Some(job) = job else {
        // Failure reports for evicted jobs are acknowledged so the generator
        // stops retrying; anything else means it has a stale job id.
        if reports_failure {
            tracing::warn!(job_id = %payload.job_id, "Failure callback for unknown job");
            return Ok(Json(ack(false, payload.job_id, None, "Job not found; failure noted")));
        }
        return Err(ApiError::not_found("job_not_found", "Generation job not found")
            .with_context(json!({ "jobId": payload.job_id })));
    };

    if job.status.is_terminal() {
        tracing::info!(
            job_id = %job.job_id,
            status = job.status.as_str(),
            "Duplicate callback for finalized job"
        );
        return Ok(Json(ack(
            job.status == JobStatus::Completed,
            job.job_id,
            None,
            "Job already finalized",
        )));
    }

    if matches!(status.as_str(), "completed" | "success") {
        finalize_replacement(&state, job, payload).await
    } else if reports_failure {
        record_failure(&state, job, payload).await
    } else {
        record_progress(&state, job, payload).await
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let configured = &state.settings().security().webhook_shared_token;
    if configured.is_empty() {
        return Err(ApiError::Unauthorized("Webhook authentication is not configured"));
    }

    let presented =
        headers.get(TOKEN_HEADER).and_then(|value| value.to_str().ok()).unwrap_or_default();
    if security::verify_shared_token(presented, configured) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("Invalid webhook token"))
    }
}

/// Persists the generated question over the original row, then finalizes the
/// job. Bad payloads fail the job rather than leaving it stuck in processing.
async fn finalize_replacement(
    state: &AppState,
    job: GenerationJob,
    payload: WebhookCallback,
) -> Result<Json<WebhookAck>, ApiError> {
    if !job.job_id.starts_with("replace-") || job.request.question_id_to_replace.is_empty() {
        return Err(ApiError::bad_request(
            "validation_failed",
            "Job does not target a question replacement",
        )
        .with_context(json!({ "jobId": job.job_id })));
    }

    let Some(raw) = first_question(payload.questions_data.as_ref()) else {
        fail_job(state, &job.job_id, "callback carried no question data").await;
        return Err(ApiError::bad_request(
            "validation_failed",
            "Completed callback carried no question data",
        )
        .with_context(json!({ "jobId": job.job_id })));
    };

    let normalized = match question_import::normalize_question(raw, &job.request) {
        Ok(normalized) => normalized,
        Err(error) => {
            fail_job(state, &job.job_id, &error.to_string()).await;
            return Err(ApiError::bad_request(
                "validation_failed",
                format!("Generated question is invalid: {error}"),
            )
            .with_context(json!({ "jobId": job.job_id })));
        }
    };

    let options = match serde_json::to_value(&normalized.options) {
        Ok(options) => options,
        Err(error) => {
            fail_job(state, &job.job_id, "options failed to serialize").await;
            return Err(ApiError::internal(error, "Failed to serialize question options")
                .with_context(json!({ "jobId": job.job_id })));
        }
    };

    let persisted = repositories::questions::replace_content(
        state.db(),
        repositories::questions::ReplaceQuestion {
            id: &job.request.question_id_to_replace,
            quiz_id: &job.request.quiz_id,
            question_text: &normalized.question_text,
            options,
            correct_answer: &normalized.correct_answer,
            explanation: normalized.explanation.as_deref(),
            difficulty: normalized.difficulty,
            blooms_level: normalized.blooms_level,
            topic: normalized.topic.as_deref(),
            book: normalized.book.as_deref(),
            chapter: normalized.chapter.as_deref(),
            updated_at: primitive_now_utc(),
        },
    )
    .await;

    let question = match persisted {
        Ok(Some(question)) => question,
        Ok(None) => {
            fail_job(state, &job.job_id, "question to replace no longer exists").await;
            return Err(ApiError::persistence(
                "no row updated",
                "Question to replace no longer exists",
            )
            .with_context(json!({ "jobId": job.job_id })));
        }
        Err(error) => {
            fail_job(state, &job.job_id, "failed to persist replacement").await;
            return Err(ApiError::persistence(error, "Failed to persist replacement question")
                .with_context(json!({ "jobId": job.job_id })));
        }
    };

    let canonical = serde_json::to_value(&question).unwrap_or(Value::Null);
    let update = JobUpdate {
        status: Some(JobStatus::Completed),
        progress: Some(100),
        message: payload.message.or_else(|| Some("Question replaced".to_string())),
        questions_data: Some(Value::Array(vec![canonical])),
        ..JobUpdate::default()
    };
    match state.jobs().update(&job.job_id, update).await {
        Ok(_) | Err(JobStoreError::Terminal(_)) => {}
        Err(error) => {
            tracing::error!(job_id = %job.job_id, error = %error, "Failed to finalize job record");
        }
    }

    // The sanitized bundle now holds stale question text.
    quiz_cache::invalidate(state.redis(), &job.request.quiz_id).await;

    metrics::counter!("question_replacements_completed_total").increment(1);
    tracing::info!(
        job_id = %job.job_id,
        quiz_id = %job.request.quiz_id,
        question_id = %question.id,
        "Question replaced from generator callback"
    );

    Ok(Json(ack(true, job.job_id, Some(question.id), "Question replaced")))
}

async fn record_failure(
    state: &AppState,
    job: GenerationJob,
    payload: WebhookCallback,
) -> Result<Json<WebhookAck>, ApiError> {
    let reason = payload
        .error
        .or(payload.message)
        .unwrap_or_else(|| "generation failed".to_string());

    let update = JobUpdate {
        status: Some(JobStatus::Failed),
        error: Some(reason.clone()),
        ..JobUpdate::default()
    };
    match state.jobs().update(&job.job_id, update).await {
        Ok(_) | Err(JobStoreError::Terminal(_)) => {}
        Err(error) => {
            return Err(ApiError::internal(error, "Failed to record generation failure")
                .with_context(json!({ "jobId": job.job_id })));
        }
    }

    metrics::counter!("question_replacements_failed_total").increment(1);
    tracing::warn!(job_id = %job.job_id, error = %reason, "Generator reported failure");

    Ok(Json(ack(false, job.job_id, None, "Failure recorded")))
}

/// Progress merges keep 100 reserved for completion, and any progress ping
/// moves a pending job into processing.
async fn record_progress(
    state: &AppState,
    job: GenerationJob,
    payload: WebhookCallback,
) -> Result<Json<WebhookAck>, ApiError> {
    let update = JobUpdate {
        status: Some(JobStatus::Processing),
        progress: payload.progress.map(|value| value.min(99)),
        message: payload.message,
        ..JobUpdate::default()
    };
    match state.jobs().update(&job.job_id, update).await {
        Ok(_) | Err(JobStoreError::Terminal(_)) => {}
        Err(error) => {
            return Err(ApiError::internal(error, "Failed to record generation progress")
                .with_context(json!({ "jobId": job.job_id })));
        }
    }

    Ok(Json(ack(true, job.job_id, None, "Progress recorded")))
}

/// `questions_data` arrives as a list (first entry wins) or a bare object.
fn first_question(data: Option<&Value>) -> Option<&Value> {
    match data {
        Some(Value::Array(items)) => items.first().filter(|item| item.is_object()),
        Some(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

/// Best effort: the HTTP response already tells the generator what happened,
/// and a lost update here only delays the sweeper.
async fn fail_job(state: &AppState, job_id: &str, reason: &str) {
    let update = JobUpdate {
        status: Some(JobStatus::Failed),
        error: Some(reason.to_string()),
        ..JobUpdate::default()
    };
    match state.jobs().update(job_id, update).await {
        Ok(_) | Err(JobStoreError::Terminal(_)) => {}
        Err(error) => {
            tracing::warn!(job_id = %job_id, error = %error, "Failed to mark job as failed");
        }
    }
}

fn ack(success: bool, job_id: String, question_id: Option<String>, message: &str) -> WebhookAck {
    WebhookAck { success, job_id, question_id, message: message.to_string() }
}
