use axum::http::StatusCode;
use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentEducator;
use crate::api::quizzes::helpers::load_owned_quiz;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::Question;
use crate::db::types::{BloomsLevel, EnrollmentStatus, QuestionDifficulty};
use crate::repositories;
use crate::schemas::generation::{ReplaceQuestionAccepted, ReplaceQuestionRequest};
use crate::schemas::quiz::{ReassignRequest, ReassignResponse};
use crate::services::job_store::{GenerationJob, JobStatus, JobUpdate, ReplacementContext};

/// Queues an asynchronous regeneration of one question. The response carries
/// a job id; progress and the finished question arrive through the poll
/// endpoint once the generator calls back.
pub(in crate::api::quizzes) async fn replace_question(
    Path((quiz_id, question_id)): Path<(String, String)>,
    CurrentEducator(educator): CurrentEducator,
    State(state): State<AppState>,
    payload: Option<Json<ReplaceQuestionRequest>>,
) -> Result<(StatusCode, Json<ReplaceQuestionAccepted>), ApiError> {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    request
        .validate()
        .map_err(|e| ApiError::bad_request("validation_failed", e.to_string()))?;

    if let Some(difficulty) = request.difficulty.as_deref() {
        if QuestionDifficulty::parse(difficulty).is_none() {
            return Err(ApiError::bad_request(
                "validation_failed",
                "difficulty must be easy, intermediate, or hard",
            ));
        }
    }
    if let Some(level) = request.blooms_level.as_deref() {
        if BloomsLevel::parse(level).is_none() {
            return Err(ApiError::bad_request(
                "validation_failed",
                "blooms_level is not a recognized level",
            ));
        }
    }

    let quiz = load_owned_quiz(&state, &educator, &quiz_id).await?;
    let question = repositories::questions::find_by_id_for_quiz(state.db(), &question_id, &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .ok_or_else(|| ApiError::not_found("question_not_found", "Question not found"))?;

    let job_id = format!("replace-{}", Uuid::new_v4());
    let context = build_context(&quiz.id, &question, request);
    let job =
        GenerationJob::new(job_id, context, state.settings().generation().job_ttl_seconds);

    state
        .jobs()
        .create(job.clone())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create generation job"))?;

    let status = if state.generator().is_enabled() {
        dispatch_in_background(&state, job.clone());
        JobStatus::Pending
    } else {
        // No generator deployed: fail the job synchronously so polling
        // reports a definitive state instead of hanging on pending.
        let update = JobUpdate {
            status: Some(JobStatus::Failed),
            error: Some("question generator is not configured".to_string()),
            ..Default::default()
        };
        if let Err(error) = state.jobs().update(&job.job_id, update).await {
            tracing::warn!(job_id = %job.job_id, error = %error, "Failed to mark undispatchable job");
        }
        JobStatus::Failed
    };

    tracing::info!(
        quiz_id = %quiz.id,
        question_id = %question.id,
        educator_id = %educator.id,
        job_id = %job.job_id,
        "Question replacement queued"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(ReplaceQuestionAccepted {
            job_id: job.job_id,
            status,
            message: "Question replacement has been queued".to_string(),
        }),
    ))
}

/// Issues a retake: spends the student's open enrollments for the quiz and
/// inserts a fresh reassignment enrollment linked to the one named in the
/// path.
pub(in crate::api::quizzes) async fn reassign_enrollment(
    Path((quiz_id, enrollment_id)): Path<(String, String)>,
    CurrentEducator(educator): CurrentEducator,
    State(state): State<AppState>,
    Json(payload): Json<ReassignRequest>,
) -> Result<(StatusCode, Json<ReassignResponse>), ApiError> {
    payload
        .validate()
        .map_err(|e| ApiError::bad_request("validation_failed", e.to_string()))?;
    let reason = payload.reason.trim();
    if reason.is_empty() {
        return Err(ApiError::bad_request("validation_failed", "reason must not be blank"));
    }

    let quiz = load_owned_quiz(&state, &educator, &quiz_id).await?;

    let parent = repositories::enrollments::find_by_id_for_quiz(state.db(), &enrollment_id, &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch enrollment"))?
        .ok_or_else(|| ApiError::not_found("enrollment_not_found", "Enrollment not found"))?;

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    // Same lock as the start flow, so a reassignment never interleaves with
    // an attempt being created under an enrollment it is about to spend.
    repositories::attempts::acquire_quiz_student_lock(&mut *tx, &quiz.id, &parent.student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire attempt lock"))?;

    let spent = repositories::enrollments::complete_active_for_student(
        &mut *tx,
        &quiz.id,
        &parent.student_id,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to close open enrollments"))?;

    let new_enrollment_id = Uuid::new_v4().to_string();
    let inserted = repositories::enrollments::create(
        &mut *tx,
        repositories::enrollments::CreateEnrollment {
            id: &new_enrollment_id,
            quiz_id: &quiz.id,
            student_id: &parent.student_id,
            enrolled_at: now,
            status: EnrollmentStatus::Enrolled,
            is_reassignment: true,
            reassignment_reason: Some(reason),
            parent_enrollment_id: Some(&parent.id),
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create reassignment"))?;

    if !inserted {
        return Err(ApiError::conflict(
            "reassignment_conflict",
            "An open enrollment already exists for this student",
        ));
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        quiz_id = %quiz.id,
        student_id = %parent.student_id,
        educator_id = %educator.id,
        enrollment_id = %new_enrollment_id,
        parent_enrollment_id = %parent.id,
        enrollments_spent = spent,
        "Student reassigned to quiz"
    );

    Ok((
        StatusCode::CREATED,
        Json(ReassignResponse {
            enrollment_id: new_enrollment_id,
            quiz_id: quiz.id,
            student_id: parent.student_id,
            is_reassignment: true,
            reassignment_reason: Some(reason.to_string()),
            parent_enrollment_id: Some(parent.id),
            enrolled_at: format_primitive(now),
        }),
    ))
}

/// Generation context seeded from the question being replaced, with request
/// overrides applied where present.
fn build_context(
    quiz_id: &str,
    question: &Question,
    request: ReplaceQuestionRequest,
) -> ReplacementContext {
    let books = request
        .books
        .filter(|books| !books.is_empty())
        .unwrap_or_else(|| question.book.clone().into_iter().collect());
    let chapters = request
        .chapters
        .filter(|chapters| !chapters.is_empty())
        .unwrap_or_else(|| question.chapter.clone().into_iter().collect());
    let difficulty = request
        .difficulty
        .and_then(|value| QuestionDifficulty::parse(&value))
        .unwrap_or(question.difficulty);
    let blooms_level = request
        .blooms_level
        .and_then(|value| BloomsLevel::parse(&value))
        .unwrap_or(question.blooms_level);
    let topic = request
        .topic
        .map(|topic| topic.trim().to_string())
        .filter(|topic| !topic.is_empty())
        .or_else(|| question.topic.clone());

    ReplacementContext {
        question_id_to_replace: question.id.clone(),
        quiz_id: quiz_id.to_string(),
        books,
        chapters,
        difficulty: difficulty.as_str().to_string(),
        blooms_level: blooms_level.as_str().to_string(),
        topic,
    }
}

/// Fire and forget. The handler has already answered 202; failures land on
/// the job record where polling can see them.
fn dispatch_in_background(state: &AppState, job: GenerationJob) {
    let state = state.clone();
    tokio::spawn(async move {
        let update = match state.generator().dispatch_replacement(&job).await {
            Ok(()) => JobUpdate {
                status: Some(JobStatus::Processing),
                progress: Some(10),
                message: Some("Dispatched to generator".to_string()),
                ..Default::default()
            },
            Err(error) => {
                tracing::error!(job_id = %job.job_id, error = %error, "Generator dispatch failed");
                JobUpdate {
                    status: Some(JobStatus::Failed),
                    error: Some(error.to_string()),
                    ..Default::default()
                }
            }
        };

        if let Err(error) = state.jobs().update(&job.job_id, update).await {
            tracing::error!(job_id = %job.job_id, error = %error, "Failed to record dispatch outcome");
        }
    });
}
