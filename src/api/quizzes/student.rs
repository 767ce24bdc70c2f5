use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::{AttemptAnswer, Enrollment, Quiz, QuizAttempt, User};
use crate::db::types::{AttemptStatus, EnrollmentStatus, QuizStatus};
use crate::repositories;
use crate::schemas::quiz::{
    QuestionPublic, QuizPayload, StartAttemptResponse, SubmitAttemptRequest, SubmitAttemptResponse,
};
use crate::services::quiz_cache::{self, CachedQuestion};
use crate::services::{attempt_flow, enrollment, shuffle, time_window};

/// Resolves (or creates) the student's enrollment and attempt for one quiz
/// and returns the question bundle in the order this attempt should see it.
pub(in crate::api::quizzes) async fn start_quiz(
    Path(quiz_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<StartAttemptResponse>, ApiError> {
    let quiz = repositories::quizzes::find_by_id(state.db(), &quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch quiz"))?
        .ok_or_else(|| ApiError::not_found("quiz_not_found", "Quiz not found"))?;

    // Drafts are invisible to students, enrolled or not.
    if quiz.status != QuizStatus::Published {
        return Err(ApiError::not_found("quiz_not_available", "Quiz is not available"));
    }

    let questions = load_question_bundle(&state, &quiz_id).await?;

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::attempts::acquire_quiz_student_lock(&mut *tx, &quiz_id, &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire attempt lock"))?;

    let enrollment = resolve_or_enroll(&mut tx, &quiz, &student, now).await?;

    // The gate runs on every start because deferred quizzes get their start
    // time later; auto-enrollment above must survive a closed window.
    match time_window::check(now, quiz.start_time, quiz.duration_minutes) {
        time_window::WindowState::Open => {}
        time_window::WindowState::NotScheduled => {
            commit(tx).await?;
            return Err(ApiError::too_early(
                "quiz_not_scheduled",
                "Quiz has not been scheduled yet",
                json!({ "schedulingStatus": quiz.scheduling_status }),
            ));
        }
        time_window::WindowState::NotStarted => {
            commit(tx).await?;
            return Err(ApiError::too_early(
                "quiz_not_started",
                "Quiz has not started yet",
                json!({
                    "startTime": quiz.start_time.map(format_primitive),
                    "timezone": quiz.timezone,
                }),
            ));
        }
        time_window::WindowState::Ended => {
            commit(tx).await?;
            return Err(ApiError::gone("quiz_ended", "Quiz has ended"));
        }
    }

    if questions.is_empty() {
        commit(tx).await?;
        return Err(ApiError::bad_request(
            "quiz_has_no_questions",
            "Quiz has no questions configured",
        ));
    }

    let existing = repositories::attempts::find_for_enrollment(&mut *tx, &enrollment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?;

    let (attempt, resumed) = match existing {
        None => {
            let attempt =
                create_attempt(&mut tx, &quiz, &student, &enrollment, questions.len(), now).await?;
            (attempt, false)
        }
        Some(attempt) => match attempt.status {
            AttemptStatus::InProgress => {
                let remaining =
                    attempt_flow::remaining_seconds(now, attempt.start_time, quiz.duration_minutes);
                if remaining <= 0 {
                    expire_attempt(&mut tx, &quiz, &attempt, now).await?;
                    commit(tx).await?;
                    return Err(ApiError::gone("attempt_expired", "The attempt deadline has passed"));
                }
                (attempt, true)
            }
            AttemptStatus::Completed => {
                return Err(ApiError::forbidden(
                    "attempt_already_completed",
                    "This attempt is already completed",
                ));
            }
            AttemptStatus::Abandoned => {
                return Err(ApiError::gone("attempt_expired", "The attempt deadline has passed"));
            }
        },
    };

    commit(tx).await?;

    let remaining =
        attempt_flow::remaining_seconds(now, attempt.start_time, quiz.duration_minutes);
    let ordered = order_for_attempt(questions, &quiz, &attempt.id, &enrollment);

    metrics::counter!(
        "quiz_attempts_started_total",
        "resumed" => if resumed { "true" } else { "false" }
    )
    .increment(1);
    tracing::info!(
        quiz_id = %quiz.id,
        student_id = %student.id,
        attempt_id = %attempt.id,
        enrollment_id = %enrollment.id,
        resumed,
        is_reassignment = enrollment.is_reassignment,
        "Quiz attempt started"
    );

    Ok(Json(StartAttemptResponse {
        quiz: QuizPayload {
            id: quiz.id,
            title: quiz.title,
            duration_minutes: quiz.duration_minutes,
            total_questions: ordered.len(),
            questions: ordered.into_iter().map(QuestionPublic::from).collect(),
        },
        attempt_id: attempt.id,
        remaining_time: remaining,
        resumed,
        is_reassignment: enrollment.is_reassignment,
        reassignment_reason: enrollment.reassignment_reason,
    }))
}

/// Grades the submitted answers and closes the attempt. Late submissions
/// inside the grace window still grade; past it the attempt force-completes
/// with whatever was stored.
pub(in crate::api::quizzes) async fn submit_attempt(
    Path(quiz_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<Json<SubmitAttemptResponse>, ApiError> {
    payload
        .validate()
        .map_err(|e| ApiError::bad_request("validation_failed", e.to_string()))?;

    let quiz = repositories::quizzes::find_by_id(state.db(), &quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch quiz"))?
        .ok_or_else(|| ApiError::not_found("quiz_not_found", "Quiz not found"))?;

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::attempts::acquire_quiz_student_lock(&mut *tx, &quiz_id, &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to acquire attempt lock"))?;

    let attempt =
        repositories::attempts::find_by_id_for_student(&mut *tx, &payload.attempt_id, &student.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
            .filter(|attempt| attempt.quiz_id == quiz_id)
            .ok_or_else(|| ApiError::not_found("attempt_not_found", "Attempt not found"))?;

    match attempt.status {
        AttemptStatus::InProgress => {}
        AttemptStatus::Completed => {
            return Err(ApiError::forbidden(
                "attempt_already_completed",
                "This attempt is already completed",
            ));
        }
        AttemptStatus::Abandoned => {
            return Err(ApiError::gone("attempt_expired", "The attempt deadline has passed"));
        }
    }

    let remaining = attempt_flow::remaining_seconds(now, attempt.start_time, quiz.duration_minutes);
    let grace = state.settings().quiz().submit_grace_seconds;

    let questions = repositories::questions::list_by_quiz(&mut *tx, &quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;

    if !attempt_flow::within_grace(remaining, grace) {
        // Too late: the payload is discarded, stored answers are graded.
        let stored = attempt.answers.0.clone();
        let score = attempt_flow::grade(&stored, &questions);
        finish_attempt(&mut tx, &attempt, stored, score, now).await?;
        commit(tx).await?;
        metrics::counter!("quiz_submissions_total", "timing" => "late").increment(1);
        tracing::info!(
            quiz_id = %quiz.id,
            student_id = %student.id,
            attempt_id = %attempt.id,
            "Late submission force-completed from stored answers"
        );
        return Err(ApiError::gone("attempt_expired", "The attempt deadline has passed"));
    }

    let answers: Vec<AttemptAnswer> = payload.answers.into_iter().map(Into::into).collect();
    let answers = attempt_flow::dedupe_last_wins(answers);
    let score = attempt_flow::grade(&answers, &questions);
    finish_attempt(&mut tx, &attempt, answers, score, now).await?;
    commit(tx).await?;

    metrics::counter!("quiz_submissions_total", "timing" => "on_time").increment(1);
    tracing::info!(
        quiz_id = %quiz.id,
        student_id = %student.id,
        attempt_id = %attempt.id,
        score,
        total_questions = attempt.total_questions,
        "Quiz attempt submitted"
    );

    Ok(Json(SubmitAttemptResponse {
        attempt_id: attempt.id,
        score,
        total_questions: attempt.total_questions,
        status: AttemptStatus::Completed,
    }))
}

/// Question bundle in base position order, via the Redis cache when warm.
async fn load_question_bundle(
    state: &AppState,
    quiz_id: &str,
) -> Result<Vec<CachedQuestion>, ApiError> {
    if let Some(cached) = quiz_cache::get_questions(state.redis(), quiz_id).await {
        return Ok(cached);
    }

    let rows = repositories::questions::list_by_quiz(state.db(), quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let questions: Vec<CachedQuestion> = rows.iter().map(CachedQuestion::from).collect();

    quiz_cache::put_questions(
        state.redis(),
        quiz_id,
        &questions,
        state.settings().quiz().bundle_cache_ttl_seconds,
    )
    .await;

    Ok(questions)
}

async fn resolve_or_enroll(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    quiz: &Quiz,
    student: &User,
    now: time::PrimitiveDateTime,
) -> Result<Enrollment, ApiError> {
    let enrollments = repositories::enrollments::list_for_student(&mut **tx, &quiz.id, &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch enrollments"))?;

    match enrollment::resolve(&enrollments) {
        enrollment::EnrollmentDecision::Active(active) => Ok(active.clone()),
        enrollment::EnrollmentDecision::Exhausted => Err(ApiError::forbidden(
            "attempts_exhausted",
            "No attempts remaining for this quiz",
        )),
        enrollment::EnrollmentDecision::NotEnrolled => {
            repositories::educator_students::ensure_link(
                &mut **tx,
                &quiz.educator_id,
                &student.id,
                now,
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to link student to educator"))?;

            let enrollment_id = Uuid::new_v4().to_string();
            repositories::enrollments::create(
                &mut **tx,
                repositories::enrollments::CreateEnrollment {
                    id: &enrollment_id,
                    quiz_id: &quiz.id,
                    student_id: &student.id,
                    enrolled_at: now,
                    status: EnrollmentStatus::Enrolled,
                    is_reassignment: false,
                    reassignment_reason: None,
                    parent_enrollment_id: None,
                    created_at: now,
                    updated_at: now,
                },
            )
            .await
            .map_err(|e| ApiError::internal(e, "Failed to create enrollment"))?;

            // Insert may lose to a concurrent auto-enroll under the same
            // unique index; either way an open enrollment now exists.
            let enrollments =
                repositories::enrollments::list_for_student(&mut **tx, &quiz.id, &student.id)
                    .await
                    .map_err(|e| ApiError::internal(e, "Failed to fetch enrollments"))?;
            enrollment::select_active(&enrollments)
                .cloned()
                .ok_or_else(|| ApiError::Internal("Enrollment missing after create".to_string()))
        }
    }
}

async fn create_attempt(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    quiz: &Quiz,
    student: &User,
    enrollment: &Enrollment,
    total_questions: usize,
    now: time::PrimitiveDateTime,
) -> Result<QuizAttempt, ApiError> {
    let attempt_id = Uuid::new_v4().to_string();
    let inserted = repositories::attempts::create(
        &mut **tx,
        repositories::attempts::CreateAttempt {
            id: &attempt_id,
            quiz_id: &quiz.id,
            student_id: &student.id,
            enrollment_id: &enrollment.id,
            start_time: now,
            status: AttemptStatus::InProgress,
            answers: json!([]),
            total_questions: total_questions as i32,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create attempt"))?;

    if inserted {
        repositories::enrollments::mark_in_progress(&mut **tx, &enrollment.id, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to update enrollment"))?;
    }

    repositories::attempts::find_for_enrollment(&mut **tx, &enrollment.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::Internal("Attempt missing after create".to_string()))
}

/// Resume found the clock already run out: close the attempt from stored
/// answers before reporting it expired.
async fn expire_attempt(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    quiz: &Quiz,
    attempt: &QuizAttempt,
    now: time::PrimitiveDateTime,
) -> Result<(), ApiError> {
    let questions = repositories::questions::list_by_quiz(&mut **tx, &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let stored = attempt.answers.0.clone();
    let score = attempt_flow::grade(&stored, &questions);
    finish_attempt(tx, attempt, stored, score, now).await
}

async fn finish_attempt(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    attempt: &QuizAttempt,
    answers: Vec<AttemptAnswer>,
    score: i32,
    now: time::PrimitiveDateTime,
) -> Result<(), ApiError> {
    let answers_value = serde_json::to_value(&answers)
        .map_err(|e| ApiError::internal(e, "Failed to serialize answers"))?;
    repositories::attempts::complete(&mut **tx, &attempt.id, answers_value, score, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to complete attempt"))?;
    repositories::enrollments::mark_completed(&mut **tx, &attempt.enrollment_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update enrollment"))?;
    Ok(())
}

/// Reassignments always shuffle (seeded by attempt and enrollment) so the
/// retake never mirrors the original paper; otherwise the quiz's shuffle
/// flag decides.
fn order_for_attempt(
    questions: Vec<CachedQuestion>,
    quiz: &Quiz,
    attempt_id: &str,
    enrollment: &Enrollment,
) -> Vec<CachedQuestion> {
    if enrollment.is_reassignment {
        shuffle::shuffle_with_seed(questions, &shuffle::attempt_seed(attempt_id, &enrollment.id, true))
    } else if quiz.shuffle_questions {
        shuffle::shuffle_with_seed(questions, &shuffle::attempt_seed(attempt_id, &enrollment.id, false))
    } else {
        questions
    }
}

async fn commit(tx: sqlx::Transaction<'_, sqlx::Postgres>) -> Result<(), ApiError> {
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))
}
