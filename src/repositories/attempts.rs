use sqlx::PgPool;

use crate::db::models::QuizAttempt;
use crate::db::types::AttemptStatus;

const COLUMNS: &str = "\
    id, quiz_id, student_id, enrollment_id, start_time, end_time, status, \
    answers, total_questions, score, created_at, updated_at";

/// Serializes concurrent starts for one (quiz, student) pair on the current
/// transaction. Released automatically at commit or rollback.
pub(crate) async fn acquire_quiz_student_lock(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
    student_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1), hashtext($2))")
        .bind(quiz_id)
        .bind(student_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn find_for_enrollment(
    executor: impl sqlx::PgExecutor<'_>,
    enrollment_id: &str,
) -> Result<Option<QuizAttempt>, sqlx::Error> {
    sqlx::query_as::<_, QuizAttempt>(&format!(
        "SELECT {COLUMNS} FROM quiz_attempts WHERE enrollment_id = $1"
    ))
    .bind(enrollment_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_by_id_for_student(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    student_id: &str,
) -> Result<Option<QuizAttempt>, sqlx::Error> {
    sqlx::query_as::<_, QuizAttempt>(&format!(
        "SELECT {COLUMNS} FROM quiz_attempts WHERE id = $1 AND student_id = $2"
    ))
    .bind(id)
    .bind(student_id)
    .fetch_optional(executor)
    .await
}

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) quiz_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) enrollment_id: &'a str,
    pub(crate) start_time: time::PrimitiveDateTime,
    pub(crate) status: AttemptStatus,
    pub(crate) answers: serde_json::Value,
    pub(crate) total_questions: i32,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

/// Inserts unless the enrollment already carries an attempt; a lost race
/// reads the winner back via [`find_for_enrollment`].
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    attempt: CreateAttempt<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO quiz_attempts (
            id, quiz_id, student_id, enrollment_id, start_time,
            status, answers, total_questions, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
        ON CONFLICT DO NOTHING",
    )
    .bind(attempt.id)
    .bind(attempt.quiz_id)
    .bind(attempt.student_id)
    .bind(attempt.enrollment_id)
    .bind(attempt.start_time)
    .bind(attempt.status)
    .bind(attempt.answers)
    .bind(attempt.total_questions)
    .bind(attempt.created_at)
    .bind(attempt.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn complete(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    answers: serde_json::Value,
    score: i32,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quiz_attempts SET status = $1, end_time = $2, answers = $3, score = $4, updated_at = $2 \
         WHERE id = $5",
    )
    .bind(AttemptStatus::Completed)
    .bind(now)
    .bind(answers)
    .bind(score)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Abandons only if the attempt is still running, so a submit that lands
/// between the sweep scan and this update wins.
pub(crate) async fn abandon(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE quiz_attempts SET status = $1, end_time = $2, updated_at = $2 \
         WHERE id = $3 AND status = $4",
    )
    .bind(AttemptStatus::Abandoned)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::InProgress)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StaleAttempt {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) enrollment_id: String,
}

/// Attempts whose deadline (plus grace) passed without a submit.
pub(crate) async fn list_stale_in_progress(
    pool: &PgPool,
    now: time::PrimitiveDateTime,
    grace_seconds: f64,
    limit: i64,
) -> Result<Vec<StaleAttempt>, sqlx::Error> {
    sqlx::query_as::<_, StaleAttempt>(
        "SELECT a.id, a.quiz_id, a.student_id, a.enrollment_id
         FROM quiz_attempts a
         JOIN quizzes q ON q.id = a.quiz_id
         WHERE a.status = $1
           AND a.start_time + make_interval(mins => q.duration_minutes) + make_interval(secs => $2) < $3
         ORDER BY a.start_time
         LIMIT $4",
    )
    .bind(AttemptStatus::InProgress)
    .bind(grace_seconds)
    .bind(now)
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}
