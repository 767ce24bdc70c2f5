use sqlx::PgPool;

use crate::db::models::Enrollment;
use crate::db::types::EnrollmentStatus;

const COLUMNS: &str = "\
    id, quiz_id, student_id, enrolled_at, status, started_at, completed_at, \
    is_reassignment, reassignment_reason, parent_enrollment_id, created_at, updated_at";

/// Newest first; the enrollment resolver scans in this order.
pub(crate) async fn list_for_student(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
    student_id: &str,
) -> Result<Vec<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {COLUMNS} FROM enrollments \
         WHERE quiz_id = $1 AND student_id = $2 \
         ORDER BY enrolled_at DESC, id DESC"
    ))
    .bind(quiz_id)
    .bind(student_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn find_by_id_for_quiz(
    pool: &PgPool,
    id: &str,
    quiz_id: &str,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {COLUMNS} FROM enrollments WHERE id = $1 AND quiz_id = $2"
    ))
    .bind(id)
    .bind(quiz_id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct CreateEnrollment<'a> {
    pub(crate) id: &'a str,
    pub(crate) quiz_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) enrolled_at: time::PrimitiveDateTime,
    pub(crate) status: EnrollmentStatus,
    pub(crate) is_reassignment: bool,
    pub(crate) reassignment_reason: Option<&'a str>,
    pub(crate) parent_enrollment_id: Option<&'a str>,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

/// Inserts unless the partial unique index already holds an open enrollment
/// for this (quiz, student). Returns whether a row landed.
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    enrollment: CreateEnrollment<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO enrollments (
            id, quiz_id, student_id, enrolled_at, status,
            is_reassignment, reassignment_reason, parent_enrollment_id,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
        ON CONFLICT DO NOTHING",
    )
    .bind(enrollment.id)
    .bind(enrollment.quiz_id)
    .bind(enrollment.student_id)
    .bind(enrollment.enrolled_at)
    .bind(enrollment.status)
    .bind(enrollment.is_reassignment)
    .bind(enrollment.reassignment_reason)
    .bind(enrollment.parent_enrollment_id)
    .bind(enrollment.created_at)
    .bind(enrollment.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn mark_in_progress(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE enrollments SET status = $1, started_at = COALESCE(started_at, $2), updated_at = $2 \
         WHERE id = $3",
    )
    .bind(EnrollmentStatus::InProgress)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn mark_completed(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE enrollments SET status = $1, completed_at = $2, updated_at = $2 WHERE id = $3",
    )
    .bind(EnrollmentStatus::Completed)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Spends every open enrollment for the pair. Run before inserting a
/// reassignment so the partial unique index has room for the new row.
pub(crate) async fn complete_active_for_student(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
    student_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE enrollments SET status = $1, completed_at = $2, updated_at = $2 \
         WHERE quiz_id = $3 AND student_id = $4 AND status <> $1",
    )
    .bind(EnrollmentStatus::Completed)
    .bind(now)
    .bind(quiz_id)
    .bind(student_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
