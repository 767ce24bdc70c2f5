use sqlx::PgPool;

use crate::db::models::Quiz;

const COLUMNS: &str = "\
    id, educator_id, title, duration_minutes, total_questions, start_time, \
    timezone, shuffle_questions, status, scheduling_status, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {COLUMNS} FROM quizzes WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Ownership check folded into the lookup: a quiz belonging to someone else
/// reads as absent, so educator routes answer 404 instead of leaking it.
pub(crate) async fn find_by_id_for_educator(
    pool: &PgPool,
    id: &str,
    educator_id: &str,
) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {COLUMNS} FROM quizzes WHERE id = $1 AND educator_id = $2"
    ))
    .bind(id)
    .bind(educator_id)
    .fetch_optional(pool)
    .await
}
