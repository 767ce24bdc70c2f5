/// Adds the student to the educator's roster if not already there. Runs as
/// part of auto-enrollment so rosters stay consistent with quiz access.
pub(crate) async fn ensure_link(
    executor: impl sqlx::PgExecutor<'_>,
    educator_id: &str,
    student_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO educator_students (educator_id, student_id, created_at) \
         VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
    )
    .bind(educator_id)
    .bind(student_id)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
