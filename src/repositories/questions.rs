use sqlx::PgPool;

use crate::db::models::Question;
use crate::db::types::{BloomsLevel, QuestionDifficulty};

const COLUMNS: &str = "\
    id, quiz_id, question_text, options, correct_answer, explanation, \
    difficulty, blooms_level, topic, book, chapter, order_index, created_at, updated_at";

/// Ordered by position with the id as tie-break, so the base order every
/// seeded shuffle starts from is stable across reads.
pub(crate) async fn list_by_quiz(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE quiz_id = $1 ORDER BY order_index, id"
    ))
    .bind(quiz_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn find_by_id_for_quiz(
    pool: &PgPool,
    id: &str,
    quiz_id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE id = $1 AND quiz_id = $2"
    ))
    .bind(id)
    .bind(quiz_id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct ReplaceQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) quiz_id: &'a str,
    pub(crate) question_text: &'a str,
    pub(crate) options: serde_json::Value,
    pub(crate) correct_answer: &'a str,
    pub(crate) explanation: Option<&'a str>,
    pub(crate) difficulty: QuestionDifficulty,
    pub(crate) blooms_level: BloomsLevel,
    pub(crate) topic: Option<&'a str>,
    pub(crate) book: Option<&'a str>,
    pub(crate) chapter: Option<&'a str>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

/// Swaps a question's content in place, keeping its id and position so open
/// attempts keep referencing the same row. `None` means the row is gone or
/// belongs to a different quiz.
pub(crate) async fn replace_content(
    pool: &PgPool,
    params: ReplaceQuestion<'_>,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET
            question_text = $1,
            options = $2,
            correct_answer = $3,
            explanation = $4,
            difficulty = $5,
            blooms_level = $6,
            topic = $7,
            book = $8,
            chapter = $9,
            updated_at = $10
         WHERE id = $11 AND quiz_id = $12
         RETURNING {COLUMNS}"
    ))
    .bind(params.question_text)
    .bind(params.options)
    .bind(params.correct_answer)
    .bind(params.explanation)
    .bind(params.difficulty)
    .bind(params.blooms_level)
    .bind(params.topic)
    .bind(params.book)
    .bind(params.chapter)
    .bind(params.updated_at)
    .bind(params.id)
    .bind(params.quiz_id)
    .fetch_optional(pool)
    .await
}
