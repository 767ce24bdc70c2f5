use serde::{Deserialize, Serialize};

use crate::core::redis::RedisHandle;
use crate::db::models::{Question, QuestionOption};
use crate::db::types::BloomsLevel;

const QUIZ_BUNDLE_KEY_PREFIX: &str = "quiz-bundle:";

/// Student-safe slice of a question row. Correct answers and explanations
/// never enter the cache, so a leaked cache entry cannot spoil a quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CachedQuestion {
    pub(crate) id: String,
    pub(crate) question_text: String,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) order_index: i32,
    pub(crate) book: Option<String>,
    pub(crate) chapter: Option<String>,
    pub(crate) topic: Option<String>,
    pub(crate) blooms_level: BloomsLevel,
}

impl From<&Question> for CachedQuestion {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            question_text: question.question_text.clone(),
            options: question.options.0.clone(),
            order_index: question.order_index,
            book: question.book.clone(),
            chapter: question.chapter.clone(),
            topic: question.topic.clone(),
            blooms_level: question.blooms_level,
        }
    }
}

fn bundle_key(quiz_id: &str) -> String {
    format!("{QUIZ_BUNDLE_KEY_PREFIX}{quiz_id}")
}

/// Cache reads are best effort. Any Redis or decode problem degrades to a
/// miss and the caller falls through to Postgres.
pub(crate) async fn get_questions(redis: &RedisHandle, quiz_id: &str) -> Option<Vec<CachedQuestion>> {
    let key = bundle_key(quiz_id);
    match redis.get_string(&key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(questions) => Some(questions),
            Err(error) => {
                tracing::warn!(quiz_id = %quiz_id, error = %error, "discarding undecodable quiz bundle cache entry");
                let _ = redis.delete(&key).await;
                None
            }
        },
        Ok(None) => None,
        Err(error) => {
            tracing::warn!(quiz_id = %quiz_id, error = %error, "quiz bundle cache read failed");
            None
        }
    }
}

pub(crate) async fn put_questions(
    redis: &RedisHandle,
    quiz_id: &str,
    questions: &[CachedQuestion],
    ttl_seconds: u64,
) {
    if ttl_seconds == 0 {
        return;
    }
    let raw = match serde_json::to_string(questions) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(quiz_id = %quiz_id, error = %error, "failed to serialize quiz bundle for cache");
            return;
        }
    };
    if let Err(error) = redis.set_string(&bundle_key(quiz_id), &raw, ttl_seconds).await {
        tracing::warn!(quiz_id = %quiz_id, error = %error, "quiz bundle cache write failed");
    }
}

/// Called whenever a question row changes underneath a quiz.
pub(crate) async fn invalidate(redis: &RedisHandle, quiz_id: &str) {
    if let Err(error) = redis.delete(&bundle_key(quiz_id)).await {
        tracing::warn!(quiz_id = %quiz_id, error = %error, "quiz bundle cache invalidation failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_keys_are_namespaced_by_quiz() {
        assert_eq!(bundle_key("quiz-7"), "quiz-bundle:quiz-7");
    }

    #[tokio::test]
    async fn disconnected_cache_degrades_to_misses() {
        let redis = RedisHandle::new("redis://localhost:1/0".to_string());

        assert!(get_questions(&redis, "quiz-1").await.is_none());
        put_questions(&redis, "quiz-1", &[], 60).await;
        invalidate(&redis, "quiz-1").await;
        assert!(get_questions(&redis, "quiz-1").await.is_none());
    }
}
