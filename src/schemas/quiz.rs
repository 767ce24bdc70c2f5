use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::{AttemptAnswer, QuestionOption};
use crate::db::types::{AttemptStatus, BloomsLevel};
use crate::services::quiz_cache::CachedQuestion;

/// What a student is allowed to see mid-attempt. Correct answers and
/// explanations stay server side until the quiz is over.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionPublic {
    pub(crate) id: String,
    pub(crate) question_text: String,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) order_index: i32,
    pub(crate) book: Option<String>,
    pub(crate) chapter: Option<String>,
    pub(crate) topic: Option<String>,
    pub(crate) blooms_level: BloomsLevel,
}

impl From<CachedQuestion> for QuestionPublic {
    fn from(question: CachedQuestion) -> Self {
        Self {
            id: question.id,
            question_text: question.question_text,
            options: question.options,
            order_index: question.order_index,
            book: question.book,
            chapter: question.chapter,
            topic: question.topic,
            blooms_level: question.blooms_level,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuizPayload {
    pub(crate) id: String,
    pub(crate) title: String,
    /// Attempt length in minutes.
    #[serde(rename = "duration")]
    pub(crate) duration_minutes: i32,
    pub(crate) total_questions: usize,
    pub(crate) questions: Vec<QuestionPublic>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartAttemptResponse {
    pub(crate) quiz: QuizPayload,
    pub(crate) attempt_id: String,
    /// Seconds left on the attempt clock at the moment of response.
    pub(crate) remaining_time: i64,
    pub(crate) resumed: bool,
    pub(crate) is_reassignment: bool,
    pub(crate) reassignment_reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerSubmission {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(alias = "selectedOption")]
    #[validate(length(min = 1, message = "selected_option must not be empty"))]
    pub(crate) selected_option: String,
}

impl From<AnswerSubmission> for AttemptAnswer {
    fn from(answer: AnswerSubmission) -> Self {
        Self {
            question_id: answer.question_id,
            selected_option: answer.selected_option,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmitAttemptRequest {
    #[serde(alias = "attemptId")]
    #[validate(length(min = 1, message = "attempt_id must not be empty"))]
    pub(crate) attempt_id: String,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) answers: Vec<AnswerSubmission>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitAttemptResponse {
    pub(crate) attempt_id: String,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) status: AttemptStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ReassignRequest {
    #[validate(length(min = 1, max = 500, message = "reason must be 1 to 500 characters"))]
    pub(crate) reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReassignResponse {
    pub(crate) enrollment_id: String,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) is_reassignment: bool,
    pub(crate) reassignment_reason: Option<String>,
    pub(crate) parent_enrollment_id: Option<String>,
    pub(crate) enrolled_at: String,
}
