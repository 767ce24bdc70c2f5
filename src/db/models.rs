use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{
    AttemptStatus, BloomsLevel, EnrollmentStatus, QuestionDifficulty, QuizStatus, SchedulingStatus,
    UserRole,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Quiz {
    pub(crate) id: String,
    pub(crate) educator_id: String,
    pub(crate) title: String,
    pub(crate) duration_minutes: i32,
    pub(crate) total_questions: i32,
    pub(crate) start_time: Option<PrimitiveDateTime>,
    pub(crate) timezone: String,
    pub(crate) shuffle_questions: bool,
    pub(crate) status: QuizStatus,
    pub(crate) scheduling_status: SchedulingStatus,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One multiple-choice option as stored in the `questions.options` JSONB list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct QuestionOption {
    pub(crate) id: String,
    pub(crate) text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) question_text: String,
    pub(crate) options: Json<Vec<QuestionOption>>,
    pub(crate) correct_answer: String,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: QuestionDifficulty,
    pub(crate) blooms_level: BloomsLevel,
    pub(crate) topic: Option<String>,
    pub(crate) book: Option<String>,
    pub(crate) chapter: Option<String>,
    pub(crate) order_index: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Enrollment {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) enrolled_at: PrimitiveDateTime,
    pub(crate) status: EnrollmentStatus,
    pub(crate) started_at: Option<PrimitiveDateTime>,
    pub(crate) completed_at: Option<PrimitiveDateTime>,
    pub(crate) is_reassignment: bool,
    pub(crate) reassignment_reason: Option<String>,
    pub(crate) parent_enrollment_id: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One answer as stored in the `quiz_attempts.answers` JSONB list. Kept in
/// wire shape (camelCase) so stored answers round-trip to clients unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttemptAnswer {
    pub(crate) question_id: String,
    pub(crate) selected_option: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuizAttempt {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) enrollment_id: String,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: Option<PrimitiveDateTime>,
    pub(crate) status: AttemptStatus,
    pub(crate) answers: Json<Vec<AttemptAnswer>>,
    pub(crate) total_questions: i32,
    pub(crate) score: Option<i32>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
