use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "userrole", rename_all = "lowercase")]
pub(crate) enum UserRole {
    Admin,
    Educator,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "quizstatus", rename_all = "lowercase")]
pub(crate) enum QuizStatus {
    Draft,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "schedulingstatus", rename_all = "lowercase")]
pub(crate) enum SchedulingStatus {
    Scheduled,
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "enrollmentstatus", rename_all = "snake_case")]
pub(crate) enum EnrollmentStatus {
    Enrolled,
    InProgress,
    Completed,
}

impl EnrollmentStatus {
    /// Completed enrollments are spent; everything else still grants access.
    pub(crate) fn is_active(self) -> bool {
        !matches!(self, Self::Completed)
    }
}

/// Terminal states (completed, abandoned) are immutable; the repository
/// updates guard on `in_progress` so a late writer cannot reopen them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attemptstatus", rename_all = "snake_case")]
pub(crate) enum AttemptStatus {
    InProgress,
    Completed,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "questiondifficulty", rename_all = "lowercase")]
pub(crate) enum QuestionDifficulty {
    Easy,
    Intermediate,
    Hard,
}

impl QuestionDifficulty {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Self::Easy),
            "intermediate" | "medium" => Some(Self::Intermediate),
            "hard" | "difficult" => Some(Self::Hard),
            _ => None,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Intermediate => "intermediate",
            Self::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "bloomslevel", rename_all = "lowercase")]
pub(crate) enum BloomsLevel {
    Knowledge,
    Comprehension,
    Application,
    Analysis,
    Synthesis,
    Evaluation,
}

impl BloomsLevel {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "knowledge" => Some(Self::Knowledge),
            "comprehension" => Some(Self::Comprehension),
            "application" => Some(Self::Application),
            "analysis" => Some(Self::Analysis),
            "synthesis" => Some(Self::Synthesis),
            "evaluation" => Some(Self::Evaluation),
            _ => None,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::Comprehension => "comprehension",
            Self::Application => "application",
            Self::Analysis => "analysis",
            Self::Synthesis => "synthesis",
            Self::Evaluation => "evaluation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrollment_activity_follows_status() {
        assert!(EnrollmentStatus::Enrolled.is_active());
        assert!(EnrollmentStatus::InProgress.is_active());
        assert!(!EnrollmentStatus::Completed.is_active());
    }

    #[test]
    fn statuses_serialize_in_wire_case() {
        assert_eq!(serde_json::to_value(AttemptStatus::InProgress).unwrap(), "in_progress");
        assert_eq!(serde_json::to_value(EnrollmentStatus::Completed).unwrap(), "completed");
        assert_eq!(serde_json::to_value(QuizStatus::Published).unwrap(), "published");
        assert_eq!(serde_json::to_value(BloomsLevel::Comprehension).unwrap(), "comprehension");
    }

    #[test]
    fn parse_accepts_synonyms_and_rejects_unknown() {
        assert_eq!(QuestionDifficulty::parse("Medium"), Some(QuestionDifficulty::Intermediate));
        assert_eq!(QuestionDifficulty::parse(" hard "), Some(QuestionDifficulty::Hard));
        assert_eq!(QuestionDifficulty::parse("impossible"), None);
        assert_eq!(BloomsLevel::parse("Analysis"), Some(BloomsLevel::Analysis));
        assert_eq!(BloomsLevel::parse("recall"), None);
    }
}
