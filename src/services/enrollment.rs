use crate::db::models::Enrollment;

/// Outcome of resolving a student's enrollments for one quiz.
#[derive(Debug)]
pub(crate) enum EnrollmentDecision<'a> {
    /// An open enrollment exists; attempts run under it.
    Active(&'a Enrollment),
    /// The student has never been enrolled here.
    NotEnrolled,
    /// Every enrollment is completed, so no attempts remain.
    Exhausted,
}

/// Resolves which enrollment an attempt should run under. The slice comes
/// from the repository newest first. Completed enrollments are spent, so a
/// reassignment (a fresh pending enrollment created after the originals were
/// completed) naturally wins over the enrollment it replaced.
pub(crate) fn resolve(enrollments: &[Enrollment]) -> EnrollmentDecision<'_> {
    if enrollments.is_empty() {
        return EnrollmentDecision::NotEnrolled;
    }
    match select_active(enrollments) {
        Some(enrollment) => EnrollmentDecision::Active(enrollment),
        None => EnrollmentDecision::Exhausted,
    }
}

pub(crate) fn select_active(enrollments: &[Enrollment]) -> Option<&Enrollment> {
    enrollments.iter().find(|enrollment| enrollment.status.is_active())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use time::PrimitiveDateTime;

    use crate::db::types::EnrollmentStatus;

    fn enrollment(id: &str, status: EnrollmentStatus, enrolled_at: PrimitiveDateTime) -> Enrollment {
        Enrollment {
            id: id.to_string(),
            quiz_id: "quiz-1".to_string(),
            student_id: "student-1".to_string(),
            enrolled_at,
            status,
            started_at: None,
            completed_at: None,
            is_reassignment: false,
            reassignment_reason: None,
            parent_enrollment_id: None,
            created_at: enrolled_at,
            updated_at: enrolled_at,
        }
    }

    #[test]
    fn empty_list_means_not_enrolled() {
        assert!(matches!(resolve(&[]), EnrollmentDecision::NotEnrolled));
    }

    #[test]
    fn all_completed_means_exhausted() {
        let enrollments = vec![
            enrollment("e-2", EnrollmentStatus::Completed, datetime!(2025-03-10 12:00)),
            enrollment("e-1", EnrollmentStatus::Completed, datetime!(2025-03-09 09:00)),
        ];
        assert!(matches!(resolve(&enrollments), EnrollmentDecision::Exhausted));
    }

    #[test]
    fn newest_open_enrollment_wins() {
        let mut reassignment =
            enrollment("e-3", EnrollmentStatus::Enrolled, datetime!(2025-03-11 08:00));
        reassignment.is_reassignment = true;
        let enrollments = vec![
            reassignment,
            enrollment("e-2", EnrollmentStatus::Completed, datetime!(2025-03-10 12:00)),
            enrollment("e-1", EnrollmentStatus::Completed, datetime!(2025-03-09 09:00)),
        ];

        match resolve(&enrollments) {
            EnrollmentDecision::Active(active) => {
                assert_eq!(active.id, "e-3");
                assert!(active.is_reassignment);
            }
            other => panic!("expected an active enrollment, got {other:?}"),
        }
    }

    #[test]
    fn in_progress_enrollment_is_still_active() {
        let enrollments = vec![enrollment(
            "e-1",
            EnrollmentStatus::InProgress,
            datetime!(2025-03-10 12:00),
        )];
        assert!(matches!(resolve(&enrollments), EnrollmentDecision::Active(_)));
    }
}
