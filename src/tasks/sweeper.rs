use anyhow::{Context, Result};
use time::OffsetDateTime;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;

const STALE_ATTEMPT_BATCH: i64 = 200;

/// Fails non-terminal generation jobs past their deadline so polling clients
/// see a definitive state instead of an eternal `processing`.
pub(crate) async fn sweep_generation_jobs(state: &AppState) -> Result<u64> {
    let now_unix = OffsetDateTime::now_utc().unix_timestamp();
    let expired = state
        .jobs()
        .sweep_expired(now_unix)
        .await
        .context("Failed to sweep generation jobs")?;

    if expired > 0 {
        tracing::info!(expired_jobs = expired, "Expired generation jobs marked failed");
        metrics::counter!("generation_jobs_expired_total").increment(expired);
    }

    Ok(expired)
}

/// Abandons in-progress attempts whose deadline plus the sweep grace has
/// passed, closing their enrollments so the student cannot restart them.
pub(crate) async fn sweep_stale_attempts(state: &AppState) -> Result<u64> {
    let now = primitive_now_utc();
    let grace = state.settings().quiz().attempt_sweep_grace_seconds as f64;

    let stale =
        repositories::attempts::list_stale_in_progress(state.db(), now, grace, STALE_ATTEMPT_BATCH)
            .await
            .context("Failed to list stale attempts")?;

    let mut abandoned = 0u64;
    for attempt in stale {
        let mut tx = state.db().begin().await.context("Failed to start transaction")?;
        // The update is guarded on status, so a submit landing between the
        // scan and here wins and this row is skipped.
        let changed = repositories::attempts::abandon(&mut *tx, &attempt.id, now)
            .await
            .context("Failed to abandon attempt")?;
        if changed {
            repositories::enrollments::mark_completed(&mut *tx, &attempt.enrollment_id, now)
                .await
                .context("Failed to close enrollment")?;
        }
        tx.commit().await.context("Failed to commit abandonment")?;

        if changed {
            abandoned += 1;
            tracing::info!(
                attempt_id = %attempt.id,
                quiz_id = %attempt.quiz_id,
                student_id = %attempt.student_id,
                "Stale attempt abandoned"
            );
        }
    }

    if abandoned > 0 {
        metrics::counter!("attempts_abandoned_total").increment(abandoned);
    }

    Ok(abandoned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::job_store::{GenerationJob, JobStatus, ReplacementContext};
    use crate::test_support;

    fn stub_context(quiz_id: &str) -> ReplacementContext {
        ReplacementContext {
            question_id_to_replace: "q-1".to_string(),
            quiz_id: quiz_id.to_string(),
            books: vec!["Genesis".to_string()],
            chapters: vec!["1".to_string()],
            difficulty: "easy".to_string(),
            blooms_level: "knowledge".to_string(),
            topic: None,
        }
    }

    #[tokio::test]
    async fn sweep_fails_overdue_jobs_and_leaves_live_ones() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let ctx = test_support::offline_context();

        ctx.state
            .jobs()
            .create(GenerationJob::new("replace-stale".to_string(), stub_context("quiz-1"), 0))
            .await
            .expect("create stale");
        ctx.state
            .jobs()
            .create(GenerationJob::new("replace-live".to_string(), stub_context("quiz-1"), 600))
            .await
            .expect("create live");

        let expired = sweep_generation_jobs(&ctx.state).await.expect("sweep");
        assert_eq!(expired, 1);

        let stale = ctx.state.jobs().get("replace-stale").await.expect("get").expect("present");
        assert_eq!(stale.status, JobStatus::Failed);
        let live = ctx.state.jobs().get("replace-live").await.expect("get").expect("present");
        assert_eq!(live.status, JobStatus::Pending);
    }
}
