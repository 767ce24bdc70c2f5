use std::collections::HashMap;

use async_trait::async_trait;
use redis::{AsyncCommands, RedisError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::core::redis::RedisHandle;

const JOB_KEY_PREFIX: &str = "generation-job:";

/// How long a finished job stays readable after its deadline, so polling
/// clients can still fetch the terminal state.
const TERMINAL_RETENTION_SECONDS: i64 = 3600;

const CAS_MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// The generation parameters captured when the educator requested a
/// replacement. The webhook processor reads these back for fallbacks and to
/// know which question row to overwrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ReplacementContext {
    pub(crate) question_id_to_replace: String,
    pub(crate) quiz_id: String,
    pub(crate) books: Vec<String>,
    pub(crate) chapters: Vec<String>,
    pub(crate) difficulty: String,
    pub(crate) blooms_level: String,
    pub(crate) topic: Option<String>,
}

/// One asynchronous generation job, correlated by job_id across the dispatch
/// call and the webhook callback. Timestamps are unix seconds; `revision`
/// increments on every write and backs the compare-and-swap in the Redis
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GenerationJob {
    pub(crate) job_id: String,
    pub(crate) status: JobStatus,
    pub(crate) progress: u8,
    pub(crate) message: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) request: ReplacementContext,
    pub(crate) questions_data: Option<Value>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
    pub(crate) expires_at: i64,
    pub(crate) revision: u64,
}

impl GenerationJob {
    pub(crate) fn new(job_id: String, request: ReplacementContext, ttl_seconds: u64) -> Self {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            job_id,
            status: JobStatus::Pending,
            progress: 0,
            message: None,
            error: None,
            request,
            questions_data: None,
            created_at: now,
            updated_at: now,
            expires_at: now + ttl_seconds as i64,
            revision: 0,
        }
    }

    pub(crate) fn is_expired(&self, now_unix: i64) -> bool {
        now_unix >= self.expires_at
    }

    fn apply(&mut self, update: JobUpdate, now_unix: i64) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(message) = update.message {
            self.message = Some(message);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(data) = update.questions_data {
            self.questions_data = Some(data);
        }
        self.updated_at = now_unix;
        self.revision += 1;
    }
}

/// A partial job mutation. Unset fields keep their stored values.
#[derive(Debug, Clone, Default)]
pub(crate) struct JobUpdate {
    pub(crate) status: Option<JobStatus>,
    pub(crate) progress: Option<u8>,
    pub(crate) message: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) questions_data: Option<Value>,
}

#[derive(Debug, Error)]
pub(crate) enum JobStoreError {
    #[error("job not found")]
    NotFound,
    /// Completed and failed jobs are immutable; callers treat this as the
    /// idempotent duplicate-callback case.
    #[error("job already {}", .0.as_str())]
    Terminal(JobStatus),
    #[error("job store backend is unavailable")]
    Unavailable,
    #[error("job update lost the revision race repeatedly")]
    Contention,
    #[error(transparent)]
    Redis(#[from] RedisError),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// Ledger correlating dispatched generation requests with later webhook
/// callbacks. Injected so handlers and tests never touch a global map.
#[async_trait]
pub(crate) trait JobStore: Send + Sync {
    /// Which backend holds the jobs; surfaced by the health endpoint.
    fn backend(&self) -> &'static str;

    async fn create(&self, job: GenerationJob) -> Result<(), JobStoreError>;

    async fn get(&self, job_id: &str) -> Result<Option<GenerationJob>, JobStoreError>;

    /// Merges `update` into the stored job. Fails with [`JobStoreError::Terminal`]
    /// when the job already finished; terminal states never change again.
    async fn update(&self, job_id: &str, update: JobUpdate)
        -> Result<GenerationJob, JobStoreError>;

    async fn remove(&self, job_id: &str) -> Result<(), JobStoreError>;

    /// Marks non-terminal jobs past their deadline as failed and reports how
    /// many were flipped. Also evicts entries nobody will poll again.
    async fn sweep_expired(&self, now_unix: i64) -> Result<u64, JobStoreError>;
}

/// Process-local store. Used when Redis is unreachable and in tests; jobs are
/// lost on restart, which polling clients must tolerate.
#[derive(Default)]
pub(crate) struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, GenerationJob>>,
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    fn backend(&self) -> &'static str {
        "in_memory"
    }

    async fn create(&self, job: GenerationJob) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock().await;
        jobs.insert(job.job_id.clone(), job);
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<GenerationJob>, JobStoreError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs.get(job_id).cloned())
    }

    async fn update(
        &self,
        job_id: &str,
        update: JobUpdate,
    ) -> Result<GenerationJob, JobStoreError> {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(job_id).ok_or(JobStoreError::NotFound)?;
        if job.status.is_terminal() {
            return Err(JobStoreError::Terminal(job.status));
        }

        job.apply(update, OffsetDateTime::now_utc().unix_timestamp());
        Ok(job.clone())
    }

    async fn remove(&self, job_id: &str) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock().await;
        jobs.remove(job_id);
        Ok(())
    }

    async fn sweep_expired(&self, now_unix: i64) -> Result<u64, JobStoreError> {
        let mut jobs = self.jobs.lock().await;
        let mut failed = 0u64;

        for job in jobs.values_mut() {
            if !job.status.is_terminal() && job.is_expired(now_unix) {
                job.apply(
                    JobUpdate {
                        status: Some(JobStatus::Failed),
                        error: Some("generation timed out".to_string()),
                        ..JobUpdate::default()
                    },
                    now_unix,
                );
                failed += 1;
            }
        }

        jobs.retain(|_, job| now_unix < job.expires_at + TERMINAL_RETENTION_SECONDS);
        Ok(failed)
    }
}

/// Redis-backed store for horizontally scaled deployments. Updates go through
/// a revision compare-and-swap so two concurrent callbacks for one job cannot
/// interleave their read-modify-write cycles.
pub(crate) struct RedisJobStore {
    redis: RedisHandle,
}

impl RedisJobStore {
    pub(crate) fn new(redis: RedisHandle) -> Self {
        Self { redis }
    }

    fn key(job_id: &str) -> String {
        format!("{JOB_KEY_PREFIX}{job_id}")
    }

    fn ttl_for(job: &GenerationJob, now_unix: i64) -> u64 {
        let remaining = (job.expires_at - now_unix).max(0);
        (remaining + TERMINAL_RETENTION_SECONDS) as u64
    }

    fn cas_script() -> redis::Script {
        redis::Script::new(
            r#"
            local current = redis.call("GET", KEYS[1])
            if not current then
                return -1
            end
            local decoded = cjson.decode(current)
            if tostring(decoded.revision) ~= ARGV[2] then
                return 0
            end
            redis.call("SET", KEYS[1], ARGV[1], "EX", tonumber(ARGV[3]))
            return 1
        "#,
        )
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn create(&self, job: GenerationJob) -> Result<(), JobStoreError> {
        let Some(mut manager) = self.redis.manager().await else {
            return Err(JobStoreError::Unavailable);
        };

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let serialized = serde_json::to_string(&job)?;
        manager.set_ex::<_, _, ()>(Self::key(&job.job_id), serialized, Self::ttl_for(&job, now)).await?;
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<GenerationJob>, JobStoreError> {
        let Some(mut manager) = self.redis.manager().await else {
            return Err(JobStoreError::Unavailable);
        };

        let raw: Option<String> = manager.get(Self::key(job_id)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        job_id: &str,
        update: JobUpdate,
    ) -> Result<GenerationJob, JobStoreError> {
        let Some(mut manager) = self.redis.manager().await else {
            return Err(JobStoreError::Unavailable);
        };

        let key = Self::key(job_id);
        let script = Self::cas_script();

        for _ in 0..CAS_MAX_ATTEMPTS {
            let raw: Option<String> = manager.get(&key).await?;
            let Some(raw) = raw else {
                return Err(JobStoreError::NotFound);
            };

            let mut job: GenerationJob = serde_json::from_str(&raw)?;
            if job.status.is_terminal() {
                return Err(JobStoreError::Terminal(job.status));
            }

            let now = OffsetDateTime::now_utc().unix_timestamp();
            let expected_revision = job.revision;
            job.apply(update.clone(), now);
            let serialized = serde_json::to_string(&job)?;

            let outcome: i64 = script
                .key(&key)
                .arg(&serialized)
                .arg(expected_revision.to_string())
                .arg(Self::ttl_for(&job, now))
                .invoke_async(&mut manager)
                .await?;

            match outcome {
                1 => return Ok(job),
                -1 => return Err(JobStoreError::NotFound),
                _ => continue,
            }
        }

        Err(JobStoreError::Contention)
    }

    async fn remove(&self, job_id: &str) -> Result<(), JobStoreError> {
        let Some(mut manager) = self.redis.manager().await else {
            return Err(JobStoreError::Unavailable);
        };

        manager.del::<_, ()>(Self::key(job_id)).await?;
        Ok(())
    }

    async fn sweep_expired(&self, now_unix: i64) -> Result<u64, JobStoreError> {
        let Some(manager) = self.redis.manager().await else {
            return Err(JobStoreError::Unavailable);
        };

        let mut keys = Vec::new();
        {
            let mut scan_conn = manager.clone();
            let mut iter = scan_conn.scan_match::<_, String>(format!("{JOB_KEY_PREFIX}*")).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        let mut fetch_conn = manager.clone();
        let mut failed = 0u64;
        for key in keys {
            let raw: Option<String> = fetch_conn.get(&key).await?;
            let Some(raw) = raw else { continue };
            let Ok(job) = serde_json::from_str::<GenerationJob>(&raw) else {
                tracing::warn!(key = %key, "Evicting undecodable generation job entry");
                fetch_conn.del::<_, ()>(&key).await?;
                continue;
            };

            if job.status.is_terminal() || !job.is_expired(now_unix) {
                continue;
            }

            match self
                .update(
                    &job.job_id,
                    JobUpdate {
                        status: Some(JobStatus::Failed),
                        error: Some("generation timed out".to_string()),
                        ..JobUpdate::default()
                    },
                )
                .await
            {
                Ok(_) => failed += 1,
                // A late callback finished the job between the scan and here.
                Err(JobStoreError::Terminal(_)) | Err(JobStoreError::NotFound) => {}
                Err(err) => return Err(err),
            }
        }

        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_context() -> ReplacementContext {
        ReplacementContext {
            question_id_to_replace: "q-1".to_string(),
            quiz_id: "quiz-1".to_string(),
            books: vec!["Exodus".to_string()],
            chapters: vec!["20".to_string()],
            difficulty: "intermediate".to_string(),
            blooms_level: "knowledge".to_string(),
            topic: None,
        }
    }

    fn sample_job(job_id: &str, ttl_seconds: u64) -> GenerationJob {
        GenerationJob::new(job_id.to_string(), sample_context(), ttl_seconds)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryJobStore::default();
        store.create(sample_job("replace-1", 600)).await.expect("create");

        let job = store.get("replace-1").await.expect("get").expect("present");
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.revision, 0);
    }

    #[tokio::test]
    async fn unknown_job_reads_as_none_and_updates_as_not_found() {
        let store = InMemoryJobStore::default();

        assert!(store.get("replace-missing").await.expect("get").is_none());
        let err = store.update("replace-missing", JobUpdate::default()).await.unwrap_err();
        assert!(matches!(err, JobStoreError::NotFound));
    }

    #[tokio::test]
    async fn update_merges_without_clearing_other_fields() {
        let store = InMemoryJobStore::default();
        store.create(sample_job("replace-1", 600)).await.expect("create");

        store
            .update(
                "replace-1",
                JobUpdate {
                    status: Some(JobStatus::Processing),
                    progress: Some(40),
                    message: Some("generating".to_string()),
                    ..JobUpdate::default()
                },
            )
            .await
            .expect("first update");

        let job = store
            .update("replace-1", JobUpdate { progress: Some(80), ..JobUpdate::default() })
            .await
            .expect("second update");

        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, 80);
        assert_eq!(job.message.as_deref(), Some("generating"));
        assert_eq!(job.revision, 2);
    }

    #[tokio::test]
    async fn progress_is_capped_at_one_hundred() {
        let store = InMemoryJobStore::default();
        store.create(sample_job("replace-1", 600)).await.expect("create");

        let job = store
            .update("replace-1", JobUpdate { progress: Some(250), ..JobUpdate::default() })
            .await
            .expect("update");
        assert_eq!(job.progress, 100);
    }

    #[tokio::test]
    async fn terminal_jobs_reject_further_updates() {
        let store = InMemoryJobStore::default();
        store.create(sample_job("replace-1", 600)).await.expect("create");

        store
            .update(
                "replace-1",
                JobUpdate {
                    status: Some(JobStatus::Completed),
                    progress: Some(100),
                    questions_data: Some(json!([{"id": "q-1"}])),
                    ..JobUpdate::default()
                },
            )
            .await
            .expect("complete");

        let err = store
            .update(
                "replace-1",
                JobUpdate { status: Some(JobStatus::Failed), ..JobUpdate::default() },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JobStoreError::Terminal(JobStatus::Completed)));

        let job = store.get("replace-1").await.expect("get").expect("present");
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn sweep_fails_expired_jobs_and_keeps_live_ones() {
        let store = InMemoryJobStore::default();
        store.create(sample_job("replace-stale", 0)).await.expect("create");
        store.create(sample_job("replace-live", 600)).await.expect("create");

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let failed = store.sweep_expired(now + 1).await.expect("sweep");
        assert_eq!(failed, 1);

        let stale = store.get("replace-stale").await.expect("get").expect("present");
        assert_eq!(stale.status, JobStatus::Failed);
        assert_eq!(stale.error.as_deref(), Some("generation timed out"));

        let live = store.get("replace-live").await.expect("get").expect("present");
        assert_eq!(live.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn sweep_evicts_entries_past_retention() {
        let store = InMemoryJobStore::default();
        store.create(sample_job("replace-old", 0)).await.expect("create");

        let now = OffsetDateTime::now_utc().unix_timestamp();
        store.sweep_expired(now + TERMINAL_RETENTION_SECONDS + 1).await.expect("sweep");

        assert!(store.get("replace-old").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn remove_deletes_the_entry() {
        let store = InMemoryJobStore::default();
        store.create(sample_job("replace-1", 600)).await.expect("create");
        store.remove("replace-1").await.expect("remove");

        assert!(store.get("replace-1").await.expect("get").is_none());
    }
}
