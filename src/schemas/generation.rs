use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::core::time::format_unix_seconds;
use crate::services::job_store::{GenerationJob, JobStatus};

/// Optional overrides for a replacement request. Anything left out is taken
/// from the question being replaced.
#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct ReplaceQuestionRequest {
    #[serde(default)]
    pub(crate) books: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) chapters: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) difficulty: Option<String>,
    #[serde(default, alias = "bloomsLevel")]
    pub(crate) blooms_level: Option<String>,
    #[serde(default)]
    #[validate(length(max = 255, message = "topic must be at most 255 characters"))]
    pub(crate) topic: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReplaceQuestionAccepted {
    pub(crate) job_id: String,
    pub(crate) status: JobStatus,
    pub(crate) message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobStatusResponse {
    pub(crate) job_id: String,
    pub(crate) status: JobStatus,
    pub(crate) progress: u8,
    pub(crate) message: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) questions_data: Option<Value>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
    pub(crate) expires_at: String,
}

impl JobStatusResponse {
    pub(crate) fn from_job(job: &GenerationJob) -> Self {
        Self {
            job_id: job.job_id.clone(),
            status: job.status,
            progress: job.progress,
            message: job.message.clone(),
            error: job.error.clone(),
            questions_data: job.questions_data.clone(),
            created_at: format_unix_seconds(job.created_at),
            updated_at: format_unix_seconds(job.updated_at),
            expires_at: format_unix_seconds(job.expires_at),
        }
    }
}

/// Callback body posted by the question generator. `status` arrives as free
/// text and is interpreted by the webhook handler.
#[derive(Debug, Deserialize)]
pub(crate) struct WebhookCallback {
    #[serde(alias = "jobId")]
    pub(crate) job_id: String,
    pub(crate) status: String,
    #[serde(default, alias = "questionsData")]
    pub(crate) questions_data: Option<Value>,
    #[serde(default)]
    pub(crate) error: Option<String>,
    #[serde(default)]
    pub(crate) progress: Option<u8>,
    #[serde(default)]
    pub(crate) message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebhookAck {
    pub(crate) success: bool,
    pub(crate) job_id: String,
    pub(crate) question_id: Option<String>,
    pub(crate) message: String,
}
