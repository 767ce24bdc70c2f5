use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::core::config::Settings;
use crate::services::job_store::GenerationJob;

const CALLBACK_PATH: &str = "/webhooks/question-replacement";

/// Client for the external question generator. Dispatch is fire-and-forget:
/// the handler returns a job id immediately and the generator reports back
/// through the webhook at `callback_url`.
#[derive(Debug, Clone)]
pub(crate) struct GeneratorClient {
    client: Client,
    base_url: String,
    callback_url: String,
    callback_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DispatchRequest<'a> {
    job_id: &'a str,
    callback_url: &'a str,
    callback_token: &'a str,
    question_id_to_replace: &'a str,
    quiz_id: &'a str,
    books: &'a [String],
    chapters: &'a [String],
    difficulty: &'a str,
    blooms_level: &'a str,
    topic: Option<&'a str>,
    count: u8,
}

impl GeneratorClient {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(Duration::from_secs(settings.generation().dispatch_timeout_seconds))
            .build()
            .context("Failed to build generator HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.generation().generator_base_url.trim_end_matches('/').to_string(),
            callback_url: callback_url(
                &settings.generation().callback_base_url,
                &settings.api().api_v1_str,
            ),
            callback_token: settings.security().webhook_shared_token.clone(),
        })
    }

    /// An empty base URL means no generator is deployed; replacement requests
    /// are rejected up front instead of producing jobs that can never finish.
    pub(crate) fn is_enabled(&self) -> bool {
        !self.base_url.is_empty()
    }

    pub(crate) async fn dispatch_replacement(&self, job: &GenerationJob) -> Result<()> {
        if !self.is_enabled() {
            return Err(anyhow!("question generator is not configured"));
        }

        let endpoint = format!("{}/generate-questions", self.base_url);
        let payload = DispatchRequest {
            job_id: &job.job_id,
            callback_url: &self.callback_url,
            callback_token: &self.callback_token,
            question_id_to_replace: &job.request.question_id_to_replace,
            quiz_id: &job.request.quiz_id,
            books: &job.request.books,
            chapters: &job.request.chapters,
            difficulty: &job.request.difficulty,
            blooms_level: &job.request.blooms_level,
            topic: job.request.topic.as_deref(),
            count: 1,
        };

        let response = self
            .client
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .context("Failed to call question generator")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "generator dispatch failed (status {status}): {}",
                truncate_for_log(&body)
            ));
        }

        Ok(())
    }
}

fn callback_url(callback_base: &str, api_prefix: &str) -> String {
    format!("{}{}{}", callback_base.trim_end_matches('/'), api_prefix, CALLBACK_PATH)
}

fn truncate_for_log(body: &str) -> &str {
    let cut = body.char_indices().nth(300).map_or(body.len(), |(index, _)| index);
    &body[..cut]
}
