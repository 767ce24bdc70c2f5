use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use crate::services::job_store::{GenerationJob, JobStatus, JobUpdate, ReplacementContext};
use crate::test_support::{self, TestContext};

const CALLBACK_URI: &str = "/api/v1/webhooks/question-replacement";

fn callback_request(token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(CALLBACK_URI)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header("x-webhook-token", token);
    }
    builder.body(Body::from(serde_json::to_vec(&body).expect("body"))).expect("request")
}

fn replacement_context(question_id: &str) -> ReplacementContext {
    ReplacementContext {
        question_id_to_replace: question_id.to_string(),
        quiz_id: "quiz-1".to_string(),
        books: vec!["Exodus".to_string()],
        chapters: vec!["20".to_string()],
        difficulty: "intermediate".to_string(),
        blooms_level: "knowledge".to_string(),
        topic: None,
    }
}

async fn seed_job(ctx: &TestContext, job_id: &str, question_id: &str) {
    ctx.state
        .jobs()
        .create(GenerationJob::new(job_id.to_string(), replacement_context(question_id), 600))
        .await
        .expect("seed job");
}

fn generated_question() -> serde_json::Value {
    json!([{
        "question_text": "Which mountain received the commandments?",
        "options": [
            {"id": "a", "text": "Sinai"},
            {"id": "b", "text": "Ararat"},
            {"id": "c", "text": "Nebo"},
            {"id": "d", "text": "Carmel"},
        ],
        "correct_answer": "a",
        "difficulty": "easy",
        "blooms_level": "knowledge",
    }])
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let _guard = test_support::env_lock().await;
    test_support::set_test_env();
    let ctx = test_support::offline_context();

    let response = ctx
        .app
        .oneshot(callback_request(None, json!({"job_id": "replace-1", "status": "completed"})))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_token_is_rejected() {
    let _guard = test_support::env_lock().await;
    test_support::set_test_env();
    let ctx = test_support::offline_context();

    let response = ctx
        .app
        .oneshot(callback_request(
            Some("not-the-token"),
            json!({"job_id": "replace-1", "status": "completed"}),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unconfigured_token_rejects_all_callers() {
    let _guard = test_support::env_lock().await;
    test_support::set_test_env();
    std::env::set_var("WEBHOOK_SHARED_TOKEN", "");
    let ctx = test_support::offline_context();

    // Even an empty presented token must not match an empty configuration.
    let response = ctx
        .app
        .oneshot(callback_request(Some(""), json!({"job_id": "replace-1", "status": "completed"})))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_job_on_success_is_not_found() {
    let _guard = test_support::env_lock().await;
    test_support::set_test_env();
    let ctx = test_support::offline_context();

    let response = ctx
        .app
        .oneshot(callback_request(
            Some("test-hook-token"),
            json!({"job_id": "replace-ghost", "status": "completed", "questions_data": generated_question()}),
        ))
        .await
        .expect("response");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "response: {body}");
    assert_eq!(body["error"], "job_not_found");
    assert_eq!(body["jobId"], "replace-ghost");
}

#[tokio::test]
async fn unknown_job_failure_report_is_acknowledged() {
    let _guard = test_support::env_lock().await;
    test_support::set_test_env();
    let ctx = test_support::offline_context();

    let response = ctx
        .app
        .oneshot(callback_request(
            Some("test-hook-token"),
            json!({"job_id": "replace-ghost", "status": "failed", "error": "model overloaded"}),
        ))
        .await
        .expect("response");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["success"], false);
    assert_eq!(body["jobId"], "replace-ghost");
}

#[tokio::test]
async fn progress_callback_merges_and_caps_below_completion() {
    let _guard = test_support::env_lock().await;
    test_support::set_test_env();
    let ctx = test_support::offline_context();
    seed_job(&ctx, "replace-1", "q-1").await;

    let response = ctx
        .app
        .oneshot(callback_request(
            Some("test-hook-token"),
            json!({"job_id": "replace-1", "status": "processing", "progress": 150, "message": "halfway"}),
        ))
        .await
        .expect("response");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["success"], true);

    let job = ctx.state.jobs().get("replace-1").await.expect("get").expect("present");
    assert_eq!(job.status, JobStatus::Processing);
    assert_eq!(job.progress, 99);
    assert_eq!(job.message.as_deref(), Some("halfway"));
}

#[tokio::test]
async fn failure_callback_fails_the_job() {
    let _guard = test_support::env_lock().await;
    test_support::set_test_env();
    let ctx = test_support::offline_context();
    seed_job(&ctx, "replace-1", "q-1").await;

    let response = ctx
        .app
        .oneshot(callback_request(
            Some("test-hook-token"),
            json!({"job_id": "replace-1", "status": "error", "error": "generation crashed"}),
        ))
        .await
        .expect("response");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["success"], false);

    let job = ctx.state.jobs().get("replace-1").await.expect("get").expect("present");
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("generation crashed"));
}

#[tokio::test]
async fn error_field_alone_marks_failure() {
    let _guard = test_support::env_lock().await;
    test_support::set_test_env();
    let ctx = test_support::offline_context();
    seed_job(&ctx, "replace-1", "q-1").await;

    // Some generator versions keep status at "processing" while reporting
    // the error in its own field.
    let response = ctx
        .app
        .oneshot(callback_request(
            Some("test-hook-token"),
            json!({"job_id": "replace-1", "status": "processing", "error": "model crashed"}),
        ))
        .await
        .expect("response");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["success"], false);

    let job = ctx.state.jobs().get("replace-1").await.expect("get").expect("present");
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_deref(), Some("model crashed"));
}

#[tokio::test]
async fn duplicate_callback_for_finalized_job_is_idempotent() {
    let _guard = test_support::env_lock().await;
    test_support::set_test_env();
    let ctx = test_support::offline_context();
    seed_job(&ctx, "replace-1", "q-1").await;
    ctx.state
        .jobs()
        .update(
            "replace-1",
            JobUpdate { status: Some(JobStatus::Failed), ..JobUpdate::default() },
        )
        .await
        .expect("finalize");

    let response = ctx
        .app
        .oneshot(callback_request(
            Some("test-hook-token"),
            json!({"job_id": "replace-1", "status": "completed", "questions_data": generated_question()}),
        ))
        .await
        .expect("response");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Job already finalized");

    let job = ctx.state.jobs().get("replace-1").await.expect("get").expect("present");
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn completed_callback_for_non_replacement_job_is_rejected() {
    let _guard = test_support::env_lock().await;
    test_support::set_test_env();
    let ctx = test_support::offline_context();
    seed_job(&ctx, "bulk-1", "q-1").await;

    let response = ctx
        .app
        .oneshot(callback_request(
            Some("test-hook-token"),
            json!({"job_id": "bulk-1", "status": "completed", "questions_data": generated_question()}),
        ))
        .await
        .expect("response");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["error"], "validation_failed");
    assert_eq!(body["jobId"], "bulk-1");

    // The job itself was well-formed enough to keep polling alive.
    let job = ctx.state.jobs().get("bulk-1").await.expect("get").expect("present");
    assert_eq!(job.status, JobStatus::Pending);
}

#[tokio::test]
async fn completed_callback_without_question_data_fails_the_job() {
    let _guard = test_support::env_lock().await;
    test_support::set_test_env();
    let ctx = test_support::offline_context();
    seed_job(&ctx, "replace-1", "q-1").await;

    let response = ctx
        .app
        .oneshot(callback_request(
            Some("test-hook-token"),
            json!({"job_id": "replace-1", "status": "completed", "questions_data": []}),
        ))
        .await
        .expect("response");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["error"], "validation_failed");

    let job = ctx.state.jobs().get("replace-1").await.expect("get").expect("present");
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn completed_callback_with_invalid_question_fails_the_job() {
    let _guard = test_support::env_lock().await;
    test_support::set_test_env();
    let ctx = test_support::offline_context();
    seed_job(&ctx, "replace-1", "q-1").await;

    let response = ctx
        .app
        .oneshot(callback_request(
            Some("test-hook-token"),
            json!({
                "job_id": "replace-1",
                "status": "completed",
                "questions_data": [{"question_text": "No options here", "correct_answer": "a"}],
            }),
        ))
        .await
        .expect("response");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert_eq!(body["error"], "validation_failed");

    let job = ctx.state.jobs().get("replace-1").await.expect("get").expect("present");
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.is_some());
}

#[tokio::test]
async fn completed_callback_fails_job_when_question_cannot_be_persisted() {
    let _guard = test_support::env_lock().await;
    test_support::set_test_env();
    let ctx = test_support::offline_context();
    // A question id nothing in any database matches.
    let question_id = Uuid::new_v4().to_string();
    seed_job(&ctx, "replace-1", &question_id).await;

    let response = ctx
        .app
        .oneshot(callback_request(
            Some("test-hook-token"),
            json!({"job_id": "replace-1", "status": "completed", "questions_data": generated_question()}),
        ))
        .await
        .expect("response");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "response: {body}");
    assert_eq!(body["error"], "persistence_failed");

    let job = ctx.state.jobs().get("replace-1").await.expect("get").expect("present");
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn completed_callback_replaces_the_question_row() {
    let Some(ctx) = test_support::try_test_context().await else { return };

    let educator =
        test_support::insert_user(ctx.state.db(), crate::db::types::UserRole::Educator, "Deborah")
            .await;
    let quiz = test_support::insert_quiz(
        ctx.state.db(),
        &educator.id,
        crate::db::types::QuizStatus::Published,
        None,
        30,
        false,
    )
    .await;
    let question = test_support::insert_question(ctx.state.db(), &quiz.id, 0, "b").await;

    let job = GenerationJob::new(
        "replace-1".to_string(),
        ReplacementContext {
            question_id_to_replace: question.id.clone(),
            quiz_id: quiz.id.clone(),
            books: vec!["Exodus".to_string()],
            chapters: vec!["20".to_string()],
            difficulty: "intermediate".to_string(),
            blooms_level: "knowledge".to_string(),
            topic: None,
        },
        600,
    );
    ctx.state.jobs().create(job).await.expect("seed job");

    let response = ctx
        .app
        .clone()
        .oneshot(callback_request(
            Some("test-hook-token"),
            json!({"job_id": "replace-1", "status": "completed", "questions_data": generated_question()}),
        ))
        .await
        .expect("response");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["questionId"], question.id.as_str());

    let updated =
        crate::repositories::questions::find_by_id_for_quiz(ctx.state.db(), &question.id, &quiz.id)
            .await
            .expect("fetch")
            .expect("present");
    assert_eq!(updated.question_text, "Which mountain received the commandments?");
    assert_eq!(updated.correct_answer, "a");
    assert_eq!(updated.order_index, question.order_index);

    let job = ctx.state.jobs().get("replace-1").await.expect("get").expect("present");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    let stored = job.questions_data.expect("questions data");
    assert_eq!(stored[0]["id"], question.id.as_str());
}
