use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Errors carry a stable machine-readable `error` code next to the human
/// `detail`, so clients branch on codes instead of parsing prose.
#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden { code: &'static str, message: String },
    BadRequest { code: &'static str, message: String },
    NotFound { code: &'static str, message: String },
    Conflict { code: &'static str, message: String },
    /// The quiz window has not opened. Carries scheduling facts so clients
    /// render their own countdown in the quiz's timezone.
    TooEarly { code: &'static str, message: String, context: Value },
    Gone { code: &'static str, message: String },
    /// A write that must land (replacing question content) did not.
    Persistence(String),
    Internal(String),
    /// Wraps another error to merge extra fields into its body. The webhook
    /// responses echo the job id this way so the generator can correlate a
    /// rejection with its own records.
    WithContext { context: Value, source: Box<ApiError> },
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    pub(crate) fn persistence(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Persistence(context.to_string())
    }

    pub(crate) fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest { code, message: message.into() }
    }

    pub(crate) fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::Forbidden { code, message: message.into() }
    }

    pub(crate) fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound { code, message: message.into() }
    }

    pub(crate) fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict { code, message: message.into() }
    }

    pub(crate) fn gone(code: &'static str, message: impl Into<String>) -> Self {
        Self::Gone { code, message: message.into() }
    }

    pub(crate) fn too_early(code: &'static str, message: impl Into<String>, context: Value) -> Self {
        Self::TooEarly { code, message: message.into(), context }
    }

    pub(crate) fn with_context(self, context: Value) -> Self {
        Self::WithContext { context, source: Box::new(self) }
    }

    fn parts(self) -> (StatusCode, &'static str, String, Option<Value>) {
        match self {
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", message.to_string(), None)
            }
            ApiError::Forbidden { code, message } => (StatusCode::FORBIDDEN, code, message, None),
            ApiError::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, code, message, None)
            }
            ApiError::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message, None),
            ApiError::Conflict { code, message } => (StatusCode::CONFLICT, code, message, None),
            ApiError::TooEarly { code, message, context } => {
                (StatusCode::TOO_EARLY, code, message, Some(context))
            }
            ApiError::Gone { code, message } => (StatusCode::GONE, code, message, None),
            ApiError::Persistence(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence_failed", message, None)
            }
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message, None)
            }
            ApiError::WithContext { context, source } => {
                let (status, code, message, base) = source.parts();
                (status, code, message, Some(merge_context(base, context)))
            }
        }
    }
}

/// Contexts are JSON objects; on key collision the outer wrapper wins.
fn merge_context(base: Option<Value>, extra: Value) -> Value {
    match (base, extra) {
        (Some(Value::Object(mut fields)), Value::Object(added)) => {
            fields.extend(added);
            Value::Object(fields)
        }
        (_, extra) => extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_wrapper_keeps_status_and_merges_fields() {
        let (status, code, detail, context) =
            ApiError::not_found("job_not_found", "Generation job not found")
                .with_context(json!({ "jobId": "replace-1" }))
                .parts();

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "job_not_found");
        assert_eq!(detail, "Generation job not found");
        assert_eq!(context, Some(json!({ "jobId": "replace-1" })));
    }

    #[test]
    fn outer_context_wins_on_collision() {
        let (_, _, _, context) = ApiError::too_early(
            "quiz_not_started",
            "Quiz has not started yet",
            json!({ "timezone": "UTC", "jobId": "old" }),
        )
        .with_context(json!({ "jobId": "new" }))
        .parts();

        assert_eq!(context, Some(json!({ "timezone": "UTC", "jobId": "new" })));
    }
}

fn body(status: StatusCode, code: &str, detail: &str, context: Option<&Value>) -> Json<Value> {
    let mut payload = json!({
        "status": status.as_u16(),
        "error": code,
        "detail": detail,
    });
    if let (Value::Object(map), Some(Value::Object(extra))) = (&mut payload, context) {
        for (key, value) in extra {
            map.insert(key.clone(), value.clone());
        }
    }
    Json(payload)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(message) = &self {
            tracing::error!(error = %message, "Internal server error");
        }
        let bearer_challenge = matches!(self, ApiError::Unauthorized(_));

        let (status, code, detail, context) = self.parts();
        let mut response = (status, body(status, code, &detail, context.as_ref())).into_response();
        if bearer_challenge {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
