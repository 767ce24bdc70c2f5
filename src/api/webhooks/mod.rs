mod handlers;

use axum::{routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/question-replacement", post(handlers::question_replacement))
}

#[cfg(test)]
mod tests;
