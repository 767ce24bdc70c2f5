use std::collections::HashMap;

use time::{Duration, PrimitiveDateTime};

use crate::db::models::{AttemptAnswer, Question};

/// Seconds left on an attempt's clock. Negative once the deadline has passed;
/// callers decide whether the grace window still applies.
pub(crate) fn remaining_seconds(
    now: PrimitiveDateTime,
    attempt_start: PrimitiveDateTime,
    duration_minutes: i32,
) -> i64 {
    let deadline = attempt_start + Duration::minutes(i64::from(duration_minutes));
    (deadline - now).whole_seconds()
}

/// Submissions are accepted slightly past the deadline to absorb clock skew
/// and upload latency. Past the grace window the attempt is force-completed
/// with whatever answers were already stored.
pub(crate) fn within_grace(remaining: i64, grace_seconds: u64) -> bool {
    remaining + grace_seconds as i64 >= 0
}

/// Collapses duplicate answers to the last submitted value per question,
/// keeping first-seen question order so the stored list stays stable.
pub(crate) fn dedupe_last_wins(answers: Vec<AttemptAnswer>) -> Vec<AttemptAnswer> {
    let mut order: Vec<String> = Vec::new();
    let mut latest: HashMap<String, String> = HashMap::new();
    for answer in answers {
        if !latest.contains_key(&answer.question_id) {
            order.push(answer.question_id.clone());
        }
        latest.insert(answer.question_id, answer.selected_option);
    }
    order
        .into_iter()
        .map(|question_id| {
            let selected_option = latest.remove(&question_id).unwrap_or_default();
            AttemptAnswer { question_id, selected_option }
        })
        .collect()
}

/// One point per question whose selected option id matches the stored
/// correct answer. Answers for unknown question ids score nothing.
pub(crate) fn grade(answers: &[AttemptAnswer], questions: &[Question]) -> i32 {
    let selected: HashMap<&str, &str> = answers
        .iter()
        .map(|answer| (answer.question_id.as_str(), answer.selected_option.as_str()))
        .collect();
    questions
        .iter()
        .filter(|question| selected.get(question.id.as_str()).copied() == Some(question.correct_answer.as_str()))
        .count() as i32
}
