use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::db::models::QuestionOption;
use crate::db::types::{BloomsLevel, QuestionDifficulty};
use crate::services::job_store::ReplacementContext;

const MAX_QUESTION_TEXT_CHARS: usize = 2000;
const MAX_EXPLANATION_CHARS: usize = 2000;
const MAX_OPTION_TEXT_CHARS: usize = 500;
const MAX_TOPIC_CHARS: usize = 255;
const MAX_REFERENCE_CHARS: usize = 100;

/// A generated question after sanitization, ready to persist over the
/// question row it replaces.
#[derive(Debug, Clone)]
pub(crate) struct NormalizedQuestion {
    pub(crate) question_text: String,
    pub(crate) options: Vec<QuestionOption>,
    pub(crate) correct_answer: String,
    pub(crate) explanation: Option<String>,
    pub(crate) difficulty: QuestionDifficulty,
    pub(crate) blooms_level: BloomsLevel,
    pub(crate) topic: Option<String>,
    pub(crate) book: Option<String>,
    pub(crate) chapter: Option<String>,
}

/// Maps one raw generator payload entry into the internal schema. The
/// generator is an external service, so every field is treated as hostile:
/// control characters are stripped, lengths capped to the column sizes, and
/// enumerations fall back to the values the educator originally requested.
pub(crate) fn normalize_question(
    raw: &Value,
    request: &ReplacementContext,
) -> Result<NormalizedQuestion> {
    let question_text = str_field(raw, &["question_text", "question", "questionText"])
        .map(|text| sanitize_text(text, MAX_QUESTION_TEXT_CHARS))
        .unwrap_or_default();
    if question_text.is_empty() {
        return Err(anyhow!("question text is empty after sanitization"));
    }

    let options = normalize_options(raw.get("options"));
    if options.is_empty() {
        return Err(anyhow!("options are empty after sanitization"));
    }

    let correct_raw = str_field(raw, &["correct_answer", "correctAnswer", "answer"])
        .map(|text| sanitize_text(text, MAX_OPTION_TEXT_CHARS))
        .unwrap_or_default();
    if correct_raw.is_empty() {
        return Err(anyhow!("correct answer is empty after sanitization"));
    }
    let correct_answer = resolve_correct_answer(&correct_raw, &options)
        .ok_or_else(|| anyhow!("correct answer does not match any option"))?;

    let explanation = str_field(raw, &["explanation"])
        .map(|text| sanitize_text(text, MAX_EXPLANATION_CHARS))
        .filter(|text| !text.is_empty());

    let difficulty =
        normalize_difficulty(str_field(raw, &["difficulty"]), &request.difficulty);
    let blooms_level = normalize_blooms(
        str_field(raw, &["blooms_level", "bloomsLevel"]),
        str_field(raw, &["question_type", "questionType"]),
        &request.blooms_level,
    );

    let topic = str_field(raw, &["topic"])
        .map(|text| sanitize_text(text, MAX_TOPIC_CHARS))
        .filter(|text| !text.is_empty())
        .or_else(|| request.topic.clone());

    let (ref_book, ref_chapter) = str_field(raw, &["biblical_reference", "biblicalReference"])
        .map(parse_biblical_reference)
        .unwrap_or((None, None));
    let book = ref_book
        .or_else(|| {
            str_field(raw, &["book"])
                .map(|text| sanitize_text(text, MAX_REFERENCE_CHARS))
                .filter(|text| !text.is_empty())
        })
        .or_else(|| request.books.first().cloned());
    let chapter = ref_chapter
        .or_else(|| {
            str_field(raw, &["chapter"])
                .map(|text| sanitize_text(text, MAX_REFERENCE_CHARS))
                .filter(|text| !text.is_empty())
        })
        .or_else(|| request.chapters.first().cloned());

    Ok(NormalizedQuestion {
        question_text,
        options,
        correct_answer,
        explanation,
        difficulty,
        blooms_level,
        topic,
        book,
        chapter,
    })
}

/// Strips control characters, trims, and caps length in characters.
pub(crate) fn sanitize_text(raw: &str, max_chars: usize) -> String {
    let cleaned: String = raw.chars().filter(|ch| !ch.is_control()).collect();
    cleaned.trim().chars().take(max_chars).collect()
}

/// Options arrive either as an ordered list of {id, text} objects or as a
/// map of letter -> text. Both forms normalize to the stored list shape.
fn normalize_options(value: Option<&Value>) -> Vec<QuestionOption> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match item {
                Value::Object(_) => {
                    let text = str_field(item, &["text"])
                        .map(|text| sanitize_text(text, MAX_OPTION_TEXT_CHARS))?;
                    if text.is_empty() {
                        return None;
                    }
                    let id = str_field(item, &["id"])
                        .map(|id| sanitize_text(id, MAX_REFERENCE_CHARS))
                        .filter(|id| !id.is_empty())
                        .unwrap_or_else(|| position_id(index));
                    Some(QuestionOption { id, text })
                }
                Value::String(text) => {
                    let text = sanitize_text(text, MAX_OPTION_TEXT_CHARS);
                    if text.is_empty() {
                        return None;
                    }
                    Some(QuestionOption { id: position_id(index), text })
                }
                _ => None,
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(key, value)| {
                let text = value.as_str().map(|text| sanitize_text(text, MAX_OPTION_TEXT_CHARS))?;
                if text.is_empty() {
                    return None;
                }
                Some(QuestionOption { id: key.trim().to_lowercase(), text })
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// The stored correct answer is an option id. Generators sometimes return the
/// option text instead, so both are accepted.
fn resolve_correct_answer(raw: &str, options: &[QuestionOption]) -> Option<String> {
    if let Some(by_id) = options.iter().find(|option| option.id.eq_ignore_ascii_case(raw)) {
        return Some(by_id.id.clone());
    }

    options.iter().find(|option| option.text == raw).map(|option| option.id.clone())
}

/// Splits a combined reference like "1 Corinthians 13 (NIV)" into book and
/// chapter. A leading ordinal merges with the next token; a trailing
/// parenthetical is dropped from the chapter.
fn parse_biblical_reference(raw: &str) -> (Option<String>, Option<String>) {
    let cleaned = sanitize_text(raw, MAX_REFERENCE_CHARS * 2);
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();
    if tokens.is_empty() {
        return (None, None);
    }

    let (book_tokens, rest) = if tokens.len() >= 2 && tokens[0].chars().all(|ch| ch.is_ascii_digit())
    {
        (&tokens[..2], &tokens[2..])
    } else {
        (&tokens[..1], &tokens[1..])
    };

    let book: String = book_tokens.join(" ").chars().take(MAX_REFERENCE_CHARS).collect();

    let mut chapter = rest.join(" ");
    if let Some(paren) = chapter.find('(') {
        chapter.truncate(paren);
    }
    let chapter: String = chapter.trim().chars().take(MAX_REFERENCE_CHARS).collect();

    (
        if book.is_empty() { None } else { Some(book) },
        if chapter.is_empty() { None } else { Some(chapter) },
    )
}

fn normalize_difficulty(value: Option<&str>, requested: &str) -> QuestionDifficulty {
    value
        .and_then(QuestionDifficulty::parse)
        .or_else(|| QuestionDifficulty::parse(requested))
        .unwrap_or(QuestionDifficulty::Intermediate)
}

/// Resolution order: explicit level, synonym table over question_type,
/// substring scan, the level the educator requested, then knowledge.
fn normalize_blooms(
    level: Option<&str>,
    question_type: Option<&str>,
    requested: &str,
) -> BloomsLevel {
    if let Some(parsed) = level.and_then(BloomsLevel::parse) {
        return parsed;
    }

    if let Some(kind) = question_type {
        let kind = kind.trim().to_ascii_lowercase();
        if let Some(mapped) = blooms_synonym(&kind).or_else(|| blooms_substring(&kind)) {
            return mapped;
        }
    }

    BloomsLevel::parse(requested).unwrap_or(BloomsLevel::Knowledge)
}

fn blooms_synonym(kind: &str) -> Option<BloomsLevel> {
    match kind {
        "recall" | "remember" | "remembering" | "knowledge" | "factual" => {
            Some(BloomsLevel::Knowledge)
        }
        "understand" | "understanding" | "comprehension" | "interpret" => {
            Some(BloomsLevel::Comprehension)
        }
        "apply" | "applying" | "application" => Some(BloomsLevel::Application),
        "analyze" | "analyzing" | "analysis" | "compare" => Some(BloomsLevel::Analysis),
        "create" | "creating" | "synthesize" | "synthesis" | "design" => {
            Some(BloomsLevel::Synthesis)
        }
        "evaluate" | "evaluating" | "evaluation" | "judge" => Some(BloomsLevel::Evaluation),
        _ => None,
    }
}

fn blooms_substring(kind: &str) -> Option<BloomsLevel> {
    if kind.contains("recall") || kind.contains("remember") || kind.contains("knowledge") {
        Some(BloomsLevel::Knowledge)
    } else if kind.contains("understand") || kind.contains("comprehen") {
        Some(BloomsLevel::Comprehension)
    } else if kind.contains("appl") {
        Some(BloomsLevel::Application)
    } else if kind.contains("analy") {
        Some(BloomsLevel::Analysis)
    } else if kind.contains("synthe") || kind.contains("creat") {
        Some(BloomsLevel::Synthesis)
    } else if kind.contains("evaluat") || kind.contains("judg") {
        Some(BloomsLevel::Evaluation)
    } else {
        None
    }
}

fn position_id(index: usize) -> String {
    if index < 26 {
        ((b'a' + index as u8) as char).to_string()
    } else {
        (index + 1).to_string()
    }
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| value.get(*key).and_then(Value::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> ReplacementContext {
        ReplacementContext {
            question_id_to_replace: "q-1".to_string(),
            quiz_id: "quiz-1".to_string(),
            books: vec!["Genesis".to_string()],
            chapters: vec!["3".to_string()],
            difficulty: "hard".to_string(),
            blooms_level: "analysis".to_string(),
            topic: Some("creation".to_string()),
        }
    }

    #[test]
    fn sanitize_strips_control_characters_and_caps() {
        assert_eq!(sanitize_text("  a\u{0}b\tc  ", 100), "abc");
        assert_eq!(sanitize_text("abcdef", 3), "abc");
    }

    #[test]
    fn options_list_is_sanitized() {
        let options = normalize_options(Some(&json!([
            {"id": "a", "text": " First \u{1} option "},
            {"id": "b", "text": "Second"},
        ])));

        assert_eq!(options.len(), 2);
        assert_eq!(options[0], QuestionOption { id: "a".into(), text: "First  option".into() });
    }

    #[test]
    fn options_map_lowercases_keys() {
        let options = normalize_options(Some(&json!({"A": "First", "B": "Second"})));

        assert_eq!(options.len(), 2);
        assert!(options.iter().any(|o| o.id == "a" && o.text == "First"));
        assert!(options.iter().any(|o| o.id == "b" && o.text == "Second"));
    }

    #[test]
    fn biblical_reference_merges_leading_ordinal() {
        assert_eq!(
            parse_biblical_reference("1 Corinthians 13 (love chapter)"),
            (Some("1 Corinthians".to_string()), Some("13".to_string()))
        );
        assert_eq!(
            parse_biblical_reference("Genesis 1"),
            (Some("Genesis".to_string()), Some("1".to_string()))
        );
        assert_eq!(parse_biblical_reference("Psalms"), (Some("Psalms".to_string()), None));
    }

    #[test]
    fn blooms_synonym_table_maps_recall_to_knowledge() {
        assert_eq!(normalize_blooms(None, Some("recall"), "analysis"), BloomsLevel::Knowledge);
    }

    #[test]
    fn blooms_substring_scan_catches_verb_forms() {
        assert_eq!(
            normalize_blooms(None, Some("asks the student to EVALUATE sources"), "knowledge"),
            BloomsLevel::Evaluation
        );
    }

    #[test]
    fn blooms_falls_back_to_requested_then_knowledge() {
        assert_eq!(normalize_blooms(None, Some("freeform"), "analysis"), BloomsLevel::Analysis);
        assert_eq!(normalize_blooms(None, None, "not-a-level"), BloomsLevel::Knowledge);
    }

    #[test]
    fn difficulty_falls_back_to_requested_then_intermediate() {
        assert_eq!(normalize_difficulty(Some("hard"), "easy"), QuestionDifficulty::Hard);
        assert_eq!(normalize_difficulty(Some("extreme"), "easy"), QuestionDifficulty::Easy);
        assert_eq!(normalize_difficulty(None, "extreme"), QuestionDifficulty::Intermediate);
    }

    #[test]
    fn normalize_question_happy_path() {
        let raw = json!({
            "question_text": "Who built the ark?",
            "options": [
                {"id": "a", "text": "Noah"},
                {"id": "b", "text": "Moses"},
            ],
            "correct_answer": "a",
            "explanation": "Genesis 6 describes the command to Noah.",
            "difficulty": "easy",
            "blooms_level": "knowledge",
            "biblical_reference": "Genesis 6",
        });

        let normalized = normalize_question(&raw, &request()).expect("normalized");
        assert_eq!(normalized.question_text, "Who built the ark?");
        assert_eq!(normalized.correct_answer, "a");
        assert_eq!(normalized.difficulty, QuestionDifficulty::Easy);
        assert_eq!(normalized.blooms_level, BloomsLevel::Knowledge);
        assert_eq!(normalized.book.as_deref(), Some("Genesis"));
        assert_eq!(normalized.chapter.as_deref(), Some("6"));
    }

    #[test]
    fn normalize_question_resolves_correct_answer_by_text() {
        let raw = json!({
            "question_text": "Who built the ark?",
            "options": [
                {"id": "a", "text": "Noah"},
                {"id": "b", "text": "Moses"},
            ],
            "correct_answer": "Noah",
        });

        let normalized = normalize_question(&raw, &request()).expect("normalized");
        assert_eq!(normalized.correct_answer, "a");
    }

    #[test]
    fn normalize_question_falls_back_to_request_context() {
        let raw = json!({
            "question_text": "In the beginning...?",
            "options": {"a": "Light", "b": "Darkness"},
            "correct_answer": "a",
        });

        let normalized = normalize_question(&raw, &request()).expect("normalized");
        assert_eq!(normalized.difficulty, QuestionDifficulty::Hard);
        assert_eq!(normalized.blooms_level, BloomsLevel::Analysis);
        assert_eq!(normalized.topic.as_deref(), Some("creation"));
        assert_eq!(normalized.book.as_deref(), Some("Genesis"));
        assert_eq!(normalized.chapter.as_deref(), Some("3"));
    }

    #[test]
    fn normalize_question_rejects_empty_content() {
        let no_text = json!({
            "question_text": "  \u{0} ",
            "options": [{"id": "a", "text": "Noah"}],
            "correct_answer": "a",
        });
        assert!(normalize_question(&no_text, &request()).is_err());

        let no_options = json!({
            "question_text": "Who built the ark?",
            "options": [],
            "correct_answer": "a",
        });
        assert!(normalize_question(&no_options, &request()).is_err());

        let bad_answer = json!({
            "question_text": "Who built the ark?",
            "options": [{"id": "a", "text": "Noah"}],
            "correct_answer": "Jonah",
        });
        assert!(normalize_question(&bad_answer, &request()).is_err());
    }
}
