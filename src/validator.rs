//! Schema validation and bounded repair of model output.
//!
//! Input is the raw completion text, which may wrap the JSON object in code
//! fences or prose. We parse it directly, fall back to extracting the first
//! balanced `{...}` substring, then run the structural checks in a fixed
//! order. The first failing check aborts with the violated invariant in the
//! message. Repairs are applied only where they are deterministic:
//!   - quiz truncated to 3 questions, or padded from subject-keyed fillers
//!   - `correct_answer` (incl. letters A-D) normalized to `correctAnswer`
//!   - out-of-range answers coerced to 0
//!   - malformed option lists replaced with generic placeholders (last resort)
//! Every repair emits a warning so operators can see how noisy a model is.

use serde_json::Value;
use tracing::warn;

use crate::domain::{GeneratedArtifact, QuizQuestion, VocabularyItem};
use crate::error::ApiError;

/// Quiz questions per artifact; more is truncated, fewer is padded.
pub const QUIZ_TARGET: usize = 3;

const REQUIRED_FIELDS: [&str; 5] =
  ["content", "learning_objectives", "vocabulary", "quiz", "summary"];

/// A fully-valid artifact plus the repairs it took to get there.
#[derive(Clone, Debug)]
pub struct ValidatedArtifact {
  pub artifact: GeneratedArtifact,
  pub warnings: Vec<String>,
}

fn mal(msg: impl Into<String>) -> ApiError {
  ApiError::MalformedArtifact(msg.into())
}

/// Turn a raw model completion into a guaranteed-valid artifact, or reject.
pub fn validate_artifact(raw: &str, subject: &str) -> Result<ValidatedArtifact, ApiError> {
  let root = parse_candidate(raw)?;
  let obj = root
    .as_object()
    .ok_or_else(|| mal("model output is not a JSON object"))?;

  for field in REQUIRED_FIELDS {
    if !obj.contains_key(field) {
      return Err(mal(format!("missing field `{field}`")));
    }
  }

  let content_raw = nonempty_str(&obj["content"])
    .ok_or_else(|| mal("field `content` must be a non-empty string"))?;

  let objectives_arr = obj["learning_objectives"]
    .as_array()
    .ok_or_else(|| mal("field `learning_objectives` must be an array"))?;
  let vocabulary_arr = obj["vocabulary"]
    .as_array()
    .ok_or_else(|| mal("field `vocabulary` must be an array"))?;
  let quiz_arr = obj["quiz"]
    .as_array()
    .ok_or_else(|| mal("field `quiz` must be an array"))?;

  let mut warnings = Vec::new();

  let mut quiz = Vec::with_capacity(QUIZ_TARGET);
  for (i, item) in quiz_arr.iter().enumerate() {
    quiz.push(check_quiz_item(item, i, &mut warnings)?);
  }
  if quiz.len() > QUIZ_TARGET {
    warnings.push(format!(
      "quiz had {} questions; truncated to {QUIZ_TARGET}",
      quiz.len()
    ));
    quiz.truncate(QUIZ_TARGET);
  }
  while quiz.len() < QUIZ_TARGET {
    warnings.push(format!(
      "quiz had too few questions; appended filler question {}",
      quiz.len() + 1
    ));
    quiz.push(filler_question(subject, quiz.len()));
  }

  let mut vocabulary = Vec::with_capacity(vocabulary_arr.len());
  for (i, item) in vocabulary_arr.iter().enumerate() {
    vocabulary.push(check_vocabulary_item(item, i)?);
  }
  if vocabulary.is_empty() {
    return Err(mal("field `vocabulary` is empty"));
  }

  let mut learning_objectives = Vec::with_capacity(objectives_arr.len());
  for (i, item) in objectives_arr.iter().enumerate() {
    let s = nonempty_str(item).ok_or_else(|| {
      mal(format!("learning_objectives[{i}] must be a non-empty string"))
    })?;
    learning_objectives.push(s.to_string());
  }
  if learning_objectives.is_empty() {
    return Err(mal("field `learning_objectives` is empty"));
  }

  let summary = nonempty_str(&obj["summary"])
    .ok_or_else(|| mal("field `summary` must be a non-empty string"))?
    .to_string();

  let content = clean_content(content_raw);

  for w in &warnings {
    warn!(target: "generate", warning = %w, "artifact repair applied");
  }

  Ok(ValidatedArtifact {
    artifact: GeneratedArtifact { content, learning_objectives, vocabulary, quiz, summary },
    warnings,
  })
}

/// Direct JSON parse, then first-balanced-object extraction.
fn parse_candidate(raw: &str) -> Result<Value, ApiError> {
  if let Ok(v) = serde_json::from_str::<Value>(raw) {
    return Ok(v);
  }
  match extract_json_object(raw) {
    Some(s) => serde_json::from_str(s)
      .map_err(|e| mal(format!("extracted JSON object does not parse: {e}"))),
    None => Err(mal("no JSON object found in model output")),
  }
}

/// First balanced `{...}` substring, skipping braces inside string literals.
pub fn extract_json_object(text: &str) -> Option<&str> {
  let start = text.find('{')?;
  let mut depth = 0usize;
  let mut in_str = false;
  let mut escaped = false;
  for (i, b) in text.bytes().enumerate().skip(start) {
    if escaped {
      escaped = false;
      continue;
    }
    match b {
      b'\\' if in_str => escaped = true,
      b'"' => in_str = !in_str,
      b'{' if !in_str => depth += 1,
      b'}' if !in_str => {
        depth -= 1;
        if depth == 0 {
          return Some(&text[start..=i]);
        }
      }
      _ => {}
    }
  }
  None
}

fn nonempty_str(v: &Value) -> Option<&str> {
  v.as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn check_quiz_item(
  item: &Value,
  idx: usize,
  warnings: &mut Vec<String>,
) -> Result<QuizQuestion, ApiError> {
  let obj = item
    .as_object()
    .ok_or_else(|| mal(format!("quiz[{idx}] is not an object")))?;

  let question = obj
    .get("question")
    .and_then(nonempty_str)
    .ok_or_else(|| mal(format!("quiz[{idx}] field `question` must be a non-empty string")))?
    .to_string();

  // Options: exactly 4 non-empty strings, or a last-resort placeholder set.
  let raw_options: Vec<String> = obj
    .get("options")
    .and_then(Value::as_array)
    .map(|a| {
      a.iter()
        .filter_map(nonempty_str)
        .map(str::to_string)
        .collect()
    })
    .unwrap_or_default();
  let options = if raw_options.len() == 4 {
    raw_options
  } else {
    warnings.push(format!(
      "quiz[{idx}] had {} usable options; replaced with placeholders",
      raw_options.len()
    ));
    (1..=4).map(|n| format!("Option {n}")).collect()
  };

  // Both field names are accepted on input; output is always `correctAnswer`.
  let answer_value = obj
    .get("correctAnswer")
    .or_else(|| obj.get("correct_answer"))
    .ok_or_else(|| mal(format!("quiz[{idx}] is missing `correctAnswer`")))?;
  let correct_answer = normalize_correct_answer(answer_value, idx, warnings)?;

  Ok(QuizQuestion { question, options, correct_answer })
}

/// Accepts an integer in 0..=3, a letter A..D (either case), or a numeric
/// string. Anything else scalar coerces to 0 with a warning; non-scalars are
/// unrecoverable.
fn normalize_correct_answer(
  v: &Value,
  idx: usize,
  warnings: &mut Vec<String>,
) -> Result<u8, ApiError> {
  let coerced: Option<i64> = match v {
    Value::Number(n) => n.as_i64(),
    Value::String(s) => {
      let s = s.trim();
      match s {
        "A" | "a" => Some(0),
        "B" | "b" => Some(1),
        "C" | "c" => Some(2),
        "D" | "d" => Some(3),
        _ => s.parse::<i64>().ok(),
      }
    }
    _ => {
      return Err(mal(format!("quiz[{idx}] `correctAnswer` must be an integer or letter")));
    }
  };

  match coerced {
    Some(n) if (0..=3).contains(&n) => Ok(n as u8),
    other => {
      warnings.push(format!(
        "quiz[{idx}] `correctAnswer` {:?} out of range; coerced to 0",
        other.map_or_else(|| v.to_string(), |n| n.to_string())
      ));
      Ok(0)
    }
  }
}

fn check_vocabulary_item(item: &Value, idx: usize) -> Result<VocabularyItem, ApiError> {
  let obj = item
    .as_object()
    .ok_or_else(|| mal(format!("vocabulary[{idx}] is not an object")))?;
  let field = |name: &str| -> Result<String, ApiError> {
    obj
      .get(name)
      .and_then(nonempty_str)
      .map(str::to_string)
      .ok_or_else(|| {
        mal(format!("vocabulary[{idx}] field `{name}` must be a non-empty string"))
      })
  };
  Ok(VocabularyItem {
    word: field("word")?,
    definition: field("definition")?,
    example: field("example")?,
    part_of_speech: field("part_of_speech")?,
  })
}

/// Fixed filler templates used to pad an under-sized quiz. The first option
/// is always the subject, so the questions stay answerable.
fn filler_question(subject: &str, n: usize) -> QuizQuestion {
  let (question, distractors) = match n % 3 {
    0 => (
      "What was the main topic of this story?",
      ["A cooking recipe", "A sports match", "A travel diary"],
    ),
    1 => (
      "The story was written to help you learn about which of these?",
      ["Repairing bicycles", "Planning a picnic", "Painting a fence"],
    ),
    _ => (
      "Which subject do the events of the story teach?",
      ["Weather forecasting", "Board game rules", "Car maintenance"],
    ),
  };
  let mut options = vec![subject.to_string()];
  options.extend(distractors.iter().map(|s| s.to_string()));
  QuizQuestion { question: question.to_string(), options, correct_answer: 0 }
}

/// Drop chatter lines the model sometimes emits before the title, so the
/// content starts at the title line. Mirrors the shape a title takes: short,
/// no terminal punctuation, not a "Here is..." / "once upon a time" opener.
pub fn clean_content(text: &str) -> String {
  let lines: Vec<&str> = text
    .split('\n')
    .map(str::trim)
    .filter(|l| !l.is_empty())
    .collect();

  for (i, line) in lines.iter().enumerate() {
    let last = line.chars().last();
    let looks_like_title = line.len() < 100
      && !matches!(last, Some('.') | Some('!') | Some('?') | Some(',') | Some(':') | Some(';'))
      && !line.starts_with("Here")
      && !line.to_lowercase().starts_with("once");
    if looks_like_title {
      return lines[i..].join("\n\n");
    }
  }

  lines.join("\n\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn valid_payload() -> serde_json::Value {
    serde_json::json!({
      "content": "The Busy Bee\n\nMaya watched the hive all summer.",
      "learning_objectives": ["Describe how bees pollinate"],
      "vocabulary": [{
        "word": "pollen",
        "definition": "a powder flowers make",
        "example": "Bees carry pollen.",
        "part_of_speech": "noun"
      }],
      "quiz": [
        {"question": "Who watched the hive?", "options": ["Maya", "Tom", "Ana", "Leo"], "correctAnswer": 0},
        {"question": "What do bees carry?", "options": ["pollen", "rocks", "paper", "rain"], "correctAnswer": 0},
        {"question": "Where do bees live?", "options": ["a hive", "a cave", "a nest", "a pond"], "correctAnswer": 0}
      ],
      "summary": "Maya learns how bees pollinate flowers."
    })
  }

  #[test]
  fn accepts_a_clean_payload_without_warnings() {
    let raw = valid_payload().to_string();
    let v = validate_artifact(&raw, "Biology").unwrap();
    assert!(v.warnings.is_empty());
    assert_eq!(v.artifact.quiz.len(), 3);
    assert!(v.artifact.content.starts_with("The Busy Bee"));
  }

  #[test]
  fn extracts_json_from_code_fences() {
    let raw = format!("```json\n{}\n```", valid_payload());
    let v = validate_artifact(&raw, "Biology").unwrap();
    assert_eq!(v.artifact.summary, "Maya learns how bees pollinate flowers.");
  }

  #[test]
  fn extracts_json_from_a_prose_envelope() {
    let raw = format!("Sure! Here is your story:\n{}\nHope you like it.", valid_payload());
    assert!(validate_artifact(&raw, "Biology").is_ok());
  }

  #[test]
  fn extraction_ignores_braces_inside_strings() {
    let json = r#"{"a": "curly } brace", "b": 1}"#;
    assert_eq!(extract_json_object(&format!("noise {json} noise")), Some(json));
  }

  #[test]
  fn plain_prose_is_rejected_as_malformed() {
    let err = validate_artifact("Here is your story: The end.", "Biology").unwrap_err();
    match err {
      ApiError::MalformedArtifact(msg) => assert!(msg.contains("no JSON object")),
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn missing_top_level_field_aborts_with_its_name() {
    let mut payload = valid_payload();
    payload.as_object_mut().unwrap().remove("summary");
    let err = validate_artifact(&payload.to_string(), "Biology").unwrap_err();
    assert!(err.to_string().contains("`summary`"));
  }

  #[test]
  fn oversized_quiz_is_truncated_to_three() {
    let mut payload = valid_payload();
    let q = payload["quiz"][0].clone();
    for _ in 0..2 {
      payload["quiz"].as_array_mut().unwrap().push(q.clone());
    }
    let v = validate_artifact(&payload.to_string(), "Biology").unwrap();
    assert_eq!(v.artifact.quiz.len(), 3);
    assert_eq!(v.warnings.len(), 1);
    assert!(v.warnings[0].contains("truncated"));
  }

  #[test]
  fn undersized_quiz_is_padded_with_subject_fillers() {
    let mut payload = valid_payload();
    payload["quiz"].as_array_mut().unwrap().truncate(1);
    let v = validate_artifact(&payload.to_string(), "Volcanoes").unwrap();
    assert_eq!(v.artifact.quiz.len(), 3);
    assert_eq!(v.warnings.len(), 2);
    let filler = &v.artifact.quiz[1];
    assert_eq!(filler.options.len(), 4);
    assert_eq!(filler.options[0], "Volcanoes");
    assert_eq!(filler.correct_answer, 0);
  }

  #[test]
  fn letter_answers_are_mapped_to_indices() {
    let mut payload = valid_payload();
    payload["quiz"][0]["correctAnswer"] = serde_json::json!("C");
    let v = validate_artifact(&payload.to_string(), "Biology").unwrap();
    assert_eq!(v.artifact.quiz[0].correct_answer, 2);
    assert!(v.warnings.is_empty());
  }

  #[test]
  fn snake_case_answer_field_is_accepted() {
    let mut payload = valid_payload();
    let q = payload["quiz"][0].as_object_mut().unwrap();
    q.remove("correctAnswer");
    q.insert("correct_answer".into(), serde_json::json!(1));
    let v = validate_artifact(&payload.to_string(), "Biology").unwrap();
    assert_eq!(v.artifact.quiz[0].correct_answer, 1);
  }

  #[test]
  fn out_of_range_answer_coerces_to_zero_with_warning() {
    let mut payload = valid_payload();
    payload["quiz"][0]["correctAnswer"] = serde_json::json!(7);
    let v = validate_artifact(&payload.to_string(), "Biology").unwrap();
    assert_eq!(v.artifact.quiz[0].correct_answer, 0);
    assert!(v.warnings.iter().any(|w| w.contains("out of range")));
  }

  #[test]
  fn bad_option_lists_become_placeholders() {
    let mut payload = valid_payload();
    payload["quiz"][0]["options"] = serde_json::json!(["only", "three", "options"]);
    let v = validate_artifact(&payload.to_string(), "Biology").unwrap();
    assert_eq!(v.artifact.quiz[0].options.len(), 4);
    assert!(v.warnings.iter().any(|w| w.contains("placeholders")));
  }

  #[test]
  fn missing_answer_is_unrecoverable() {
    let mut payload = valid_payload();
    payload["quiz"][0].as_object_mut().unwrap().remove("correctAnswer");
    assert!(validate_artifact(&payload.to_string(), "Biology").is_err());
  }

  #[test]
  fn empty_vocabulary_is_rejected() {
    let mut payload = valid_payload();
    payload["vocabulary"] = serde_json::json!([]);
    let err = validate_artifact(&payload.to_string(), "Biology").unwrap_err();
    assert!(err.to_string().contains("vocabulary"));
  }

  #[test]
  fn vocabulary_with_blank_field_is_rejected() {
    let mut payload = valid_payload();
    payload["vocabulary"][0]["example"] = serde_json::json!("  ");
    assert!(validate_artifact(&payload.to_string(), "Biology").is_err());
  }

  #[test]
  fn clean_content_strips_leading_chatter() {
    let text = "Here is a story you will like.\nThe Brave Ant\nIt rained all day.";
    let cleaned = clean_content(text);
    assert!(cleaned.starts_with("The Brave Ant"));
    assert!(cleaned.contains("It rained all day."));
  }

  #[test]
  fn clean_content_keeps_text_without_a_title_line() {
    let text = "it was a long day.\nnothing else happened.";
    assert_eq!(clean_content(text), "it was a long day.\n\nnothing else happened.");
  }
}
