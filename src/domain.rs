//! Domain models: grades, languages, requests, artifacts, identities, stored rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Academic grade scale: K, 1..12, University.
/// Ordered so difficulty shifting can move along it (K < 1 < ... < 12 < University).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcademicGrade {
  K,
  Grade(u8), // 1..=12
  University,
}

impl AcademicGrade {
  /// Position on the scale, used for difficulty shifting.
  pub fn index(self) -> i8 {
    match self {
      AcademicGrade::K => 0,
      AcademicGrade::Grade(n) => n as i8,
      AcademicGrade::University => 13,
    }
  }

  pub fn from_index(i: i8) -> Self {
    match i.clamp(0, 13) {
      0 => AcademicGrade::K,
      13 => AcademicGrade::University,
      n => AcademicGrade::Grade(n as u8),
    }
  }

  /// Shift by `delta` steps, clamped at both ends of the scale.
  pub fn shifted(self, delta: i8) -> Self {
    Self::from_index(self.index() + delta)
  }
}

impl fmt::Display for AcademicGrade {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AcademicGrade::K => write!(f, "K"),
      AcademicGrade::Grade(n) => write!(f, "{}", n),
      AcademicGrade::University => write!(f, "University"),
    }
  }
}

impl FromStr for AcademicGrade {
  type Err = String;

  /// Case-sensitive: "K", "1".."12", "University". Everything else is rejected.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "K" => Ok(AcademicGrade::K),
      "University" => Ok(AcademicGrade::University),
      _ => match s.parse::<u8>() {
        Ok(n) if (1..=12).contains(&n) && s == n.to_string() => Ok(AcademicGrade::Grade(n)),
        _ => Err(format!(
          "invalid academic_grade `{}` (expected K, 1..12 or University)",
          s
        )),
      },
    }
  }
}

impl Serialize for AcademicGrade {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_string())
  }
}

impl<'de> Deserialize<'de> for AcademicGrade {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
  }
}

/// Story language. Wire values are the capitalized English names, case-sensitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Language {
  #[default]
  English,
  Spanish,
  French,
  German,
  Italian,
}

impl fmt::Display for Language {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Language::English => "English",
      Language::Spanish => "Spanish",
      Language::French => "French",
      Language::German => "German",
      Language::Italian => "Italian",
    };
    write!(f, "{}", name)
  }
}

impl FromStr for Language {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "English" => Ok(Language::English),
      "Spanish" => Ok(Language::Spanish),
      "French" => Ok(Language::French),
      "German" => Ok(Language::German),
      "Italian" => Ok(Language::Italian),
      _ => Err(format!(
        "invalid language `{}` (expected English, Spanish, French, German or Italian)",
        s
      )),
    }
  }
}

/// Continuation difficulty relative to the original story.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
  Easier,
  Same,
  Harder,
}

impl Difficulty {
  pub fn grade_delta(self) -> i8 {
    match self {
      Difficulty::Easier => -1,
      Difficulty::Same => 0,
      Difficulty::Harder => 1,
    }
  }
}

impl FromStr for Difficulty {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "easier" => Ok(Difficulty::Easier),
      "same" => Ok(Difficulty::Same),
      "harder" => Ok(Difficulty::Harder),
      _ => Err(format!("invalid difficulty `{}` (expected easier, same or harder)", s)),
    }
  }
}

/// Fully-normalized inputs to the initial generation pipeline.
/// Defaults for the optional free-text fields are applied during normalization.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
  pub subject: String,
  pub academic_grade: AcademicGrade,
  pub word_count: u32,
  pub language: Language,
  pub subject_specification: String,
  pub setting: String,
  pub main_character: String,
  pub generate_vocabulary: bool,
  pub generate_summary: bool,
}

/// Normalized inputs for continuing an existing story.
#[derive(Clone, Debug)]
pub struct ContinuationRequest {
  pub original_story: String,
  pub continuation_prompt: Option<String>,
  pub word_count: u32,
  pub language: Language,
  pub difficulty: Difficulty,
  pub academic_grade: Option<AcademicGrade>,
}

/// One vocabulary entry of the generated artifact. All fields non-empty.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VocabularyItem {
  pub word: String,
  pub definition: String,
  pub example: String,
  pub part_of_speech: String,
}

/// One multiple-choice question. Exactly 4 options; `correctAnswer` in 0..=3.
/// The snake_case synonym `correct_answer` is accepted on input and
/// normalized to `correctAnswer` on output.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizQuestion {
  pub question: String,
  pub options: Vec<String>,
  #[serde(rename = "correctAnswer", alias = "correct_answer")]
  pub correct_answer: u8,
}

/// The complete validated output of initial generation.
/// Every 200 response carries one of these with all invariants holding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratedArtifact {
  pub content: String,
  pub learning_objectives: Vec<String>,
  pub vocabulary: Vec<VocabularyItem>,
  pub quiz: Vec<QuizQuestion>,
  pub summary: String,
}

/// Output of story continuation. `timestamp` is provider-reported epoch seconds.
#[derive(Clone, Debug, Serialize)]
pub struct ContinuationArtifact {
  pub content: String,
  pub original_story: String,
  pub word_count_observed: usize,
  pub timestamp: i64,
}

/// The identity a request acts under. Anonymous ids match `anon-<alphanumeric>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
  pub user_id: String,
  pub is_anonymous: bool,
}

impl Identity {
  pub fn authenticated(user_id: impl Into<String>) -> Self {
    Self { user_id: user_id.into(), is_anonymous: false }
  }

  pub fn anonymous(user_id: impl Into<String>) -> Self {
    Self { user_id: user_id.into(), is_anonymous: true }
  }
}

/// Persisted story row, column names matching the `stories` table exactly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredStory {
  pub id: Uuid,
  pub user_id: String,
  pub is_anonymous: bool,
  pub created_at: DateTime<Utc>,
  pub subject: String,
  pub academic_grade: AcademicGrade,
  pub word_count: u32,
  pub language: Language,
  pub subject_specification: String,
  pub setting: String,
  pub main_character: String,
  pub story_text: String,
  pub story_title: String,
  pub learning_objectives: Vec<String>,
  pub quiz_questions: Vec<QuizQuestion>,
  pub vocabulary_list: Vec<VocabularyItem>,
  pub story_summary: String,
  pub is_continuation: bool,
}

impl StoredStory {
  /// Flatten a request + validated artifact into a row for the given identity.
  /// `id` and `created_at` are assigned here, at insert time.
  pub fn from_generation(
    request: &GenerationRequest,
    artifact: &GeneratedArtifact,
    identity: &Identity,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      user_id: identity.user_id.clone(),
      is_anonymous: identity.is_anonymous,
      created_at: Utc::now(),
      subject: request.subject.clone(),
      academic_grade: request.academic_grade,
      word_count: request.word_count,
      language: request.language,
      subject_specification: request.subject_specification.clone(),
      setting: request.setting.clone(),
      main_character: request.main_character.clone(),
      story_text: artifact.content.clone(),
      story_title: derive_title(&artifact.content),
      learning_objectives: artifact.learning_objectives.clone(),
      quiz_questions: artifact.quiz.clone(),
      vocabulary_list: artifact.vocabulary.clone(),
      story_summary: artifact.summary.clone(),
      is_continuation: false,
    }
  }
}

/// First non-empty line of the story content, which the prompt contract
/// requires to be the title.
pub fn derive_title(content: &str) -> String {
  content
    .lines()
    .map(str::trim)
    .find(|l| !l.is_empty())
    .unwrap_or("Untitled story")
    .to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn grade_parsing_is_case_sensitive_and_bounded() {
    assert_eq!("K".parse::<AcademicGrade>().unwrap(), AcademicGrade::K);
    assert_eq!("5".parse::<AcademicGrade>().unwrap(), AcademicGrade::Grade(5));
    assert_eq!("12".parse::<AcademicGrade>().unwrap(), AcademicGrade::Grade(12));
    assert_eq!(
      "University".parse::<AcademicGrade>().unwrap(),
      AcademicGrade::University
    );
    assert!("13".parse::<AcademicGrade>().is_err());
    assert!("0".parse::<AcademicGrade>().is_err());
    assert!("k".parse::<AcademicGrade>().is_err());
    assert!("university".parse::<AcademicGrade>().is_err());
    assert!("05".parse::<AcademicGrade>().is_err());
  }

  #[test]
  fn grade_shifting_clamps_at_both_ends() {
    assert_eq!(AcademicGrade::Grade(5).shifted(1), AcademicGrade::Grade(6));
    assert_eq!(AcademicGrade::Grade(5).shifted(-1), AcademicGrade::Grade(4));
    assert_eq!(AcademicGrade::K.shifted(-1), AcademicGrade::K);
    assert_eq!(AcademicGrade::Grade(1).shifted(-1), AcademicGrade::K);
    assert_eq!(AcademicGrade::Grade(12).shifted(1), AcademicGrade::University);
    assert_eq!(AcademicGrade::University.shifted(1), AcademicGrade::University);
  }

  #[test]
  fn language_rejects_lowercase() {
    assert_eq!("English".parse::<Language>().unwrap(), Language::English);
    assert!("english".parse::<Language>().is_err());
  }

  #[test]
  fn quiz_question_accepts_snake_case_alias() {
    let q: QuizQuestion = serde_json::from_str(
      r#"{"question":"Q?","options":["a","b","c","d"],"correct_answer":2}"#,
    )
    .unwrap();
    assert_eq!(q.correct_answer, 2);
    let out = serde_json::to_value(&q).unwrap();
    assert_eq!(out["correctAnswer"], 2);
    assert!(out.get("correct_answer").is_none());
  }

  #[test]
  fn stored_story_round_trips_through_json() {
    let request = GenerationRequest {
      subject: "Biology".into(),
      academic_grade: AcademicGrade::Grade(5),
      word_count: 300,
      language: Language::English,
      subject_specification: "Basic concepts".into(),
      setting: "a classroom".into(),
      main_character: "a student".into(),
      generate_vocabulary: false,
      generate_summary: false,
    };
    let artifact = GeneratedArtifact {
      content: "The Cell\n\nOnce there was a cell.".into(),
      learning_objectives: vec!["Understand cells".into()],
      vocabulary: vec![VocabularyItem {
        word: "cell".into(),
        definition: "smallest unit of life".into(),
        example: "A cell divides.".into(),
        part_of_speech: "noun".into(),
      }],
      quiz: vec![QuizQuestion {
        question: "What divides?".into(),
        options: vec!["cell".into(), "rock".into(), "star".into(), "car".into()],
        correct_answer: 0,
      }],
      summary: "A story about cells.".into(),
    };
    let identity = Identity::anonymous("anon-abc123");
    let row = StoredStory::from_generation(&request, &artifact, &identity);
    assert!(row.is_anonymous);
    assert_eq!(row.story_title, "The Cell");

    let json = serde_json::to_string(&row).unwrap();
    let back: StoredStory = serde_json::from_str(&json).unwrap();
    assert_eq!(back.user_id, row.user_id);
    assert_eq!(back.story_text, row.story_text);
    assert_eq!(back.quiz_questions, row.quiz_questions);
    assert_eq!(back.vocabulary_list, row.vocabulary_list);
  }
}
