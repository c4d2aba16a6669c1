//! Wire DTOs for the HTTP endpoints, and normalization of loose request
//! bodies into the typed domain structs.
//!
//! Request bodies deserialize with every field optional so that a single 400
//! can enumerate ALL missing required fields instead of failing on the first.
//! Field names here are the compatibility contract with existing clients —
//! do not rename them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{
    ContinuationArtifact, ContinuationRequest, Difficulty, GeneratedArtifact, GenerationRequest,
    Identity, QuizQuestion, StoredStory, VocabularyItem,
};
use crate::error::ApiError;
use crate::util::strip_angle_brackets;

const DEFAULT_SUBJECT_SPECIFICATION: &str = "Basic concepts";
const DEFAULT_SETTING: &str = "a classroom";
const DEFAULT_MAIN_CHARACTER: &str = "a student";
const DEFAULT_CONTINUATION_WORDS: u32 = 300;

//
// Request bodies (loose)
//

#[derive(Debug, Default, Deserialize)]
pub struct GenerateStoryIn {
    pub subject: Option<String>,
    pub academic_grade: Option<String>,
    pub word_count: Option<Value>,
    pub language: Option<String>,
    pub subject_specification: Option<String>,
    pub setting: Option<String>,
    pub main_character: Option<String>,
    pub generate_vocabulary: Option<bool>,
    pub generate_summary: Option<bool>,
    pub anonymous_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContinueStoryIn {
    pub original_story: Option<String>,
    pub continuation_prompt: Option<String>,
    pub word_count: Option<Value>,
    pub language: Option<String>,
    pub difficulty: Option<String>,
    pub academic_grade: Option<String>,
}

/// Trimmed, bracket-stripped free text; None when absent or blank.
fn clean_text(s: Option<&str>) -> Option<String> {
    s.map(strip_angle_brackets)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Coerce a JSON number or numeric string to an integer word count.
fn coerce_word_count(v: &Value) -> Result<i64, ApiError> {
    let n = match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    };
    n.ok_or_else(|| {
        ApiError::InvalidInput(format!("word_count must be an integer, got {v}"))
    })
}

impl GenerateStoryIn {
    /// Apply defaults, strip brackets, parse enums, and range-check.
    /// Collects every missing required field into one error.
    pub fn normalize(self) -> Result<GenerationRequest, ApiError> {
        let subject = clean_text(self.subject.as_deref());
        let mut missing = Vec::new();
        if subject.is_none() {
            missing.push("subject");
        }
        if self.academic_grade.is_none() {
            missing.push("academic_grade");
        }
        if self.word_count.is_none() {
            missing.push("word_count");
        }
        if self.language.is_none() {
            missing.push("language");
        }
        if !missing.is_empty() {
            return Err(ApiError::InvalidInput(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let academic_grade = self
            .academic_grade
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(ApiError::InvalidInput)?;
        let language = self
            .language
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(ApiError::InvalidInput)?;

        let word_count = coerce_word_count(self.word_count.as_ref().unwrap_or(&Value::Null))?;
        if !(100..=5000).contains(&word_count) {
            return Err(ApiError::InvalidInput(format!(
                "word_count must be between 100 and 5000, got {word_count}"
            )));
        }

        Ok(GenerationRequest {
            subject: subject.unwrap_or_default(),
            academic_grade,
            word_count: word_count as u32,
            language,
            subject_specification: clean_text(self.subject_specification.as_deref())
                .unwrap_or_else(|| DEFAULT_SUBJECT_SPECIFICATION.into()),
            setting: clean_text(self.setting.as_deref())
                .unwrap_or_else(|| DEFAULT_SETTING.into()),
            main_character: clean_text(self.main_character.as_deref())
                .unwrap_or_else(|| DEFAULT_MAIN_CHARACTER.into()),
            generate_vocabulary: self.generate_vocabulary.unwrap_or(false),
            generate_summary: self.generate_summary.unwrap_or(false),
        })
    }
}

impl ContinueStoryIn {
    pub fn normalize(self) -> Result<ContinuationRequest, ApiError> {
        let original_story = clean_text(self.original_story.as_deref()).ok_or_else(|| {
            ApiError::InvalidInput("missing required fields: original_story".into())
        })?;

        let word_count = match self.word_count.as_ref() {
            Some(v) => {
                let n = coerce_word_count(v)?;
                if !(1..=5000).contains(&n) {
                    return Err(ApiError::InvalidInput(format!(
                        "word_count must be between 1 and 5000, got {n}"
                    )));
                }
                n as u32
            }
            None => DEFAULT_CONTINUATION_WORDS,
        };

        let language = match self.language.as_deref() {
            Some(s) => s.parse().map_err(ApiError::InvalidInput)?,
            None => Default::default(),
        };
        let difficulty = match self.difficulty.as_deref() {
            Some(s) => s.parse().map_err(ApiError::InvalidInput)?,
            None => Difficulty::Same,
        };
        let academic_grade = match self.academic_grade.as_deref() {
            Some(s) => Some(s.parse().map_err(ApiError::InvalidInput)?),
            None => None,
        };

        Ok(ContinuationRequest {
            original_story,
            continuation_prompt: clean_text(self.continuation_prompt.as_deref()),
            word_count,
            language,
            difficulty,
            academic_grade,
        })
    }
}

//
// Response bodies
//

/// Full artifact plus the persistence outcome and the identity it was stored
/// under (clients keep the minted anonymous id for later listing).
#[derive(Debug, Serialize)]
pub struct GenerateStoryOut {
    pub content: String,
    pub learning_objectives: Vec<String>,
    pub vocabulary: Vec<VocabularyItem>,
    pub quiz: Vec<QuizQuestion>,
    pub summary: String,
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub story_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_error: Option<String>,
    pub user_id: String,
    pub is_anonymous: bool,
}

impl GenerateStoryOut {
    pub fn new(
        artifact: GeneratedArtifact,
        identity: Identity,
        story_id: Option<Uuid>,
        save_error: Option<String>,
    ) -> Self {
        Self {
            content: artifact.content,
            learning_objectives: artifact.learning_objectives,
            vocabulary: artifact.vocabulary,
            quiz: artifact.quiz,
            summary: artifact.summary,
            saved: story_id.is_some(),
            story_id,
            save_error,
            user_id: identity.user_id,
            is_anonymous: identity.is_anonymous,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContinueStoryOut {
    pub data: ContinueData,
    pub meta: ContinueMeta,
}

#[derive(Debug, Serialize)]
pub struct ContinueData {
    pub continuation: ContinuationArtifact,
}

#[derive(Debug, Serialize)]
pub struct ContinueMeta {
    pub model: String,
    pub processing_time_seconds: f64,
}

#[derive(Debug, Serialize)]
pub struct UserStoriesOut {
    pub stories: Vec<StoredStory>,
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AcademicGrade, Language};

    fn full_body() -> GenerateStoryIn {
        GenerateStoryIn {
            subject: Some("Biology".into()),
            academic_grade: Some("5".into()),
            word_count: Some(serde_json::json!(300)),
            language: Some("English".into()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_required_fields_are_all_enumerated() {
        let body = GenerateStoryIn { subject: Some("Math".into()), ..Default::default() };
        let err = body.normalize().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("academic_grade"), "{msg}");
        assert!(msg.contains("word_count"), "{msg}");
        assert!(msg.contains("language"), "{msg}");
        assert!(!msg.contains("subject,"), "{msg}");
    }

    #[test]
    fn defaults_are_applied_to_optional_text_fields() {
        let req = full_body().normalize().unwrap();
        assert_eq!(req.subject_specification, "Basic concepts");
        assert_eq!(req.setting, "a classroom");
        assert_eq!(req.main_character, "a student");
        assert!(!req.generate_vocabulary);
        assert_eq!(req.academic_grade, AcademicGrade::Grade(5));
        assert_eq!(req.language, Language::English);
    }

    #[test]
    fn word_count_boundaries_are_inclusive() {
        for (n, ok) in [(99, false), (100, true), (5000, true), (5001, false)] {
            let mut body = full_body();
            body.word_count = Some(serde_json::json!(n));
            assert_eq!(body.normalize().is_ok(), ok, "word_count={n}");
        }
    }

    #[test]
    fn word_count_is_coerced_from_strings_and_floats() {
        let mut body = full_body();
        body.word_count = Some(serde_json::json!("250"));
        assert_eq!(body.normalize().unwrap().word_count, 250);

        let mut body = full_body();
        body.word_count = Some(serde_json::json!(250.7));
        assert_eq!(body.normalize().unwrap().word_count, 250);

        let mut body = full_body();
        body.word_count = Some(serde_json::json!("lots"));
        assert!(body.normalize().is_err());
    }

    #[test]
    fn lowercase_language_is_rejected() {
        let mut body = full_body();
        body.language = Some("english".into());
        let err = body.normalize().unwrap_err();
        assert!(err.to_string().contains("invalid language"));
    }

    #[test]
    fn grade_thirteen_is_rejected() {
        let mut body = full_body();
        body.academic_grade = Some("13".into());
        assert!(body.normalize().is_err());

        let mut body = full_body();
        body.academic_grade = Some("University".into());
        assert!(body.normalize().is_ok());
    }

    #[test]
    fn angle_brackets_are_stripped_from_free_text() {
        let mut body = full_body();
        body.subject = Some("Biology <script>".into());
        body.setting = Some("<a lab>".into());
        let req = body.normalize().unwrap();
        assert_eq!(req.subject, "Biology script");
        assert_eq!(req.setting, "a lab");
    }

    #[test]
    fn continuation_requires_original_story() {
        let err = ContinueStoryIn::default().normalize().unwrap_err();
        assert!(err.to_string().contains("original_story"));
    }

    #[test]
    fn continuation_defaults_word_count_and_language() {
        let body = ContinueStoryIn {
            original_story: Some("A story.".into()),
            ..Default::default()
        };
        let req = body.normalize().unwrap();
        assert_eq!(req.word_count, 300);
        assert_eq!(req.language, Language::English);
        assert_eq!(req.difficulty, Difficulty::Same);
        assert!(req.academic_grade.is_none());
    }

    #[test]
    fn continuation_word_count_is_bounded() {
        for (n, ok) in [(1, true), (5000, true), (0, false), (5001, false), (2_000_000_000i64, false)] {
            let body = ContinueStoryIn {
                original_story: Some("A story.".into()),
                word_count: Some(serde_json::json!(n)),
                ..Default::default()
            };
            assert_eq!(body.normalize().is_ok(), ok, "word_count={n}");
        }
    }

    #[test]
    fn continuation_rejects_unknown_difficulty() {
        let body = ContinueStoryIn {
            original_story: Some("A story.".into()),
            difficulty: Some("hardest".into()),
            ..Default::default()
        };
        assert!(body.normalize().is_err());
    }

    #[test]
    fn save_error_is_omitted_from_successful_saves() {
        let artifact = GeneratedArtifact {
            content: "T\n\nBody.".into(),
            learning_objectives: vec!["o".into()],
            vocabulary: vec![VocabularyItem {
                word: "w".into(),
                definition: "d".into(),
                example: "e".into(),
                part_of_speech: "noun".into(),
            }],
            quiz: vec![],
            summary: "s".into(),
        };
        let id = Uuid::new_v4();
        let out = GenerateStoryOut::new(
            artifact,
            Identity::anonymous("anon-x1"),
            Some(id),
            None,
        );
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["saved"], true);
        assert_eq!(json["story_id"], serde_json::json!(id));
        assert!(json.get("save_error").is_none());
        assert_eq!(json["user_id"], "anon-x1");
    }
}
