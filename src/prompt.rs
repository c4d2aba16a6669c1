//! Prompt composition for initial generation and continuation.
//!
//! The builder owns the decoding parameters too: temperature is fixed at 0.7
//! and max_tokens is sized from the requested word count (a story word plus
//! JSON scaffolding averages well under 4 tokens).

use crate::config::Prompts;
use crate::domain::{AcademicGrade, ContinuationRequest, GenerationRequest};
use crate::util::fill_template;

pub const TEMPERATURE: f32 = 0.7;
const MIN_TOKENS_GENERATION: u32 = 4_000;
const MIN_TOKENS_CONTINUATION: u32 = 1_500;

/// Everything the model client needs for one call.
#[derive(Clone, Debug)]
pub struct BuiltPrompt {
  pub system: String,
  pub user: String,
  pub temperature: f32,
  pub max_tokens: u32,
}

pub fn build_generation_prompt(prompts: &Prompts, req: &GenerationRequest) -> BuiltPrompt {
  let vocabulary_emphasis = if req.generate_vocabulary {
    "Weave the vocabulary words naturally into the story text.\n"
  } else {
    ""
  };
  let summary_emphasis = if req.generate_summary {
    "Give the summary particular care; it will be shown prominently.\n"
  } else {
    ""
  };

  let grade = req.academic_grade.to_string();
  let word_count = req.word_count.to_string();
  let language = req.language.to_string();
  let user = fill_template(
    &prompts.generation_user_template,
    &[
      ("subject", req.subject.as_str()),
      ("academic_grade", grade.as_str()),
      ("word_count", word_count.as_str()),
      ("language", language.as_str()),
      ("setting", req.setting.as_str()),
      ("main_character", req.main_character.as_str()),
      ("subject_specification", req.subject_specification.as_str()),
      ("vocabulary_emphasis", vocabulary_emphasis),
      ("summary_emphasis", summary_emphasis),
    ],
  );

  BuiltPrompt {
    system: prompts.generation_system.clone(),
    user,
    temperature: TEMPERATURE,
    max_tokens: (req.word_count * 4).max(MIN_TOKENS_GENERATION),
  }
}

/// Grade the continuation should target: the requested grade shifted one step
/// easier or harder, clamped to the scale. `None` when no grade was supplied.
pub fn continuation_grade(req: &ContinuationRequest) -> Option<AcademicGrade> {
  req
    .academic_grade
    .map(|g| g.shifted(req.difficulty.grade_delta()))
}

pub fn build_continuation_prompt(prompts: &Prompts, req: &ContinuationRequest) -> BuiltPrompt {
  let grade_clause = match continuation_grade(req) {
    Some(g) => format!(", pitched at {} level students", g),
    None => String::new(),
  };
  let direction = match req.continuation_prompt.as_deref() {
    Some(p) if !p.trim().is_empty() => format!(" Direction for the continuation: {}", p.trim()),
    _ => String::new(),
  };

  let word_count = req.word_count.to_string();
  let language = req.language.to_string();
  let user = fill_template(
    &prompts.continuation_user_template,
    &[
      ("word_count", word_count.as_str()),
      ("language", language.as_str()),
      ("grade_clause", grade_clause.as_str()),
      ("direction", direction.as_str()),
      ("original_story", req.original_story.as_str()),
    ],
  );

  BuiltPrompt {
    system: prompts.continuation_system.clone(),
    user,
    temperature: TEMPERATURE,
    max_tokens: req.word_count.saturating_mul(4).max(MIN_TOKENS_CONTINUATION),
  }
}
