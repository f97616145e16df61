//! Loading trainer configuration (prompts + optional evaluation bank) from TOML.
//!
//! See `TrainerConfig` and `Prompts` for expected schema.

use serde::Deserialize;
use tracing::{info, error};

use crate::document::EvaluationData;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TrainerConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub evaluations: Vec<EvaluationCfg>,
}

/// Evaluation entry accepted in TOML configuration. `data` holds the payload
/// either as a raw JSON string (the double-encoded form) or as an inline
/// table; both resolve through `EvaluationData` at load time.
#[derive(Clone, Debug, Deserialize)]
pub struct EvaluationCfg {
  #[serde(default)] pub id: Option<String>,
  pub media_id: String,
  #[serde(default)] pub personalization_id: Option<String>,
  pub data: EvaluationData,
}

/// Prompts used by the OpenAI client. Defaults are sensible for German
/// evaluation content. Override them in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  // Document generation
  pub generation_system: String,
  pub generation_user_template: String,
  // Short-answer judgment
  pub judge_system: String,
  pub judge_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      generation_system: "You are a German learning content generator. Respond ONLY with strict JSON.".into(),
      generation_user_template: "Generate an evaluation for a learner at CEFR level {cefr} (purpose: {purpose}; interests: {interests}; study major: {study_major}). Return JSON with fields: metadata {cefr, purpose, interests, studyMajor} and evaluation, an array of four phases in this order: {\"phase\":\"flashcard\",\"items\":[{id, prompt, answer, promptEn, answerEn}]}, {\"phase\":\"multiple_choice\",\"items\":[{id, question, options, correctIndex, questionEn, optionsEn}]}, {\"phase\":\"fill_blank\",\"items\":[{id, sentence, options, correctIndices, sentenceEn}]}, {\"phase\":\"short_answer\",\"items\":[{id, question, modelAnswer, questionEn, modelAnswerEn}]}. Use 3-5 items per phase with short natural German. Item ids must be unique strings. Mark single blanks with ____ and multiple blanks with numbered __[1]__, __[2]__ tokens; correctIndices lists the right option per blank in order.".into(),
      judge_system: "You are a strict but encouraging German teacher grading one short free-text answer. Reply as compact JSON.".into(),
      judge_user_template: "Question: {question}\nModel answer: {model_answer}\nStudent answer: {answer}\nReturn JSON {\"correct\": boolean, \"message\": string, \"model_answer\": string}. Accept paraphrases that preserve the meaning; ignore minor spelling and punctuation. The message is one or two sentences addressed to the student.".into(),
    }
  }
}

/// Attempt to load `TrainerConfig` from TRAINER_CONFIG_PATH. On any
/// parsing/IO error, returns None.
pub fn load_trainer_config_from_env() -> Option<TrainerConfig> {
  let path = std::env::var("TRAINER_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<TrainerConfig>(&s) {
      Ok(cfg) => {
        info!(target: "lernquiz_backend", %path, "Loaded trainer config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "lernquiz_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "lernquiz_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
