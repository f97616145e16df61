//! Minimal OpenAI client for our use-cases.
//!
//! We only call chat.completions and always request a strict JSON object:
//! either a whole evaluation document or a short-answer judgment. Calls are
//! instrumented and log model names, latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{instrument, info, error};

use crate::config::Prompts;
use crate::document::EvaluationDoc;
use crate::domain::Metadata;
use crate::util::fill_template;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
}

/// Judgment returned for one short-answer submission.
#[derive(Debug, Deserialize)]
pub struct Judgment {
  pub correct: bool,
  pub message: String,
  #[serde(default)]
  pub model_answer: Option<String>,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model =
      std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model =
      std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, fast_model, strong_model })
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, String> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
      max_tokens: None,
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "lernquiz-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or_else(|| body);
      return Err(format!("OpenAI HTTP {}: {}", status, msg));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.get(0)
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();

    serde_json::from_str::<T>(&text).map_err(|e| format!("JSON parse error: {}", e))
  }

  // --- High-level helpers (domain-specialized) ---

  /// Generate a fresh evaluation document for the given learner profile.
  #[instrument(
    level = "info",
    skip(self, prompts, meta),
    fields(cefr = %meta.cefr, model = %self.strong_model, cfg_len = prompts.generation_user_template.len())
  )]
  pub async fn generate_evaluation(
    &self,
    prompts: &Prompts,
    meta: &Metadata,
  ) -> Result<EvaluationDoc, String> {
    let interests = meta.interests.join(", ");
    let pairs: [(&str, &str); 4] = [
      ("cefr", meta.cefr.as_str()),
      ("purpose", &meta.purpose),
      ("interests", &interests),
      ("study_major", meta.study_major.as_deref().unwrap_or("-")),
    ];
    let system = fill_template(&prompts.generation_system, &pairs);
    let user = fill_template(&prompts.generation_user_template, &pairs);

    let start = std::time::Instant::now();
    let result = self.chat_json::<EvaluationDoc>(&self.strong_model, &system, &user, 0.9).await;
    let elapsed = start.elapsed();

    match &result {
      Ok(_) => info!(?elapsed, "Model response received successfully"),
      Err(e) => {
        error!(?elapsed, error = %e, "Model call failed during evaluation generation");
        return Err(format!("Model generation failed: {e}"));
      }
    }

    let doc = result?;
    doc.validate().map_err(|e| format!("Generated document rejected: {e}"))?;

    info!(
      phases = doc.evaluation.len(),
      items = doc.total_items(),
      "Evaluation document successfully generated"
    );

    Ok(doc)
  }

  /// Judge one short free-text answer against the item's model answer.
  /// Optional English variants are appended as extra context when present.
  #[instrument(level = "info", skip_all,
               fields(question_len = question.len(), ans_len = user_answer.len(), model = %self.strong_model))]
  pub async fn judge_short_answer(
    &self,
    prompts: &Prompts,
    question: &str,
    user_answer: &str,
    model_answer: &str,
    question_en: Option<&str>,
    model_answer_en: Option<&str>,
  ) -> Result<Judgment, String> {
    let system = &prompts.judge_system;
    let mut user = fill_template(
      &prompts.judge_user_template,
      &[
        ("question", question),
        ("model_answer", model_answer),
        ("answer", user_answer),
      ],
    );
    if let Some(q_en) = question_en {
      user.push_str(&format!("\nQuestion (en): {}", q_en));
    }
    if let Some(m_en) = model_answer_en {
      user.push_str(&format!("\nModel answer (en): {}", m_en));
    }

    self.chat_json(&self.strong_model, system, &user, 0.2).await
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
