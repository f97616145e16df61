//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs include parameters and basic result info.

use std::sync::Arc;
use axum::{extract::{State, Query}, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::domain::Metadata;
use crate::error::ApiError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::{AppState, ResultsRecord};

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

/// 404 here means "not generated yet", which the client treats as not ready.
#[instrument(level = "info", skip(state), fields(%q.media_id))]
pub async fn http_get_evaluation(
  State(state): State<Arc<AppState>>,
  Query(q): Query<EvaluationQuery>,
) -> Result<Json<EvaluationOut>, ApiError> {
  let document = state
    .get_document(&q.media_id, q.personalization_id.as_deref())
    .await
    .ok_or(ApiError::NotReady)?;
  info!(target: "evaluation", media_id = %q.media_id, id = %document.id, "HTTP evaluation served");
  Ok(Json(to_out(&document)))
}

#[instrument(level = "info", skip(state, body), fields(%body.media_id, level = %body.level))]
pub async fn http_generate_evaluation(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GenerateIn>,
) -> Json<EvaluationOut> {
  let meta = Metadata {
    cefr: body.level,
    purpose: body.purpose.unwrap_or_default(),
    interests: body.interests,
    study_major: body.study_major,
  };
  let (document, origin) = state
    .generate_document(&body.media_id, &body.personalization_id, meta)
    .await;
  info!(target: "evaluation", id = %document.id, %origin, "HTTP evaluation generated");
  Json(to_out(&document))
}

#[instrument(level = "info", skip(state, body), fields(%body.media_id, %body.personalization_id))]
pub async fn http_start_session(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SessionIn>,
) -> Result<Json<SessionOut>, ApiError> {
  let out = start_session(&state, &body.media_id, &body.personalization_id).await?;
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(%body.session_id, %body.item_id))]
pub async fn http_submit_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>, ApiError> {
  let feedback = evaluate_answer(&state, body.session_id, &body.item_id, body.answer).await?;
  info!(target: "evaluation", id = %body.item_id, correct = feedback.correct, "HTTP answer evaluated");
  Ok(Json(AnswerOut { item_id: body.item_id, feedback }))
}

#[instrument(level = "info", skip(state, body), fields(%body.session_id))]
pub async fn http_next(
  State(state): State<Arc<AppState>>,
  Json(body): Json<NavIn>,
) -> Result<Json<PositionOut>, ApiError> {
  Ok(Json(next_item(&state, body.session_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(%body.session_id))]
pub async fn http_prev(
  State(state): State<Arc<AppState>>,
  Json(body): Json<NavIn>,
) -> Result<Json<PositionOut>, ApiError> {
  Ok(Json(prev_item(&state, body.session_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(%body.session_id))]
pub async fn http_finish(
  State(state): State<Arc<AppState>>,
  Json(body): Json<NavIn>,
) -> Result<Json<FinishOut>, ApiError> {
  let out = finish_session(&state, body.session_id).await?;
  info!(target: "evaluation", score = out.results.score, "HTTP session finished");
  Ok(Json(out))
}

/// Standalone judgment endpoint; never fails outward, the fallback covers
/// remote errors.
#[instrument(level = "info", skip(state, body), fields(answer_len = body.answer.len()))]
pub async fn http_judge_short_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<JudgeIn>,
) -> Json<JudgeOut> {
  let (correct, message, model_answer) = judge_short_answer(
    &state,
    &body.question,
    &body.answer,
    &body.model_answer,
    body.question_en.as_deref(),
    body.model_answer_en.as_deref(),
  )
  .await;
  Json(JudgeOut { correct, message, model_answer })
}

#[instrument(level = "info", skip(state, body), fields(%body.evaluation_id, score = body.score))]
pub async fn http_post_results(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ResultsIn>,
) -> Json<ResultsOut> {
  state
    .record_results(ResultsRecord {
      evaluation_id: body.evaluation_id,
      personalization_id: body.personalization_id,
      correct_numbers: body.correct_numbers,
      incorrect_numbers: body.incorrect_numbers,
      score: body.score,
    })
    .await;
  Json(ResultsOut { ok: true })
}
