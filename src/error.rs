//! Error taxonomy for documents and evaluation sessions.
//!
//! Document errors are terminal for the request (the client renders a static
//! error, no retry). Session errors reject a single operation and leave the
//! session untouched. Nothing in this service is retried automatically.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::PhaseKind;

/// Problems with an evaluation document itself.
#[derive(Debug, Error)]
pub enum DocumentError {
  #[error("malformed evaluation payload: {0}")]
  Malformed(String),
  #[error("document belongs to media '{found}', requested '{requested}'")]
  MediaMismatch { requested: String, found: String },
  #[error("evaluation document has no phases")]
  EmptyPhases,
  #[error("phase '{kind}' has no items")]
  EmptyItems { kind: PhaseKind },
  #[error("duplicate item id '{0}' in evaluation document")]
  DuplicateItemId(String),
}

/// Problems with one operation on an evaluation session.
#[derive(Debug, Error)]
pub enum SessionError {
  #[error("unknown session: {0}")]
  UnknownSession(Uuid),
  #[error("unknown item: {0}")]
  UnknownItem(String),
  #[error("answer kind does not match item '{item}' of kind {expected}")]
  KindMismatch { item: String, expected: PhaseKind },
  #[error("item '{0}' already has feedback")]
  AlreadyAnswered(String),
  #[error("not every blank holds a value yet")]
  IncompleteAnswer,
  #[error("finish is only available from the last item of the last phase")]
  FinishUnavailable,
  #[error("evaluation already finished")]
  Finished,
}

/// Request-level error returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Document(#[from] DocumentError),
  #[error(transparent)]
  Session(#[from] SessionError),
  /// The evaluation has not been generated yet. Not an error to the user.
  #[error("evaluation not ready")]
  NotReady,
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::NotReady => StatusCode::NOT_FOUND,
      ApiError::Document(DocumentError::MediaMismatch { .. }) => StatusCode::CONFLICT,
      ApiError::Document(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Session(SessionError::UnknownSession(_))
      | ApiError::Session(SessionError::UnknownItem(_)) => StatusCode::NOT_FOUND,
      ApiError::Session(SessionError::KindMismatch { .. })
      | ApiError::Session(SessionError::IncompleteAnswer) => StatusCode::BAD_REQUEST,
      ApiError::Session(SessionError::AlreadyAnswered(_))
      | ApiError::Session(SessionError::FinishUnavailable)
      | ApiError::Session(SessionError::Finished) => StatusCode::CONFLICT,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = Json(serde_json::json!({ "error": self.to_string() }));
    (status, body).into_response()
  }
}
