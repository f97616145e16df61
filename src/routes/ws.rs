//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.
//!
//! The connection owns at most one live session: starting a new evaluation
//! drops the previous one, and the session is discarded on disconnect. This
//! mirrors the view-local lifetime of an evaluation run.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};
use uuid::Uuid;

use crate::error::ApiError;
use crate::logic::*;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "lernquiz_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "lernquiz_backend", "WebSocket connected");
  let mut current_session: Option<Uuid> = None;

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target = "lernquiz_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &mut current_session).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "lernquiz_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }

  // Session state is local to the connection's lifetime.
  if let Some(id) = current_session.take() {
    state.drop_session(id).await;
  }
  info!(target: "lernquiz_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state, current_session))]
async fn handle_client_ws(
  msg: ClientWsMessage,
  state: &AppState,
  current_session: &mut Option<Uuid>,
) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartEvaluation { media_id, personalization_id } => {
      // Switching documents resets everything atomically: the old session
      // is dropped, the new one starts at (0, 0) with empty maps.
      if let Some(old) = current_session.take() {
        state.drop_session(old).await;
      }
      match start_session(state, &media_id, &personalization_id).await {
        Ok(session) => {
          *current_session = Some(session.session_id);
          tracing::info!(target: "evaluation", session_id = %session.session_id, "WS session started");
          ServerWsMessage::Session { session }
        }
        Err(e) => error_reply(e),
      }
    }

    ClientWsMessage::SubmitAnswer { session_id, item_id, answer } => {
      match evaluate_answer(state, session_id, &item_id, answer).await {
        Ok(feedback) => {
          tracing::info!(target: "evaluation", id = %item_id, correct = feedback.correct, "WS answer evaluated");
          ServerWsMessage::Feedback { item_id, feedback }
        }
        Err(e) => error_reply(e),
      }
    }

    ClientWsMessage::Next { session_id } => match next_item(state, session_id).await {
      Ok(position) => ServerWsMessage::Position { position },
      Err(e) => error_reply(e),
    },

    ClientWsMessage::Prev { session_id } => match prev_item(state, session_id).await {
      Ok(position) => ServerWsMessage::Position { position },
      Err(e) => error_reply(e),
    },

    ClientWsMessage::Finish { session_id } => match finish_session(state, session_id).await {
      Ok(results) => {
        tracing::info!(target: "evaluation", score = results.results.score, "WS session finished");
        ServerWsMessage::Results { results }
      }
      Err(e) => error_reply(e),
    },
  }
}

fn error_reply(e: ApiError) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.to_string() }
}
