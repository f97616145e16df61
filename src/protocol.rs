//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{EvaluationDoc, EvaluationDocument};
use crate::domain::{Answer, CefrLevel, FeedbackRecord, PhaseKind};
use crate::score::ScoreSummary;
use crate::session::EvaluationSession;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartEvaluation {
        #[serde(rename = "mediaId")]
        media_id: String,
        #[serde(rename = "personalizationId")]
        personalization_id: String,
    },
    SubmitAnswer {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
        #[serde(rename = "itemId")]
        item_id: String,
        answer: Answer,
    },
    Next {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    Prev {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
    Finish {
        #[serde(rename = "sessionId")]
        session_id: Uuid,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: SessionOut,
    },
    Feedback {
        #[serde(rename = "itemId")]
        item_id: String,
        feedback: FeedbackRecord,
    },
    Position {
        position: PositionOut,
    },
    Results {
        results: FinishOut,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct EvaluationQuery {
    #[serde(rename = "mediaId")]
    pub media_id: String,
    #[serde(rename = "personalizationId")]
    pub personalization_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateIn {
    pub media_id: String,
    pub personalization_id: String,
    pub level: CefrLevel,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub study_major: Option<String>,
}

/// DTO used by both WS and HTTP for evaluation document delivery.
/// The payload always goes out in the parsed (object) form.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationOut {
    pub id: String,
    pub media_id: String,
    pub personalization_id: String,
    pub generated: bool,
    pub evaluation_data: EvaluationDoc,
}

/// Convert the internal document to the public DTO.
pub fn to_out(d: &EvaluationDocument) -> EvaluationOut {
    EvaluationOut {
        id: d.id.clone(),
        media_id: d.media_id.clone(),
        personalization_id: d.personalization_id.clone(),
        generated: d.generated,
        evaluation_data: d.doc.clone(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIn {
    pub media_id: String,
    pub personalization_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub session_id: Uuid,
    pub evaluation_id: String,
    pub media_id: String,
    pub personalization_id: String,
    pub total_items: usize,
    /// Flashcard presentation timer, sized by the document's CEFR level.
    pub flashcard_timer_secs: u64,
    pub position: PositionOut,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionOut {
    pub phase_index: usize,
    pub item_index: usize,
    pub phase: PhaseKind,
    pub item_id: String,
    pub last_item: bool,
}

/// Snapshot of an in-progress session's cursor. None once finished.
pub fn position_out(s: &EvaluationSession) -> Option<PositionOut> {
    let pos = s.position().ok()?;
    let item = s.current_item()?;
    Some(PositionOut {
        phase_index: pos.phase,
        item_index: pos.item,
        phase: s.doc.evaluation[pos.phase].kind(),
        item_id: item.id().to_string(),
        last_item: s.at_last_item(),
    })
}

pub fn session_out(s: &EvaluationSession) -> Option<SessionOut> {
    Some(SessionOut {
        session_id: s.id,
        evaluation_id: s.evaluation_id.clone(),
        media_id: s.media_id.clone(),
        personalization_id: s.personalization_id.clone(),
        total_items: s.doc.total_items(),
        flashcard_timer_secs: s.doc.metadata.cefr.flashcard_timer_secs(),
        position: position_out(s)?,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerIn {
    pub session_id: Uuid,
    pub item_id: String,
    pub answer: Answer,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOut {
    pub item_id: String,
    pub feedback: FeedbackRecord,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavIn {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishOut {
    pub evaluation_id: String,
    pub personalization_id: String,
    #[serde(flatten)]
    pub results: ScoreSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeIn {
    pub question: String,
    pub answer: String,
    pub model_answer: String,
    #[serde(default)]
    pub question_en: Option<String>,
    #[serde(default)]
    pub model_answer_en: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeOut {
    pub correct: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsIn {
    pub evaluation_id: String,
    pub personalization_id: String,
    pub correct_numbers: Vec<u32>,
    pub incorrect_numbers: Vec<u32>,
    pub score: u32,
}

#[derive(Serialize)]
pub struct ResultsOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
