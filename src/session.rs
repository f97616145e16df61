//! Evaluation sessions: the walker state machine plus the answer and
//! feedback maps for one run through a document.
//!
//! The walker lives at `(phase, item)` and only ever moves by one step.
//! `next`/`prev` are no-ops at the boundaries; `finish` is explicit and only
//! reachable from the last item of the last phase. Sessions are transient:
//! they live in the in-memory store and are dropped when the client starts a
//! new one or disconnects.

use std::collections::HashMap;
use uuid::Uuid;

use crate::document::{EvaluationDoc, EvaluationDocument};
use crate::domain::{Answer, FeedbackRecord, ItemRef};
use crate::error::{DocumentError, SessionError};
use crate::score::{self, ScoreSummary};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
  pub phase: usize,
  pub item: usize,
}

#[derive(Clone, Debug)]
enum WalkerState {
  InProgress(Position),
  Finished(ScoreSummary),
}

pub struct EvaluationSession {
  pub id: Uuid,
  pub evaluation_id: String,
  pub media_id: String,
  pub personalization_id: String,
  pub doc: EvaluationDoc,
  pub answers: HashMap<String, Answer>,
  pub feedback: HashMap<String, FeedbackRecord>,
  state: WalkerState,
}

impl EvaluationSession {
  /// Build a fresh session on a stored document. Validates the document for
  /// the requested media first; answers, feedback and position all start
  /// empty/zeroed together.
  pub fn new(document: &EvaluationDocument, media_id: &str) -> Result<Self, DocumentError> {
    document.validate_for(media_id)?;
    Ok(Self {
      id: Uuid::new_v4(),
      evaluation_id: document.id.clone(),
      media_id: document.media_id.clone(),
      personalization_id: document.personalization_id.clone(),
      doc: document.doc.clone(),
      answers: HashMap::new(),
      feedback: HashMap::new(),
      state: WalkerState::InProgress(Position { phase: 0, item: 0 }),
    })
  }

  /// Current position, or the session error if the walker already finished.
  pub fn position(&self) -> Result<Position, SessionError> {
    match &self.state {
      WalkerState::InProgress(pos) => Ok(*pos),
      WalkerState::Finished(_) => Err(SessionError::Finished),
    }
  }

  #[allow(dead_code)]
  pub fn is_finished(&self) -> bool {
    matches!(self.state, WalkerState::Finished(_))
  }

  /// Final summary once the walker reached the terminal state.
  #[allow(dead_code)]
  pub fn results(&self) -> Option<&ScoreSummary> {
    match &self.state {
      WalkerState::Finished(summary) => Some(summary),
      WalkerState::InProgress(_) => None,
    }
  }

  /// Item under the cursor. Positions are maintained in bounds, so this only
  /// returns None on a finished session.
  pub fn current_item(&self) -> Option<ItemRef<'_>> {
    let pos = self.position().ok()?;
    self.doc.evaluation.get(pos.phase)?.item_refs().get(pos.item).copied()
  }

  pub fn at_last_item(&self) -> bool {
    match self.position() {
      Ok(pos) => {
        pos.phase + 1 == self.doc.evaluation.len()
          && pos.item + 1 == self.doc.evaluation[pos.phase].len()
      }
      Err(_) => false,
    }
  }

  /// Advance one item; step into the next phase at a phase end. No-op on the
  /// last item of the last phase (finishing requires an explicit `finish`).
  pub fn next(&mut self) -> Result<Position, SessionError> {
    let pos = self.position()?;
    let new = if pos.item + 1 < self.doc.evaluation[pos.phase].len() {
      Position { phase: pos.phase, item: pos.item + 1 }
    } else if pos.phase + 1 < self.doc.evaluation.len() {
      Position { phase: pos.phase + 1, item: 0 }
    } else {
      pos
    };
    self.state = WalkerState::InProgress(new);
    Ok(new)
  }

  /// Step back one item; at the start of a phase move to the previous
  /// phase's last item. No-op at `(0, 0)`.
  pub fn prev(&mut self) -> Result<Position, SessionError> {
    let pos = self.position()?;
    let new = if pos.item > 0 {
      Position { phase: pos.phase, item: pos.item - 1 }
    } else if pos.phase > 0 {
      let prev_phase = pos.phase - 1;
      Position { phase: prev_phase, item: self.doc.evaluation[prev_phase].len() - 1 }
    } else {
      pos
    };
    self.state = WalkerState::InProgress(new);
    Ok(new)
  }

  /// Compute the aggregate and move to the terminal state. Only reachable
  /// from the last item of the last phase.
  pub fn finish(&mut self) -> Result<ScoreSummary, SessionError> {
    self.position()?;
    if !self.at_last_item() {
      return Err(SessionError::FinishUnavailable);
    }
    let summary = score::aggregate(&self.doc, &self.feedback);
    self.state = WalkerState::Finished(summary.clone());
    Ok(summary)
  }

  /// Store the submitted answer and its verdict. Write-once per item.
  pub fn record(
    &mut self,
    item_id: &str,
    answer: Answer,
    record: FeedbackRecord,
  ) -> Result<(), SessionError> {
    self.position()?;
    if self.feedback.contains_key(item_id) {
      return Err(SessionError::AlreadyAnswered(item_id.to_string()));
    }
    self.answers.insert(item_id.to_string(), answer);
    self.feedback.insert(item_id.to_string(), record);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::document::DocumentSource;
  use crate::domain::{
    CefrLevel, FlashcardItem, Metadata, MultipleChoiceItem, Phase,
  };

  fn document() -> EvaluationDocument {
    EvaluationDocument {
      id: "eval-1".into(),
      media_id: "media-1".into(),
      personalization_id: "pers-1".into(),
      generated: true,
      source: DocumentSource::Seed,
      doc: EvaluationDoc {
        metadata: Metadata {
          cefr: CefrLevel::B1,
          purpose: String::new(),
          interests: vec![],
          study_major: None,
        },
        evaluation: vec![
          Phase::Flashcard {
            items: vec![
              FlashcardItem {
                id: "f1".into(),
                prompt: "gehen".into(),
                answer: "to go".into(),
                prompt_en: None,
                answer_en: None,
              },
              FlashcardItem {
                id: "f2".into(),
                prompt: "kommen".into(),
                answer: "to come".into(),
                prompt_en: None,
                answer_en: None,
              },
            ],
          },
          Phase::MultipleChoice {
            items: vec![MultipleChoiceItem {
              id: "m1".into(),
              question: "Plural von 'Kind'?".into(),
              options: vec!["Kinder".into(), "Kinds".into()],
              correct_index: 0,
              question_en: None,
              options_en: None,
            }],
          },
        ],
      },
    }
  }

  fn verdict(correct: bool) -> FeedbackRecord {
    FeedbackRecord { correct, message: "ok".into(), model_answer: None }
  }

  #[test]
  fn starts_at_origin_with_empty_maps() {
    let s = EvaluationSession::new(&document(), "media-1").unwrap();
    assert_eq!(s.position().unwrap(), Position { phase: 0, item: 0 });
    assert!(s.answers.is_empty());
    assert!(s.feedback.is_empty());
    assert!(!s.is_finished());
  }

  #[test]
  fn rejects_wrong_media() {
    assert!(EvaluationSession::new(&document(), "media-other").is_err());
  }

  #[test]
  fn next_crosses_phase_boundary_and_stops_at_the_end() {
    let mut s = EvaluationSession::new(&document(), "media-1").unwrap();
    assert_eq!(s.next().unwrap(), Position { phase: 0, item: 1 });
    assert_eq!(s.next().unwrap(), Position { phase: 1, item: 0 });
    assert!(s.at_last_item());
    // No automatic transition past the last item of the last phase.
    assert_eq!(s.next().unwrap(), Position { phase: 1, item: 0 });
    assert!(!s.is_finished());
  }

  #[test]
  fn prev_crosses_back_and_stops_at_origin() {
    let mut s = EvaluationSession::new(&document(), "media-1").unwrap();
    assert_eq!(s.prev().unwrap(), Position { phase: 0, item: 0 });
    s.next().unwrap();
    s.next().unwrap();
    assert_eq!(s.prev().unwrap(), Position { phase: 0, item: 1 });
    assert_eq!(s.prev().unwrap(), Position { phase: 0, item: 0 });
    assert_eq!(s.prev().unwrap(), Position { phase: 0, item: 0 });
  }

  #[test]
  fn navigation_keeps_answers_and_feedback() {
    let mut s = EvaluationSession::new(&document(), "media-1").unwrap();
    s.record("f1", Answer::Flashcard { outcome: crate::domain::FlashcardOutcome::Correct }, verdict(true))
      .unwrap();
    s.next().unwrap();
    s.prev().unwrap();
    assert!(s.feedback.contains_key("f1"));
    assert!(s.answers.contains_key("f1"));
  }

  #[test]
  fn feedback_is_write_once() {
    let mut s = EvaluationSession::new(&document(), "media-1").unwrap();
    s.record("m1", Answer::MultipleChoice { index: 0 }, verdict(true)).unwrap();
    let again = s.record("m1", Answer::MultipleChoice { index: 1 }, verdict(false));
    assert!(matches!(again, Err(SessionError::AlreadyAnswered(_))));
    assert_eq!(s.answers["m1"], Answer::MultipleChoice { index: 0 });
  }

  #[test]
  fn finish_requires_the_last_item() {
    let mut s = EvaluationSession::new(&document(), "media-1").unwrap();
    assert!(matches!(s.finish(), Err(SessionError::FinishUnavailable)));
    s.next().unwrap();
    s.next().unwrap();
    s.record("f1", Answer::Flashcard { outcome: crate::domain::FlashcardOutcome::Correct }, verdict(true))
      .unwrap();
    let summary = s.finish().unwrap();
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.total, 3);
    assert!(s.is_finished());
  }

  #[test]
  fn finished_sessions_accept_nothing_further() {
    let mut s = EvaluationSession::new(&document(), "media-1").unwrap();
    s.next().unwrap();
    s.next().unwrap();
    s.finish().unwrap();
    assert!(matches!(s.next(), Err(SessionError::Finished)));
    assert!(matches!(s.prev(), Err(SessionError::Finished)));
    assert!(matches!(s.finish(), Err(SessionError::Finished)));
    let rec = s.record("m1", Answer::MultipleChoice { index: 0 }, verdict(true));
    assert!(matches!(rec, Err(SessionError::Finished)));
  }
}
