//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Starting sessions on stored documents
//!   - Evaluating answers per item kind (short answers via the remote judge,
//!     with a local comparison fallback)
//!   - Walking next/prev and finishing with the aggregated score
//!
//! Answer checking for multiple-choice, fill-blank and flashcard items is
//! pure and local; only short answers suspend on the network.

use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::domain::{
  Answer, FeedbackRecord, FillBlankItem, FlashcardItem, FlashcardOutcome, ItemRef,
  MultipleChoiceItem,
};
use crate::error::{ApiError, SessionError};
use crate::protocol::{position_out, session_out, FinishOut, PositionOut, SessionOut};
use crate::state::{AppState, ResultsRecord};
use crate::util::normalize_answer;

/// Outcome of the lock-free local check: either a final verdict or the data
/// the remote judge needs.
enum Checked {
  Ready(FeedbackRecord),
  NeedsJudgment {
    question: String,
    model_answer: String,
    question_en: Option<String>,
    model_answer_en: Option<String>,
    text: String,
  },
}

/// Start a session for the stored (media, personalization) document.
/// 404s as "not ready" when no document exists yet.
#[instrument(level = "info", skip(state), fields(%media_id, %personalization_id))]
pub async fn start_session(
  state: &AppState,
  media_id: &str,
  personalization_id: &str,
) -> Result<SessionOut, ApiError> {
  let document = state
    .get_document(media_id, Some(personalization_id))
    .await
    .ok_or(ApiError::NotReady)?;
  let session_id = state.create_session(&document, media_id).await?;

  let sessions = state.sessions.read().await;
  let s = sessions
    .get(&session_id)
    .ok_or(SessionError::UnknownSession(session_id))?;
  info!(target: "evaluation", %session_id, evaluation_id = %s.evaluation_id, "Session started");
  session_out(s).ok_or_else(|| ApiError::Session(SessionError::Finished))
}

/// Evaluate one submitted answer and persist exactly one feedback record.
/// Items are immutable once answered.
#[instrument(level = "info", skip(state, answer), fields(%session_id, %item_id))]
pub async fn evaluate_answer(
  state: &AppState,
  session_id: Uuid,
  item_id: &str,
  answer: Answer,
) -> Result<FeedbackRecord, ApiError> {
  let checked = {
    let sessions = state.sessions.read().await;
    let s = sessions
      .get(&session_id)
      .ok_or(SessionError::UnknownSession(session_id))?;
    s.position()?;
    if s.feedback.contains_key(item_id) {
      return Err(SessionError::AlreadyAnswered(item_id.to_string()).into());
    }
    let item = s
      .doc
      .find_item(item_id)
      .ok_or_else(|| SessionError::UnknownItem(item_id.to_string()))?;
    check_local(item, &answer)?
  };

  let record = match checked {
    Checked::Ready(record) => record,
    Checked::NeedsJudgment { question, model_answer, question_en, model_answer_en, text } => {
      // Judged without holding the session lock.
      let (correct, message, model) = judge_short_answer(
        state,
        &question,
        &text,
        &model_answer,
        question_en.as_deref(),
        model_answer_en.as_deref(),
      )
      .await;
      FeedbackRecord { correct, message, model_answer: model }
    }
  };

  let mut sessions = state.sessions.write().await;
  let s = sessions
    .get_mut(&session_id)
    .ok_or(SessionError::UnknownSession(session_id))?;
  s.record(item_id, answer, record.clone())?;
  info!(target: "evaluation", %session_id, %item_id, correct = record.correct, "Answer evaluated");
  Ok(record)
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn next_item(state: &AppState, session_id: Uuid) -> Result<PositionOut, ApiError> {
  advance(state, session_id, true).await
}

#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn prev_item(state: &AppState, session_id: Uuid) -> Result<PositionOut, ApiError> {
  advance(state, session_id, false).await
}

async fn advance(state: &AppState, session_id: Uuid, forward: bool) -> Result<PositionOut, ApiError> {
  let mut sessions = state.sessions.write().await;
  let s = sessions
    .get_mut(&session_id)
    .ok_or(SessionError::UnknownSession(session_id))?;
  if forward {
    s.next()?;
  } else {
    s.prev()?;
  }
  position_out(s).ok_or_else(|| ApiError::Session(SessionError::Finished))
}

/// Finish the session, record the result, and return the summary. Recording
/// is fire-and-forget relative to the caller: the summary is returned even
/// if recording ever failed.
#[instrument(level = "info", skip(state), fields(%session_id))]
pub async fn finish_session(state: &AppState, session_id: Uuid) -> Result<FinishOut, ApiError> {
  let (out, rec) = {
    let mut sessions = state.sessions.write().await;
    let s = sessions
      .get_mut(&session_id)
      .ok_or(SessionError::UnknownSession(session_id))?;
    let summary = s.finish()?;
    let out = FinishOut {
      evaluation_id: s.evaluation_id.clone(),
      personalization_id: s.personalization_id.clone(),
      results: summary.clone(),
    };
    let rec = ResultsRecord {
      evaluation_id: s.evaluation_id.clone(),
      personalization_id: s.personalization_id.clone(),
      correct_numbers: summary.correct_numbers,
      incorrect_numbers: summary.incorrect_numbers,
      score: summary.score,
    };
    (out, rec)
  };
  state.record_results(rec).await;
  Ok(out)
}

/// Judge one short answer: remote when OpenAI is configured, local
/// comparison otherwise or on any remote failure.
#[instrument(level = "info", skip_all, fields(answer_len = answer.len()))]
pub async fn judge_short_answer(
  state: &AppState,
  question: &str,
  answer: &str,
  model_answer: &str,
  question_en: Option<&str>,
  model_answer_en: Option<&str>,
) -> (bool, String, Option<String>) {
  if let Some(oa) = &state.openai {
    match oa
      .judge_short_answer(&state.prompts, question, answer, model_answer, question_en, model_answer_en)
      .await
    {
      Ok(j) => {
        return (j.correct, j.message, j.model_answer.or_else(|| Some(model_answer.to_string())));
      }
      Err(e) => {
        error!(target: "evaluation", error = %e, "OpenAI judge failed; using local comparison.");
      }
    }
  }
  short_answer_fallback(model_answer, answer)
}

// -------- Local checks & fallbacks --------

fn check_local(item: ItemRef<'_>, answer: &Answer) -> Result<Checked, SessionError> {
  match (item, answer) {
    (ItemRef::MultipleChoice(i), Answer::MultipleChoice { index }) => {
      Ok(Checked::Ready(check_multiple_choice(i, *index)))
    }
    (ItemRef::FillBlank(i), Answer::FillBlank { blanks }) => {
      Ok(Checked::Ready(check_fill_blank(i, blanks)?))
    }
    (ItemRef::Flashcard(i), Answer::Flashcard { outcome }) => {
      Ok(Checked::Ready(check_flashcard(i, *outcome)))
    }
    (ItemRef::ShortAnswer(i), Answer::ShortAnswer { text }) => Ok(Checked::NeedsJudgment {
      question: i.question.clone(),
      model_answer: i.model_answer.clone(),
      question_en: i.question_en.clone(),
      model_answer_en: i.model_answer_en.clone(),
      text: text.clone(),
    }),
    (item, _) => Err(SessionError::KindMismatch {
      item: item.id().to_string(),
      expected: item.kind(),
    }),
  }
}

pub fn check_multiple_choice(item: &MultipleChoiceItem, index: usize) -> FeedbackRecord {
  let correct = index == item.correct_index;
  let message = if correct {
    "Richtig!".to_string()
  } else {
    match item.options.get(item.correct_index) {
      Some(opt) => format!("Not quite. The correct answer is \"{}\".", opt),
      None => "Not quite.".to_string(),
    }
  };
  FeedbackRecord { correct, message, model_answer: None }
}

/// Fill-blank items are only evaluated once every blank holds a non-empty
/// value; partial answers never produce feedback. Correctness is a single
/// boolean for the whole item.
pub fn check_fill_blank(
  item: &FillBlankItem,
  blanks: &[Option<String>],
) -> Result<FeedbackRecord, SessionError> {
  let blank_count = item.blank_count();
  let all_filled = blanks.len() == blank_count
    && blanks.iter().all(|b| b.as_ref().is_some_and(|s| !s.trim().is_empty()));
  if !all_filled {
    return Err(SessionError::IncompleteAnswer);
  }

  let mut all_match = true;
  let mut expected = Vec::with_capacity(blank_count);
  for (i, submitted) in blanks.iter().enumerate() {
    match item.correct_indices.get(i).and_then(|&ci| item.options.get(ci)) {
      Some(want) => {
        if submitted.as_deref() != Some(want.as_str()) {
          all_match = false;
        }
        expected.push(want.clone());
      }
      // Item data is missing a designated option for this blank; the item
      // cannot be answered correctly.
      None => all_match = false,
    }
  }

  let message = if all_match {
    "Richtig! Every blank matches.".to_string()
  } else {
    format!("Not quite. Expected: {}.", expected.join(", "))
  };
  Ok(FeedbackRecord { correct: all_match, message, model_answer: None })
}

pub fn check_flashcard(item: &FlashcardItem, outcome: FlashcardOutcome) -> FeedbackRecord {
  match outcome {
    FlashcardOutcome::Correct => FeedbackRecord {
      correct: true,
      message: "Marked as known.".to_string(),
      model_answer: None,
    },
    FlashcardOutcome::Incorrect => FeedbackRecord {
      correct: false,
      message: format!("Marked as not known. The answer was \"{}\".", item.answer),
      model_answer: None,
    },
    FlashcardOutcome::TimedOut => FeedbackRecord {
      correct: false,
      message: format!("Time ran out before the card was flipped. The answer was \"{}\".", item.answer),
      model_answer: None,
    },
  }
}

/// Local judgment fallback: trimmed, case-folded comparison against the
/// model answer plus a generic message.
pub fn short_answer_fallback(model_answer: &str, text: &str) -> (bool, String, Option<String>) {
  let correct = normalize_answer(text) == normalize_answer(model_answer);
  let message = if correct {
    "Your answer matches the model answer.".to_string()
  } else {
    "We could not verify your answer automatically. Compare it with the model answer.".to_string()
  };
  (correct, message, Some(model_answer.to_string()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::ShortAnswerItem;

  fn fill_blank_item() -> FillBlankItem {
    FillBlankItem {
      id: "fb1".into(),
      sentence: "Ich ___ nach Hause".into(),
      options: vec!["gehe".into(), "gehst".into(), "geht".into()],
      correct_indices: vec![0],
      sentence_en: None,
    }
  }

  #[test]
  fn multiple_choice_matches_designated_index() {
    let item = MultipleChoiceItem {
      id: "m1".into(),
      question: "Artikel von 'Auto'?".into(),
      options: vec!["der".into(), "die".into(), "das".into()],
      correct_index: 2,
      question_en: None,
      options_en: None,
    };
    assert!(check_multiple_choice(&item, 2).correct);
    let wrong = check_multiple_choice(&item, 0);
    assert!(!wrong.correct);
    assert!(wrong.message.contains("das"));
  }

  #[test]
  fn single_blank_wrong_option_names_the_right_one() {
    let item = fill_blank_item();
    let record = check_fill_blank(&item, &[Some("gehst".into())]).unwrap();
    assert!(!record.correct);
    assert!(record.message.contains("gehe"));
  }

  #[test]
  fn single_blank_right_option_passes() {
    let item = fill_blank_item();
    let record = check_fill_blank(&item, &[Some("gehe".into())]).unwrap();
    assert!(record.correct);
  }

  #[test]
  fn partial_blanks_never_produce_feedback() {
    let item = FillBlankItem {
      id: "fb2".into(),
      sentence: "Wir __[1]__ morgen __[2]__ Berlin.".into(),
      options: vec!["fahren".into(), "nach".into(), "fährt".into()],
      correct_indices: vec![0, 1],
      sentence_en: None,
    };
    assert!(matches!(
      check_fill_blank(&item, &[Some("fahren".into()), None]),
      Err(SessionError::IncompleteAnswer)
    ));
    assert!(matches!(
      check_fill_blank(&item, &[Some("fahren".into())]),
      Err(SessionError::IncompleteAnswer)
    ));
    assert!(matches!(
      check_fill_blank(&item, &[Some("fahren".into()), Some("  ".into())]),
      Err(SessionError::IncompleteAnswer)
    ));

    let full = check_fill_blank(&item, &[Some("fahren".into()), Some("nach".into())]).unwrap();
    assert!(full.correct);
  }

  #[test]
  fn multi_blank_requires_every_blank_to_match() {
    let item = FillBlankItem {
      id: "fb3".into(),
      sentence: "Er __[1]__ gern __[2]__.".into(),
      options: vec!["liest".into(), "Bücher".into(), "lese".into()],
      correct_indices: vec![0, 1],
      sentence_en: None,
    };
    let record = check_fill_blank(&item, &[Some("liest".into()), Some("lese".into())]).unwrap();
    assert!(!record.correct);
  }

  #[test]
  fn flashcard_timeout_resolves_to_incorrect() {
    let item = FlashcardItem {
      id: "f1".into(),
      prompt: "die Antwort".into(),
      answer: "the answer".into(),
      prompt_en: None,
      answer_en: None,
    };
    let record = check_flashcard(&item, FlashcardOutcome::TimedOut);
    assert!(!record.correct);
    assert!(record.message.contains("the answer"));
    assert!(check_flashcard(&item, FlashcardOutcome::Correct).correct);
  }

  #[test]
  fn fallback_compares_case_folded_text() {
    let (ok, _, model) = short_answer_fallback("Ich wohne in Berlin.", "  ich WOHNE in berlin. ");
    assert!(ok);
    assert_eq!(model.as_deref(), Some("Ich wohne in Berlin."));
    let (bad, msg, _) = short_answer_fallback("Ich wohne in Berlin.", "Ich wohne in Hamburg.");
    assert!(!bad);
    assert!(!msg.is_empty());
  }

  #[test]
  fn kind_mismatch_is_rejected() {
    let item = ShortAnswerItem {
      id: "s1".into(),
      question: "Wo wohnst du?".into(),
      model_answer: "In Berlin.".into(),
      question_en: None,
      model_answer_en: None,
    };
    let res = check_local(ItemRef::ShortAnswer(&item), &Answer::MultipleChoice { index: 0 });
    assert!(matches!(res, Err(SessionError::KindMismatch { .. })));
  }

  #[tokio::test]
  async fn short_answer_falls_back_without_remote() {
    let state = AppState::from_config(None, None);
    let document = state
      .get_document("demo-article-001", Some("demo-user"))
      .await
      .expect("seed document");
    let session_id = state.create_session(&document, "demo-article-001").await.unwrap();

    let record = evaluate_answer(
      &state,
      session_id,
      "sa1",
      Answer::ShortAnswer { text: "ICH STEHE AUF, FRÜHSTÜCKE UND FAHRE ZUR ARBEIT.".into() },
    )
    .await
    .unwrap();
    assert!(record.correct);
    assert!(record.model_answer.is_some());

    // Items are immutable once answered.
    let again = evaluate_answer(
      &state,
      session_id,
      "sa1",
      Answer::ShortAnswer { text: "etwas anderes".into() },
    )
    .await;
    assert!(matches!(
      again,
      Err(ApiError::Session(SessionError::AlreadyAnswered(_)))
    ));
  }

  #[tokio::test]
  async fn full_session_walk_and_finish() {
    let state = AppState::from_config(None, None);
    let document = state
      .get_document("demo-article-001", Some("demo-user"))
      .await
      .unwrap();
    let session_id = state.create_session(&document, "demo-article-001").await.unwrap();
    let total = document.doc.total_items();

    // Answer the two multiple-choice items, leave the rest unanswered.
    evaluate_answer(&state, session_id, "mc1", Answer::MultipleChoice { index: 2 })
      .await
      .unwrap();
    evaluate_answer(&state, session_id, "mc2", Answer::MultipleChoice { index: 1 })
      .await
      .unwrap();

    // Finishing mid-document is rejected.
    assert!(matches!(
      finish_session(&state, session_id).await,
      Err(ApiError::Session(SessionError::FinishUnavailable))
    ));

    // Walk to the last item, then finish.
    for _ in 0..total {
      next_item(&state, session_id).await.unwrap();
    }
    let out = finish_session(&state, session_id).await.unwrap();
    assert_eq!(out.results.total as usize, total);
    assert_eq!(out.results.correct, 1);
    assert!(out.results.incorrect_numbers.len() as u32 == out.results.total - 1);

    // The result was recorded.
    assert_eq!(state.results.read().await.len(), 1);

    // The terminal state refuses further navigation.
    assert!(matches!(
      next_item(&state, session_id).await,
      Err(ApiError::Session(SessionError::Finished))
    ));
  }
}
