//! Score aggregation, run once when a session finishes.
//!
//! Items are numbered 1-based in document traversal order, continuously
//! across phase boundaries. The denominator counts every item in the
//! document, so items the learner never answered land in the incorrect set
//! and weigh against the percentage.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::document::EvaluationDoc;
use crate::domain::FeedbackRecord;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
  /// 1-based question numbers answered correctly.
  pub correct_numbers: Vec<u32>,
  /// 1-based question numbers answered incorrectly or never answered.
  pub incorrect_numbers: Vec<u32>,
  pub correct: u32,
  pub total: u32,
  /// round(100 * correct / total); 0 when total is 0.
  pub score: u32,
}

pub fn aggregate(doc: &EvaluationDoc, feedback: &HashMap<String, FeedbackRecord>) -> ScoreSummary {
  let mut correct_numbers = Vec::new();
  let mut incorrect_numbers = Vec::new();

  for (idx, item) in doc.items_in_order().iter().enumerate() {
    let number = (idx + 1) as u32;
    match feedback.get(item.id()) {
      Some(f) if f.correct => correct_numbers.push(number),
      _ => incorrect_numbers.push(number),
    }
  }

  let correct = correct_numbers.len() as u32;
  let total = (correct_numbers.len() + incorrect_numbers.len()) as u32;
  let score = if total == 0 {
    0
  } else {
    (100.0 * f64::from(correct) / f64::from(total)).round() as u32
  };

  ScoreSummary { correct_numbers, incorrect_numbers, correct, total, score }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{
    CefrLevel, FlashcardItem, Metadata, MultipleChoiceItem, Phase,
  };

  fn doc_with_three_items() -> EvaluationDoc {
    EvaluationDoc {
      metadata: Metadata {
        cefr: CefrLevel::A2,
        purpose: String::new(),
        interests: vec![],
        study_major: None,
      },
      evaluation: vec![
        Phase::Flashcard {
          items: vec![
            FlashcardItem {
              id: "f1".into(),
              prompt: "der Hund".into(),
              answer: "the dog".into(),
              prompt_en: None,
              answer_en: None,
            },
            FlashcardItem {
              id: "f2".into(),
              prompt: "die Katze".into(),
              answer: "the cat".into(),
              prompt_en: None,
              answer_en: None,
            },
          ],
        },
        Phase::MultipleChoice {
          items: vec![MultipleChoiceItem {
            id: "m1".into(),
            question: "Artikel von 'Haus'?".into(),
            options: vec!["der".into(), "die".into(), "das".into()],
            correct_index: 2,
            question_en: None,
            options_en: None,
          }],
        },
      ],
    }
  }

  fn verdict(correct: bool) -> FeedbackRecord {
    FeedbackRecord { correct, message: String::new(), model_answer: None }
  }

  #[test]
  fn numbering_is_continuous_across_phases() {
    let doc = doc_with_three_items();
    let mut feedback = HashMap::new();
    feedback.insert("f1".to_string(), verdict(true));
    feedback.insert("f2".to_string(), verdict(false));
    feedback.insert("m1".to_string(), verdict(true));

    let summary = aggregate(&doc, &feedback);
    assert_eq!(summary.correct_numbers, vec![1, 3]);
    assert_eq!(summary.incorrect_numbers, vec![2]);
    assert_eq!(summary.correct, 2);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.score, 67); // round(200/3)
  }

  #[test]
  fn unanswered_items_count_against_the_score() {
    let doc = doc_with_three_items();
    let mut feedback = HashMap::new();
    feedback.insert("f1".to_string(), verdict(true));

    let summary = aggregate(&doc, &feedback);
    assert_eq!(summary.correct_numbers, vec![1]);
    assert_eq!(summary.incorrect_numbers, vec![2, 3]);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.score, 33);
  }

  #[test]
  fn empty_document_scores_zero() {
    let doc = EvaluationDoc {
      metadata: Metadata {
        cefr: CefrLevel::A1,
        purpose: String::new(),
        interests: vec![],
        study_major: None,
      },
      evaluation: vec![],
    };
    let summary = aggregate(&doc, &HashMap::new());
    assert_eq!(summary.total, 0);
    assert_eq!(summary.score, 0);
  }
}
