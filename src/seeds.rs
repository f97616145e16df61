//! Seed data: a built-in demo evaluation document so the app is useful even
//! without external config or OpenAI, plus the generation fallback.

use uuid::Uuid;

use crate::document::{DocumentSource, EvaluationDoc, EvaluationDocument};
use crate::domain::{
  CefrLevel, FillBlankItem, FlashcardItem, Metadata, MultipleChoiceItem, Phase, ShortAnswerItem,
};

/// Built-in demo document for a fictional article about everyday routines.
pub fn seed_documents() -> Vec<EvaluationDocument> {
  vec![EvaluationDocument {
    id: "seed-eval-001".into(),
    media_id: "demo-article-001".into(),
    personalization_id: "demo-user".into(),
    generated: true,
    source: DocumentSource::Seed,
    doc: seed_doc(Metadata {
      cefr: CefrLevel::B1,
      purpose: "Alltagsdeutsch".into(),
      interests: vec!["Reisen".into(), "Essen".into()],
      study_major: None,
    }),
  }]
}

/// Absolute last-resort generation fallback: the seed phases stamped with
/// the requested learner profile.
pub fn fallback_document(
  media_id: &str,
  personalization_id: &str,
  meta: Metadata,
) -> EvaluationDocument {
  EvaluationDocument {
    id: Uuid::new_v4().to_string(),
    media_id: media_id.to_string(),
    personalization_id: personalization_id.to_string(),
    generated: true,
    source: DocumentSource::Seed,
    doc: seed_doc(meta),
  }
}

fn seed_doc(metadata: Metadata) -> EvaluationDoc {
  EvaluationDoc {
    metadata,
    evaluation: vec![
      Phase::Flashcard {
        items: vec![
          FlashcardItem {
            id: "fc1".into(),
            prompt: "der Bahnhof".into(),
            answer: "the train station".into(),
            prompt_en: None,
            answer_en: None,
          },
          FlashcardItem {
            id: "fc2".into(),
            prompt: "einkaufen".into(),
            answer: "to go shopping".into(),
            prompt_en: None,
            answer_en: None,
          },
        ],
      },
      Phase::MultipleChoice {
        items: vec![
          MultipleChoiceItem {
            id: "mc1".into(),
            question: "Welcher Artikel passt: ___ Wetter?".into(),
            options: vec!["der".into(), "die".into(), "das".into()],
            correct_index: 2,
            question_en: Some("Which article fits: ___ weather?".into()),
            options_en: None,
          },
          MultipleChoiceItem {
            id: "mc2".into(),
            question: "Was ist das Gegenteil von 'früh'?".into(),
            options: vec!["spät".into(), "schnell".into(), "oft".into()],
            correct_index: 0,
            question_en: Some("What is the opposite of 'early'?".into()),
            options_en: None,
          },
        ],
      },
      Phase::FillBlank {
        items: vec![
          FillBlankItem {
            id: "fb1".into(),
            sentence: "Ich ____ jeden Morgen Kaffee.".into(),
            options: vec!["trinke".into(), "trinkst".into(), "trinkt".into()],
            correct_indices: vec![0],
            sentence_en: Some("I drink coffee every morning.".into()),
          },
          FillBlankItem {
            id: "fb2".into(),
            sentence: "Am Wochenende __[1]__ wir oft __[2]__ den Park.".into(),
            options: vec!["gehen".into(), "in".into(), "geht".into(), "auf".into()],
            correct_indices: vec![0, 1],
            sentence_en: Some("On weekends we often go to the park.".into()),
          },
        ],
      },
      Phase::ShortAnswer {
        items: vec![ShortAnswerItem {
          id: "sa1".into(),
          question: "Was machst du normalerweise am Morgen?".into(),
          model_answer: "Ich stehe auf, frühstücke und fahre zur Arbeit.".into(),
          question_en: Some("What do you usually do in the morning?".into()),
          model_answer_en: Some("I get up, have breakfast and go to work.".into()),
        }],
      },
    ],
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn seed_documents_are_structurally_valid() {
    for d in seed_documents() {
      d.doc.validate().expect("seed document must validate");
    }
  }

  #[test]
  fn fallback_carries_the_requested_profile() {
    let meta = Metadata {
      cefr: CefrLevel::A1,
      purpose: "Uni".into(),
      interests: vec![],
      study_major: Some("Informatik".into()),
    };
    let d = fallback_document("m9", "p9", meta);
    assert_eq!(d.media_id, "m9");
    assert_eq!(d.doc.metadata.cefr, CefrLevel::A1);
    assert!(d.generated);
    d.doc.validate().unwrap();
  }
}
