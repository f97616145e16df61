//! Domain models: CEFR levels, quiz phases and items, answers, and feedback.
//!
//! The evaluation payload is an ordered sequence of phases; each phase carries
//! one interaction pattern (flashcard, multiple choice, fill-in-the-blank,
//! short answer) and an ordered list of items. Item ids are unique within a
//! document. Optional `*_en` fields are parallel English translations shown
//! on demand by the client; they carry no behavioral weight here.

use serde::{Deserialize, Serialize};

/// Learner proficiency tier (CEFR A1–C2). Parsed case-insensitively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CefrLevel {
  A1,
  A2,
  B1,
  B2,
  C1,
  C2,
}

impl CefrLevel {
  /// Flashcard presentation timer in seconds: beginners get more time to
  /// flip the card before the item auto-resolves to "incorrect".
  pub fn flashcard_timer_secs(self) -> u64 {
    match self {
      CefrLevel::A1 => 40,
      CefrLevel::A2 => 35,
      CefrLevel::B1 => 30,
      CefrLevel::B2 => 25,
      CefrLevel::C1 => 20,
      CefrLevel::C2 => 15,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      CefrLevel::A1 => "A1",
      CefrLevel::A2 => "A2",
      CefrLevel::B1 => "B1",
      CefrLevel::B2 => "B2",
      CefrLevel::C1 => "C1",
      CefrLevel::C2 => "C2",
    }
  }
}

impl TryFrom<String> for CefrLevel {
  type Error = String;
  fn try_from(s: String) -> Result<Self, Self::Error> {
    match s.trim().to_ascii_uppercase().as_str() {
      "A1" => Ok(CefrLevel::A1),
      "A2" => Ok(CefrLevel::A2),
      "B1" => Ok(CefrLevel::B1),
      "B2" => Ok(CefrLevel::B2),
      "C1" => Ok(CefrLevel::C1),
      "C2" => Ok(CefrLevel::C2),
      other => Err(format!("unknown CEFR level: {}", other)),
    }
  }
}

impl From<CefrLevel> for String {
  fn from(l: CefrLevel) -> String {
    l.as_str().to_string()
  }
}

impl std::fmt::Display for CefrLevel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Personalization metadata attached to every evaluation document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
  pub cefr: CefrLevel,
  #[serde(default)]
  pub purpose: String,
  #[serde(default)]
  pub interests: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub study_major: Option<String>,
}

/// Phase tag, also used in wire payloads and error messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
  Flashcard,
  MultipleChoice,
  FillBlank,
  ShortAnswer,
}

impl std::fmt::Display for PhaseKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      PhaseKind::Flashcard => "flashcard",
      PhaseKind::MultipleChoice => "multiple_choice",
      PhaseKind::FillBlank => "fill_blank",
      PhaseKind::ShortAnswer => "short_answer",
    };
    f.write_str(s)
  }
}

/// One themed group of items sharing a single interaction pattern.
/// Phases are presented strictly in sequence, never skipped or reordered.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
  Flashcard { items: Vec<FlashcardItem> },
  MultipleChoice { items: Vec<MultipleChoiceItem> },
  FillBlank { items: Vec<FillBlankItem> },
  ShortAnswer { items: Vec<ShortAnswerItem> },
}

impl Phase {
  pub fn kind(&self) -> PhaseKind {
    match self {
      Phase::Flashcard { .. } => PhaseKind::Flashcard,
      Phase::MultipleChoice { .. } => PhaseKind::MultipleChoice,
      Phase::FillBlank { .. } => PhaseKind::FillBlank,
      Phase::ShortAnswer { .. } => PhaseKind::ShortAnswer,
    }
  }

  pub fn len(&self) -> usize {
    match self {
      Phase::Flashcard { items } => items.len(),
      Phase::MultipleChoice { items } => items.len(),
      Phase::FillBlank { items } => items.len(),
      Phase::ShortAnswer { items } => items.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Items in presentation order, erased to `ItemRef`.
  pub fn item_refs(&self) -> Vec<ItemRef<'_>> {
    match self {
      Phase::Flashcard { items } => items.iter().map(ItemRef::Flashcard).collect(),
      Phase::MultipleChoice { items } => items.iter().map(ItemRef::MultipleChoice).collect(),
      Phase::FillBlank { items } => items.iter().map(ItemRef::FillBlank).collect(),
      Phase::ShortAnswer { items } => items.iter().map(ItemRef::ShortAnswer).collect(),
    }
  }
}

/// Borrowed view over any item kind, used by the walker and the aggregator.
#[derive(Clone, Copy, Debug)]
pub enum ItemRef<'a> {
  Flashcard(&'a FlashcardItem),
  MultipleChoice(&'a MultipleChoiceItem),
  FillBlank(&'a FillBlankItem),
  ShortAnswer(&'a ShortAnswerItem),
}

impl<'a> ItemRef<'a> {
  pub fn id(&self) -> &'a str {
    match self {
      ItemRef::Flashcard(i) => &i.id,
      ItemRef::MultipleChoice(i) => &i.id,
      ItemRef::FillBlank(i) => &i.id,
      ItemRef::ShortAnswer(i) => &i.id,
    }
  }

  pub fn kind(&self) -> PhaseKind {
    match self {
      ItemRef::Flashcard(_) => PhaseKind::Flashcard,
      ItemRef::MultipleChoice(_) => PhaseKind::MultipleChoice,
      ItemRef::FillBlank(_) => PhaseKind::FillBlank,
      ItemRef::ShortAnswer(_) => PhaseKind::ShortAnswer,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardItem {
  pub id: String,
  pub prompt: String,
  /// Fixed model answer shown when the card is flipped.
  pub answer: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub prompt_en: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub answer_en: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoiceItem {
  pub id: String,
  pub question: String,
  pub options: Vec<String>,
  pub correct_index: usize,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub question_en: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options_en: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillBlankItem {
  pub id: String,
  /// Sentence template with blank markers: a bare `____` for a single blank
  /// or numbered `__[<n>]__` tokens for several.
  pub sentence: String,
  /// Draggable options shared by all blanks of the item.
  pub options: Vec<String>,
  /// Designated correct option index per blank, in blank order.
  pub correct_indices: Vec<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sentence_en: Option<String>,
}

impl FillBlankItem {
  /// Blank count derives primarily from the markers in the template,
  /// falling back to the number of correct-index entries when the
  /// template carries no recognizable markers.
  pub fn blank_count(&self) -> usize {
    let counted = count_blank_markers(&self.sentence);
    if counted > 0 { counted } else { self.correct_indices.len() }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortAnswerItem {
  pub id: String,
  pub question: String,
  /// Model answer used for semantic comparison by the remote judge
  /// (and for the local exact-match fallback).
  pub model_answer: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub question_en: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model_answer_en: Option<String>,
}

/// Count blank markers in a fill-blank template.
/// Numbered `__[<n>]__` tokens take precedence; otherwise each run of three
/// or more underscores counts as one bare blank.
pub fn count_blank_markers(template: &str) -> usize {
  let numbered = count_numbered_markers(template);
  if numbered > 0 {
    return numbered;
  }
  let mut count = 0;
  let mut run = 0;
  for ch in template.chars() {
    if ch == '_' {
      run += 1;
    } else {
      if run >= 3 {
        count += 1;
      }
      run = 0;
    }
  }
  if run >= 3 {
    count += 1;
  }
  count
}

fn count_numbered_markers(template: &str) -> usize {
  let mut count = 0;
  let mut rest = template;
  while let Some(start) = rest.find("__[") {
    let tail = &rest[start + 3..];
    match tail.find("]__") {
      Some(end) if !tail[..end].is_empty() && tail[..end].chars().all(|c| c.is_ascii_digit()) => {
        count += 1;
        rest = &tail[end + 3..];
      }
      Some(end) => rest = &tail[end + 3..],
      None => break,
    }
  }
  count
}

/// Learner self-report for a flashcard. `TimedOut` is sent when the
/// presentation timer elapsed before the card was flipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashcardOutcome {
  Correct,
  Incorrect,
  TimedOut,
}

/// A submitted answer, discriminated by the item kind it targets.
/// For fill-blank items, `None` entries are the explicit "unfilled" marker;
/// an item the learner never visited is simply absent from the answer map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Answer {
  Flashcard { outcome: FlashcardOutcome },
  MultipleChoice { index: usize },
  FillBlank { blanks: Vec<Option<String>> },
  ShortAnswer { text: String },
}

/// The persisted verdict for one answered item. Write-once: an item never
/// gets a second feedback record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
  pub correct: bool,
  pub message: String,
  /// Model-answer text, populated for short-answer items only.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model_answer: Option<String>,
}
