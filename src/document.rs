//! Evaluation documents and their wire payload.
//!
//! The payload travels as JSON that is sometimes double-encoded (a JSON
//! string holding JSON). We model that explicitly as `EvaluationData` and
//! resolve it exactly once at the API boundary; everything past the boundary
//! works with a plain `EvaluationDoc`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::{ItemRef, Metadata, Phase};
use crate::error::DocumentError;

/// Where a stored document came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
  /// From the user-provided TOML bank.
  LocalBank,
  /// Generated via OpenAI and cached in memory.
  Generated,
  /// Built-in seed (last resort).
  Seed,
}

/// Wire payload: either an already-parsed structure or a serialized string.
/// `Parsed` must come first so objects never fall through to `Raw`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvaluationData {
  Parsed(EvaluationDoc),
  Raw(String),
}

impl EvaluationData {
  /// Resolve to the parsed form. The only place double-encoding is handled.
  pub fn resolve(self) -> Result<EvaluationDoc, DocumentError> {
    match self {
      EvaluationData::Parsed(doc) => Ok(doc),
      EvaluationData::Raw(s) => {
        serde_json::from_str(&s).map_err(|e| DocumentError::Malformed(e.to_string()))
      }
    }
  }
}

/// The resolved evaluation payload: personalization metadata plus the
/// ordered phase sequence.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationDoc {
  pub metadata: Metadata,
  pub evaluation: Vec<Phase>,
}

impl EvaluationDoc {
  /// Structural validation: at least one phase, no empty phase, unique ids.
  pub fn validate(&self) -> Result<(), DocumentError> {
    if self.evaluation.is_empty() {
      return Err(DocumentError::EmptyPhases);
    }
    let mut seen = HashSet::new();
    for phase in &self.evaluation {
      if phase.is_empty() {
        return Err(DocumentError::EmptyItems { kind: phase.kind() });
      }
      for item in phase.item_refs() {
        if !seen.insert(item.id().to_string()) {
          return Err(DocumentError::DuplicateItemId(item.id().to_string()));
        }
      }
    }
    Ok(())
  }

  /// Items in document traversal order, across phase boundaries.
  pub fn items_in_order(&self) -> Vec<ItemRef<'_>> {
    self.evaluation.iter().flat_map(|p| p.item_refs()).collect()
  }

  pub fn total_items(&self) -> usize {
    self.evaluation.iter().map(|p| p.len()).sum()
  }

  pub fn find_item(&self, item_id: &str) -> Option<ItemRef<'_>> {
    self.items_in_order().into_iter().find(|i| i.id() == item_id)
  }
}

/// One stored evaluation document, resolved and keyed by its owning media
/// and personalization ids.
#[derive(Clone, Debug)]
pub struct EvaluationDocument {
  pub id: String,
  pub media_id: String,
  pub personalization_id: String,
  pub generated: bool,
  pub source: DocumentSource,
  pub doc: EvaluationDoc,
}

impl EvaluationDocument {
  /// Defensive check against stale/cross-session data: the stored document
  /// must belong to the media the caller asked for, and must be structurally
  /// sound before a session is built on it.
  pub fn validate_for(&self, media_id: &str) -> Result<(), DocumentError> {
    if self.media_id != media_id {
      return Err(DocumentError::MediaMismatch {
        requested: media_id.to_string(),
        found: self.media_id.clone(),
      });
    }
    self.doc.validate()
  }
}
