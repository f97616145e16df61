//! Application state: in-memory stores, prompts, OpenAI client, and the
//! document generation policy.
//!
//! This module owns:
//!   - the evaluation document store (keyed by media + personalization)
//!   - the live evaluation sessions
//!   - the recorded final results
//!   - the prompts struct (from TOML or defaults)
//!   - optional OpenAI client
//!
//! Generation prefers a fresh OpenAI document. If OpenAI is unavailable we
//! serve an already-stored document for the key, or the built-in seed
//! fallback as a last resort.

use std::{collections::HashMap, sync::Arc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::{load_trainer_config_from_env, Prompts, TrainerConfig};
use crate::document::{DocumentSource, EvaluationDocument};
use crate::domain::Metadata;
use crate::openai::OpenAI;
use crate::seeds::{fallback_document, seed_documents};
use crate::session::EvaluationSession;

/// Documents are stored per (media, personalization) pair.
pub type DocKey = (String, String);

/// One recorded final result, as submitted on completion.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsRecord {
    pub evaluation_id: String,
    pub personalization_id: String,
    pub correct_numbers: Vec<u32>,
    pub incorrect_numbers: Vec<u32>,
    pub score: u32,
}

#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<RwLock<HashMap<DocKey, EvaluationDocument>>>,
    pub sessions: Arc<RwLock<HashMap<Uuid, EvaluationSession>>>,
    pub results: Arc<RwLock<Vec<ResultsRecord>>>,
    pub openai: Option<OpenAI>,
    pub prompts: Prompts,
}

impl AppState {
    /// Build state from env: load config, seed documents, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        Self::from_config(load_trainer_config_from_env(), OpenAI::from_env())
    }

    /// Env-free constructor, also used by tests.
    pub fn from_config(cfg_opt: Option<TrainerConfig>, openai: Option<OpenAI>) -> Self {
        let prompts = cfg_opt
            .as_ref()
            .map(|c| c.prompts.clone())
            .unwrap_or_default();

        let mut store = HashMap::<DocKey, EvaluationDocument>::new();

        // Insert config-based documents (if any). Payloads resolve here, at
        // the boundary; a bank entry that fails to resolve is skipped.
        if let Some(cfg) = &cfg_opt {
            for entry in &cfg.evaluations {
                let id = entry.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
                let media_id = entry.media_id.clone();
                let personalization_id =
                    entry.personalization_id.clone().unwrap_or_default();

                let doc = match entry.data.clone().resolve().and_then(|d| {
                    d.validate()?;
                    Ok(d)
                }) {
                    Ok(d) => d,
                    Err(e) => {
                        error!(target: "evaluation", %id, %media_id, error = %e, "Skipping bank entry: invalid payload.");
                        continue;
                    }
                };

                store.insert(
                    (media_id.clone(), personalization_id.clone()),
                    EvaluationDocument {
                        id,
                        media_id,
                        personalization_id,
                        generated: true,
                        source: DocumentSource::LocalBank,
                        doc,
                    },
                );
            }
        }

        // Always insert built-in seeds, but don't overwrite existing keys.
        for d in seed_documents() {
            store
                .entry((d.media_id.clone(), d.personalization_id.clone()))
                .or_insert(d);
        }

        // Inventory summary by source.
        let (mut bank, mut gen, mut seed) = (0usize, 0usize, 0usize);
        for d in store.values() {
            match d.source {
                DocumentSource::LocalBank => bank += 1,
                DocumentSource::Generated => gen += 1,
                DocumentSource::Seed => seed += 1,
            }
        }
        info!(target: "evaluation", local_bank = bank, generated = gen, seed = seed, "Startup document inventory");

        if let Some(oa) = &openai {
            info!(target: "lernquiz_backend", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, "OpenAI enabled.");
        } else {
            info!(target: "lernquiz_backend", "OpenAI disabled (no OPENAI_API_KEY). Using local/seed logic.");
        }

        Self {
            documents: Arc::new(RwLock::new(store)),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            results: Arc::new(RwLock::new(Vec::new())),
            openai,
            prompts,
        }
    }

    #[instrument(level = "debug", skip(self, d), fields(id = %d.id, media = %d.media_id))]
    pub async fn insert_document(&self, d: EvaluationDocument) {
        let mut docs = self.documents.write().await;
        docs.insert((d.media_id.clone(), d.personalization_id.clone()), d);
    }

    /// Lookup by media id, optionally scoped by personalization id. Without
    /// a personalization id, any document for the media matches.
    #[instrument(level = "debug", skip(self), fields(%media_id))]
    pub async fn get_document(
        &self,
        media_id: &str,
        personalization_id: Option<&str>,
    ) -> Option<EvaluationDocument> {
        let docs = self.documents.read().await;
        match personalization_id {
            Some(pid) => docs.get(&(media_id.to_string(), pid.to_string())).cloned(),
            None => docs
                .values()
                .find(|d| d.media_id == media_id)
                .cloned(),
        }
    }

    /// Generation policy:
    /// Generate a fresh document via OpenAI when available. Otherwise serve
    /// an already-stored document for the key, then the seed fallback.
    #[instrument(level = "info", skip(self, meta), fields(%media_id, %personalization_id, cefr = %meta.cefr))]
    pub async fn generate_document(
        &self,
        media_id: &str,
        personalization_id: &str,
        meta: Metadata,
    ) -> (EvaluationDocument, &'static str) {
        if let Some(oa) = &self.openai {
            match oa.generate_evaluation(&self.prompts, &meta).await {
                Ok(doc) => {
                    let d = EvaluationDocument {
                        id: Uuid::new_v4().to_string(),
                        media_id: media_id.to_string(),
                        personalization_id: personalization_id.to_string(),
                        generated: true,
                        source: DocumentSource::Generated,
                        doc,
                    };
                    self.insert_document(d.clone()).await;
                    info!(target: "evaluation", id = %d.id, source = "openai_generated_new", "Generated fresh evaluation");
                    return (d, "openai_generated_new");
                }
                Err(e) => {
                    error!(target: "evaluation", %media_id, error = %e, "OpenAI generation failed; falling back");
                }
            }
        } else {
            warn!(target: "evaluation", %media_id, "OPENAI_API_KEY not set; trying existing store then seed fallback");
        }

        if let Some(existing) = self.get_document(media_id, Some(personalization_id)).await {
            warn!(target: "evaluation", id = %existing.id, source = "existing_store", "Serving stored evaluation");
            return (existing, "existing_store");
        }

        let d = fallback_document(media_id, personalization_id, meta);
        self.insert_document(d.clone()).await;
        warn!(target: "evaluation", id = %d.id, source = "seed_fallback", "Inserted seed fallback evaluation");
        (d, "seed_fallback")
    }

    /// Build a fresh session for the stored document and register it.
    /// Returns the session id; answers/feedback/position start empty.
    pub async fn create_session(
        &self,
        document: &EvaluationDocument,
        media_id: &str,
    ) -> Result<Uuid, crate::error::DocumentError> {
        let session = EvaluationSession::new(document, media_id)?;
        let id = session.id;
        self.sessions.write().await.insert(id, session);
        Ok(id)
    }

    pub async fn drop_session(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }

    /// Record a final result. Recording never blocks showing the result to
    /// the caller; failures here are logged, not surfaced.
    #[instrument(level = "info", skip(self, rec), fields(evaluation_id = %rec.evaluation_id, score = rec.score))]
    pub async fn record_results(&self, rec: ResultsRecord) {
        self.results.write().await.push(rec);
        info!(target: "evaluation", "Final results recorded");
    }
}
