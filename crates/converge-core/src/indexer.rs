//! Semantic embedding indexing (§4.11), ported from `semantic/indexer.py`:
//! `index_intent` computes an intent's canonical text, skips re-embedding if
//! the checksum hasn't changed, and persists the result; `reindex` batches
//! that over every tracked intent.

use std::sync::Arc;

use converge_events::EventLog;
use converge_semantic::{build_canonical_text, canonical_checksum, CommitLink as SemanticCommitLink, EmbeddingProvider};
use converge_store::ConvergeStore;
use converge_types::{CommitRole, ConvergeError, Embedding, Event, EventType};

fn not_found(kind: &str, id: &str) -> ConvergeError {
    ConvergeError::NotFound(format!("{kind} '{id}'"))
}

fn commit_role_str(role: CommitRole) -> &'static str {
    match role {
        CommitRole::Head => "head",
        CommitRole::Base => "base",
        CommitRole::Merge => "merge",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexOutcome {
    Indexed,
    Skipped,
}

#[derive(Debug, Clone, Default)]
pub struct ReindexSummary {
    pub indexed: u64,
    pub skipped: u64,
    pub failed: u64,
}

pub struct Indexer {
    store: Arc<dyn ConvergeStore>,
    events: EventLog,
}

impl Indexer {
    pub fn new(store: Arc<dyn ConvergeStore>) -> Self {
        let events = EventLog::new(store.clone());
        Indexer { store, events }
    }

    fn commit_links_for(&self, intent_id: &str) -> Result<Vec<SemanticCommitLink>, ConvergeError> {
        Ok(self
            .store
            .list_commit_links(intent_id)?
            .into_iter()
            .map(|l| SemanticCommitLink { sha: l.sha, role: commit_role_str(l.role).to_string() })
            .collect())
    }

    /// Indexes one intent: builds canonical text, skips if the embedding on
    /// record already matches its checksum (unless `force`), else embeds and
    /// persists. `EMBEDDING_GENERATED` has no dedicated registry entry, so
    /// it's emitted via `EventType::Unknown`, matching the escape hatch the
    /// registry was built with for exactly this situation.
    pub fn index_intent(
        &self,
        intent_id: &str,
        provider: &dyn EmbeddingProvider,
        force: bool,
    ) -> Result<IndexOutcome, ConvergeError> {
        let intent = self.store.get_intent(intent_id)?.ok_or_else(|| not_found("intent", intent_id))?;
        let commit_links = self.commit_links_for(intent_id)?;
        let canonical = build_canonical_text(&intent, &commit_links, &[]);
        let checksum = canonical_checksum(&canonical);

        if !force {
            if let Some(existing) = self.store.get_embedding(intent_id, provider.model_name())? {
                if existing.checksum == checksum {
                    return Ok(IndexOutcome::Skipped);
                }
            }
        }

        let result = provider.embed(&canonical);
        let embedding = Embedding {
            intent_id: intent_id.to_string(),
            model: result.model.clone(),
            dimension: result.dimension,
            checksum,
            vector: result.vector.iter().map(|v| *v as f32).collect(),
            generated_at: result.generated_at,
        };
        self.store.upsert_embedding(&embedding)?;

        self.events.append(
            Event::new(
                EventType::Unknown("embedding.generated".to_string()),
                String::new(),
                serde_json::json!({"model": embedding.model, "dimension": embedding.dimension}),
            )
            .with_intent(intent_id),
        )?;

        Ok(IndexOutcome::Indexed)
    }

    /// Re-embeds every intent the store knows about. `dry_run` computes the
    /// summary without writing embeddings or appending an event; a failed
    /// intent doesn't stop the batch.
    pub fn reindex(
        &self,
        provider: &dyn EmbeddingProvider,
        tenant_id: Option<&str>,
        force: bool,
        dry_run: bool,
        batch_size: usize,
    ) -> Result<ReindexSummary, ConvergeError> {
        let mut summary = ReindexSummary::default();
        let intents = self.store.list_intents(None, tenant_id, batch_size as i64)?;

        for intent in intents {
            if dry_run {
                // A dry run still wants to know what WOULD happen, so recompute
                // the checksum comparison without persisting anything.
                let commit_links = self.commit_links_for(&intent.id)?;
                let canonical = build_canonical_text(&intent, &commit_links, &[]);
                let checksum = canonical_checksum(&canonical);
                let up_to_date = !force
                    && self
                        .store
                        .get_embedding(&intent.id, provider.model_name())?
                        .is_some_and(|e| e.checksum == checksum);
                if up_to_date {
                    summary.skipped += 1;
                } else {
                    summary.indexed += 1;
                }
                continue;
            }

            match self.index_intent(&intent.id, provider, force) {
                Ok(IndexOutcome::Indexed) => summary.indexed += 1,
                Ok(IndexOutcome::Skipped) => summary.skipped += 1,
                Err(_) => summary.failed += 1,
            }
        }

        if !dry_run {
            self.events.append(Event::new(
                EventType::Unknown("embedding.reindexed".to_string()),
                String::new(),
                serde_json::json!({
                    "indexed": summary.indexed,
                    "skipped": summary.skipped,
                    "failed": summary.failed,
                }),
            ))?;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_semantic::DeterministicProvider;
    use converge_store::SqliteStore;
    use converge_types::Intent;

    fn indexer_with_intent(id: &str) -> (Indexer, Arc<dyn ConvergeStore>) {
        let store: Arc<dyn ConvergeStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.upsert_intent(&Intent::new(id, "feature", "main")).unwrap();
        (Indexer::new(store.clone()), store)
    }

    #[test]
    fn index_intent_persists_an_embedding() {
        let (indexer, store) = indexer_with_intent("i1");
        let provider = DeterministicProvider::default();
        let outcome = indexer.index_intent("i1", &provider, false).unwrap();
        assert_eq!(outcome, IndexOutcome::Indexed);
        let embedding = store.get_embedding("i1", provider.model_name()).unwrap();
        assert!(embedding.is_some());
    }

    #[test]
    fn reindexing_unchanged_intent_is_skipped() {
        let (indexer, _store) = indexer_with_intent("i1");
        let provider = DeterministicProvider::default();
        indexer.index_intent("i1", &provider, false).unwrap();
        let outcome = indexer.index_intent("i1", &provider, false).unwrap();
        assert_eq!(outcome, IndexOutcome::Skipped);
    }

    #[test]
    fn force_reindexes_even_when_unchanged() {
        let (indexer, _store) = indexer_with_intent("i1");
        let provider = DeterministicProvider::default();
        indexer.index_intent("i1", &provider, false).unwrap();
        let outcome = indexer.index_intent("i1", &provider, true).unwrap();
        assert_eq!(outcome, IndexOutcome::Indexed);
    }

    #[test]
    fn reindex_batches_over_all_intents() {
        let store: Arc<dyn ConvergeStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.upsert_intent(&Intent::new("i1", "feature", "main")).unwrap();
        store.upsert_intent(&Intent::new("i2", "feature2", "main")).unwrap();
        let indexer = Indexer::new(store);
        let provider = DeterministicProvider::default();

        let summary = indexer.reindex(&provider, None, false, false, 100).unwrap();
        assert_eq!(summary.indexed, 2);
        assert_eq!(summary.skipped, 0);
    }

    #[test]
    fn dry_run_reindex_does_not_persist() {
        let (indexer, store) = indexer_with_intent("i1");
        let provider = DeterministicProvider::default();
        indexer.reindex(&provider, None, false, true, 100).unwrap();
        assert!(store.get_embedding("i1", provider.model_name()).unwrap().is_none());
    }
}
