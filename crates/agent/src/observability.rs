use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use leadflow_cache::{observability_log_key, KvStore, StoreError, OBSERVABILITY_TTL};
use leadflow_core::{OrchestratorStep, OrgId, StepDraft};
use uuid::Uuid;

/// Writes the per-day observability trail: one list per (org, day), newest
/// first, expiring a week after the last write.
pub struct StepEmitter {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl StepEmitter {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store, ttl: OBSERVABILITY_TTL }
    }

    /// Override the per-day log lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Seal a draft into an immutable step and append it to today's log.
    ///
    /// Emission is best-effort: a store failure is logged and the sealed
    /// step is still returned, so the turn that produced it never fails on
    /// observability.
    pub async fn emit(&self, org: &OrgId, draft: StepDraft) -> OrchestratorStep {
        let step = OrchestratorStep {
            step_id: Uuid::new_v4().to_string(),
            agent: draft.agent,
            intent: draft.intent,
            skill_invoked: draft.skill_invoked,
            tools_used: draft.tools_used,
            duration_ms: draft.duration_ms,
            mutations: draft.mutations,
            reasoning: draft.reasoning,
            timestamp: Utc::now(),
        };

        let key = observability_log_key(org, step.timestamp.date_naive());
        let appended = match serde_json::to_string(&step) {
            Ok(raw) => self.store.list_prepend(&key, &raw).await,
            Err(error) => {
                tracing::warn!(
                    event_name = "observability.encode_failed",
                    organization_id = %org.0,
                    step_id = %step.step_id,
                    error = %error,
                );
                return step;
            }
        };

        match appended {
            Ok(()) => {
                if let Err(error) = self.store.expire(&key, self.ttl).await {
                    tracing::warn!(
                        event_name = "observability.expire_failed",
                        organization_id = %org.0,
                        error = %error,
                    );
                }
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "observability.append_failed",
                    organization_id = %org.0,
                    step_id = %step.step_id,
                    error = %error,
                );
            }
        }

        step
    }

    /// Read up to `limit` steps for one day, newest first. Entries that no
    /// longer decode are skipped with a warning; a store failure is the
    /// caller's problem.
    pub async fn read_day(
        &self,
        org: &OrgId,
        date: NaiveDate,
        limit: usize,
    ) -> Result<Vec<OrchestratorStep>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let key = observability_log_key(org, date);
        let raw_entries = self.store.list_range(&key, 0, limit - 1).await?;

        let mut steps = Vec::with_capacity(raw_entries.len());
        for raw in raw_entries {
            match serde_json::from_str::<OrchestratorStep>(&raw) {
                Ok(step) => steps.push(step),
                Err(error) => {
                    tracing::warn!(
                        event_name = "observability.decode_failed",
                        organization_id = %org.0,
                        error = %error,
                        "skipping undecodable step record"
                    );
                }
            }
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use leadflow_cache::{observability_log_key, KvStore, MemoryStore, UnavailableStore};
    use leadflow_core::{AgentRole, IntentTag, OrgId, StepDraft};

    use super::StepEmitter;

    fn draft_fixture(reasoning: &str) -> StepDraft {
        StepDraft {
            agent: AgentRole::Conversational,
            intent: Some(IntentTag::Scheduling),
            skill_invoked: Some("skill-scheduling".to_string()),
            tools_used: vec!["searchDeals".to_string()],
            duration_ms: Some(12),
            mutations: Vec::new(),
            reasoning: Some(reasoning.to_string()),
        }
    }

    #[tokio::test]
    async fn emitted_steps_read_back_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let emitter = StepEmitter::new(store);
        let org = OrgId("org-1".to_string());

        emitter.emit(&org, draft_fixture("first")).await;
        emitter.emit(&org, draft_fixture("second")).await;
        emitter.emit(&org, draft_fixture("third")).await;

        let steps = emitter.read_day(&org, Utc::now().date_naive(), 50).await.expect("read");
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].reasoning.as_deref(), Some("third"));
        assert_eq!(steps[2].reasoning.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn read_respects_the_limit() {
        let store = Arc::new(MemoryStore::new());
        let emitter = StepEmitter::new(store);
        let org = OrgId("org-1".to_string());

        for index in 0..5 {
            emitter.emit(&org, draft_fixture(&format!("step-{index}"))).await;
        }

        let steps = emitter.read_day(&org, Utc::now().date_naive(), 2).await.expect("read");
        assert_eq!(steps.len(), 2);
        assert!(emitter
            .read_day(&org, Utc::now().date_naive(), 0)
            .await
            .expect("read zero")
            .is_empty());
    }

    #[tokio::test]
    async fn undecodable_entries_are_skipped_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        let org = OrgId("org-1".to_string());
        let key = observability_log_key(&org, Utc::now().date_naive());

        let emitter = StepEmitter::new(store.clone());
        emitter.emit(&org, draft_fixture("valid")).await;
        store.list_prepend(&key, "{not json").await.unwrap();

        let steps = emitter.read_day(&org, Utc::now().date_naive(), 50).await.expect("read");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].reasoning.as_deref(), Some("valid"));
    }

    #[tokio::test]
    async fn emit_survives_an_unavailable_store() {
        let emitter = StepEmitter::new(Arc::new(UnavailableStore));
        let org = OrgId("org-1".to_string());

        let step = emitter.emit(&org, draft_fixture("best effort")).await;
        assert!(!step.step_id.is_empty());
    }

    #[tokio::test]
    async fn read_propagates_store_failure() {
        let emitter = StepEmitter::new(Arc::new(UnavailableStore));
        let org = OrgId("org-1".to_string());

        let result = emitter.read_day(&org, Utc::now().date_naive(), 50).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn days_are_isolated() {
        let store = Arc::new(MemoryStore::new());
        let emitter = StepEmitter::new(store);
        let org = OrgId("org-1".to_string());

        emitter.emit(&org, draft_fixture("today")).await;

        let yesterday = Utc::now().date_naive().pred_opt().unwrap();
        let steps = emitter.read_day(&org, yesterday, 50).await.expect("read");
        assert!(steps.is_empty());
    }
}
