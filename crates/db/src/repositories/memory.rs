//! In-memory repository doubles. Used by tests across the workspace and by
//! local tooling that runs without a database file.

use std::sync::Mutex;

use async_trait::async_trait;
use leadflow_core::{ContactId, LeadDna, OrgId};

use super::{AgentEvent, AgentEventRepository, LeadDnaRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryLeadDnaRepository {
    profiles: Mutex<Vec<(String, String, LeadDna)>>,
}

#[async_trait]
impl LeadDnaRepository for InMemoryLeadDnaRepository {
    async fn find(
        &self,
        org: &OrgId,
        contact: &ContactId,
    ) -> Result<Option<LeadDna>, RepositoryError> {
        let profiles = self.profiles.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(profiles
            .iter()
            .find(|(o, c, _)| *o == org.0 && *c == contact.0)
            .map(|(_, _, dna)| dna.clone()))
    }

    async fn upsert(
        &self,
        org: &OrgId,
        contact: &ContactId,
        dna: &LeadDna,
    ) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        profiles.retain(|(o, c, _)| !(*o == org.0 && *c == contact.0));
        profiles.push((org.0.clone(), contact.0.clone(), dna.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAgentEventRepository {
    events: Mutex<Vec<AgentEvent>>,
}

#[async_trait]
impl AgentEventRepository for InMemoryAgentEventRepository {
    async fn insert(&self, event: AgentEvent) -> Result<(), RepositoryError> {
        let mut events = self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event);
        Ok(())
    }

    async fn list_recent(
        &self,
        org: &OrgId,
        limit: i64,
    ) -> Result<Vec<AgentEvent>, RepositoryError> {
        let events = self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut matching: Vec<AgentEvent> =
            events.iter().filter(|event| event.org_id == *org).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }
}
