use async_trait::async_trait;
use thiserror::Error;

use leadflow_core::{ContactId, LeadDna, OrgId};

pub mod agent_event;
pub mod lead_dna;
pub mod memory;

pub use agent_event::{AgentEvent, AgentEventRepository, SqlAgentEventRepository};
pub use lead_dna::SqlLeadDnaRepository;
pub use memory::{InMemoryAgentEventRepository, InMemoryLeadDnaRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable home of the lead profile. The cached copy in the state store may
/// expire; this table never does.
#[async_trait]
pub trait LeadDnaRepository: Send + Sync {
    async fn find(
        &self,
        org: &OrgId,
        contact: &ContactId,
    ) -> Result<Option<LeadDna>, RepositoryError>;

    /// Insert or fully replace the profile for `(org, contact)`.
    async fn upsert(
        &self,
        org: &OrgId,
        contact: &ContactId,
        dna: &LeadDna,
    ) -> Result<(), RepositoryError>;
}
