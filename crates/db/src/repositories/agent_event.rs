use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadflow_core::{ConversationId, OrgId};
use sqlx::{sqlite::SqliteRow, Row};

use super::RepositoryError;
use crate::DbPool;

/// Durable record of an action an agent executed on the CRM: a meeting
/// scheduled, a proposal generated, a deal mutated. Unlike the state-store
/// observability log, these never expire.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentEvent {
    pub id: String,
    pub org_id: OrgId,
    pub conversation_id: ConversationId,
    pub event_type: String,
    pub payload_json: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AgentEventRepository: Send + Sync {
    async fn insert(&self, event: AgentEvent) -> Result<(), RepositoryError>;

    /// Most recent events for an organization, newest first.
    async fn list_recent(
        &self,
        org: &OrgId,
        limit: i64,
    ) -> Result<Vec<AgentEvent>, RepositoryError>;
}

pub struct SqlAgentEventRepository {
    pool: DbPool,
}

impl SqlAgentEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentEventRepository for SqlAgentEventRepository {
    async fn insert(&self, event: AgentEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO agent_events (
                id, organization_id, conversation_id, event_type, payload_json, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(&event.org_id.0)
        .bind(&event.conversation_id.0)
        .bind(&event.event_type)
        .bind(&event.payload_json)
        .bind(event.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_recent(
        &self,
        org: &OrgId,
        limit: i64,
    ) -> Result<Vec<AgentEvent>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, organization_id, conversation_id, event_type, payload_json, created_at
            FROM agent_events
            WHERE organization_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(&org.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(agent_event_from_row).collect()
    }
}

fn agent_event_from_row(row: &SqliteRow) -> Result<AgentEvent, RepositoryError> {
    let org_id: String = row.try_get("organization_id")?;
    let conversation_id: String = row.try_get("conversation_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(AgentEvent {
        id: row.try_get("id")?,
        org_id: OrgId(org_id),
        conversation_id: ConversationId(conversation_id),
        event_type: row.try_get("event_type")?,
        payload_json: row.try_get("payload_json")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `created_at`: {e}")))?,
    })
}
