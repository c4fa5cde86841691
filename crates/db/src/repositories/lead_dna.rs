use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadflow_core::{ContactId, DnaSignal, LeadDna, OrgId};
use sqlx::{sqlite::SqliteRow, Row};

use super::{LeadDnaRepository, RepositoryError};
use crate::DbPool;

/// SQLite implementation of [`LeadDnaRepository`]. List-valued fields are
/// stored as JSON text columns; scalars get real columns so they stay
/// queryable.
pub struct SqlLeadDnaRepository {
    pool: DbPool,
}

impl SqlLeadDnaRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadDnaRepository for SqlLeadDnaRepository {
    async fn find(
        &self,
        org: &OrgId,
        contact: &ContactId,
    ) -> Result<Option<LeadDna>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT
                pains_json, objections_json, avg_ticket, revenue,
                decision_maker, signals_json, last_updated
            FROM lead_dna
            WHERE organization_id = ? AND contact_id = ?
            "#,
        )
        .bind(&org.0)
        .bind(&contact.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| lead_dna_from_row(&r)).transpose()
    }

    async fn upsert(
        &self,
        org: &OrgId,
        contact: &ContactId,
        dna: &LeadDna,
    ) -> Result<(), RepositoryError> {
        let pains_json = encode_json("pains", &dna.pains)?;
        let objections_json = encode_json("objections", &dna.objections)?;
        let signals_json = encode_json("signals", &dna.signals)?;

        sqlx::query(
            r#"
            INSERT INTO lead_dna (
                organization_id, contact_id, pains_json, objections_json,
                avg_ticket, revenue, decision_maker, signals_json, last_updated
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (organization_id, contact_id) DO UPDATE SET
                pains_json = excluded.pains_json,
                objections_json = excluded.objections_json,
                avg_ticket = excluded.avg_ticket,
                revenue = excluded.revenue,
                decision_maker = excluded.decision_maker,
                signals_json = excluded.signals_json,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&org.0)
        .bind(&contact.0)
        .bind(pains_json)
        .bind(objections_json)
        .bind(dna.avg_ticket)
        .bind(dna.revenue)
        .bind(&dna.decision_maker)
        .bind(signals_json)
        .bind(dna.last_updated.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn lead_dna_from_row(row: &SqliteRow) -> Result<LeadDna, RepositoryError> {
    let pains_json: String = row.try_get("pains_json")?;
    let objections_json: String = row.try_get("objections_json")?;
    let signals_json: String = row.try_get("signals_json")?;
    let last_updated: String = row.try_get("last_updated")?;

    Ok(LeadDna {
        pains: decode_json("pains_json", &pains_json)?,
        objections: decode_json("objections_json", &objections_json)?,
        avg_ticket: row.try_get("avg_ticket")?,
        revenue: row.try_get("revenue")?,
        decision_maker: row.try_get("decision_maker")?,
        signals: decode_json::<Vec<DnaSignal>>("signals_json", &signals_json)?,
        last_updated: parse_timestamp("last_updated", last_updated)?,
    })
}

fn encode_json<T: serde::Serialize>(field: &str, value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|e| RepositoryError::Decode(format!("could not encode `{field}`: {e}")))
}

fn decode_json<T: serde::de::DeserializeOwned>(
    column: &str,
    raw: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|e| RepositoryError::Decode(format!("invalid JSON in `{column}`: {e}")))
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp in `{column}`: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use leadflow_core::{ContactId, DnaSignal, DnaUpdate, LeadDna, OrgId, SignalKind};

    use super::{LeadDnaRepository, SqlLeadDnaRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    #[tokio::test]
    async fn find_on_an_unknown_contact_is_none() {
        let pool = setup_pool().await;
        let repo = SqlLeadDnaRepository::new(pool.clone());

        let found = repo
            .find(&OrgId("org-dna-miss".to_string()), &ContactId("nobody".to_string()))
            .await
            .expect("find");
        assert_eq!(found, None);

        pool.close().await;
    }

    #[tokio::test]
    async fn upsert_then_find_round_trips_the_profile() {
        let pool = setup_pool().await;
        let repo = SqlLeadDnaRepository::new(pool.clone());
        let org = OrgId("org-dna-round-trip".to_string());
        let contact = ContactId("contact-7".to_string());

        let profile = profile_fixture();
        repo.upsert(&org, &contact, &profile).await.expect("upsert");

        let found = repo.find(&org, &contact).await.expect("find").expect("profile exists");
        assert_eq!(found.pains, profile.pains);
        assert_eq!(found.avg_ticket, profile.avg_ticket);
        assert_eq!(found.decision_maker, profile.decision_maker);
        assert_eq!(found.signals, profile.signals);

        pool.close().await;
    }

    #[tokio::test]
    async fn second_upsert_replaces_the_previous_profile() {
        let pool = setup_pool().await;
        let repo = SqlLeadDnaRepository::new(pool.clone());
        let org = OrgId("org-dna-replace".to_string());
        let contact = ContactId("contact-7".to_string());

        repo.upsert(&org, &contact, &profile_fixture()).await.expect("first upsert");

        let merged = LeadDna::merged(
            Some(profile_fixture()),
            DnaUpdate {
                pains: vec!["ciclo de vendas longo".to_string()],
                avg_ticket: Some(8_000.0),
                ..DnaUpdate::default()
            },
        );
        repo.upsert(&org, &contact, &merged).await.expect("second upsert");

        let found = repo.find(&org, &contact).await.expect("find").expect("profile exists");
        assert_eq!(found.pains.len(), 2);
        assert_eq!(found.avg_ticket, Some(8_000.0));

        pool.close().await;
    }

    #[tokio::test]
    async fn profiles_are_isolated_per_organization() {
        let pool = setup_pool().await;
        let repo = SqlLeadDnaRepository::new(pool.clone());
        let contact = ContactId("shared-contact".to_string());

        repo.upsert(&OrgId("org-a".to_string()), &contact, &profile_fixture())
            .await
            .expect("upsert org-a");

        let other = repo
            .find(&OrgId("org-b".to_string()), &contact)
            .await
            .expect("find org-b");
        assert_eq!(other, None);

        pool.close().await;
    }

    fn profile_fixture() -> LeadDna {
        let mut profile = LeadDna::merged(
            None,
            DnaUpdate {
                pains: vec!["perder leads no funil".to_string()],
                objections: vec!["muito caro".to_string()],
                avg_ticket: Some(5_000.0),
                revenue: Some(1_200_000.0),
                signals: vec![DnaSignal {
                    kind: SignalKind::Pain,
                    value: "perder leads no funil".to_string(),
                    confidence: 0.75,
                    extracted_at: Utc::now(),
                }],
            },
        );
        profile.decision_maker = Some("CFO".to_string());
        profile
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }
}
