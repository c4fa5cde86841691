//! Caller → organization resolution.
//!
//! Every AI endpoint is tenant-scoped: a request that cannot be resolved to
//! an organization is rejected before any state is touched.

use async_trait::async_trait;
use axum::http::HeaderMap;
use leadflow_core::OrgId;
use leadflow_db::DbPool;
use sqlx::Row;

#[async_trait]
pub trait OrgResolver: Send + Sync {
    /// Resolve an API key to the organization that owns it. `None` means
    /// the caller is not authenticated.
    async fn resolve(&self, api_key: Option<&str>) -> Option<OrgId>;
}

/// Looks keys up in the `api_keys` table. Lookup failures resolve to
/// unauthenticated, never to another tenant.
pub struct SqlOrgResolver {
    pool: DbPool,
}

impl SqlOrgResolver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrgResolver for SqlOrgResolver {
    async fn resolve(&self, api_key: Option<&str>) -> Option<OrgId> {
        let api_key = api_key?;
        let row = sqlx::query("SELECT organization_id FROM api_keys WHERE api_key = ?")
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await;

        match row {
            Ok(row) => row.map(|r| OrgId(r.get::<String, _>("organization_id"))),
            Err(error) => {
                tracing::warn!(
                    event_name = "auth.lookup_failed",
                    error = %error,
                    "treating caller as unauthenticated"
                );
                None
            }
        }
    }
}

/// Resolves every caller to one fixed organization. Local development only;
/// enabled by `auth.enabled = false` plus `auth.dev_org_id`.
pub struct DevOrgResolver {
    org: OrgId,
}

impl DevOrgResolver {
    pub fn new(org: OrgId) -> Self {
        Self { org }
    }
}

#[async_trait]
impl OrgResolver for DevOrgResolver {
    async fn resolve(&self, _api_key: Option<&str>) -> Option<OrgId> {
        Some(self.org.clone())
    }
}

/// Pull the API key out of `x-api-key` or a bearer `Authorization` header.
pub fn api_key_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
