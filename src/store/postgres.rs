use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::models::{AuditLogEntry, AuditQuery, EncryptedPayload, Grant, Protocol};
use super::{ProtocolStore, StoreError};

/// PostgreSQL-backed store. Grant uniqueness is enforced by a unique index
/// on (resource_id, user_id); upserts ride on ON CONFLICT so concurrent
/// grants for the same pair serialize in the database.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn from_env() -> Result<Self, StoreError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::ConfigMissing("DATABASE_URL"))?;
        Self::connect(&url).await
    }

    fn parse<T>(raw: &str, what: &str) -> Result<T, StoreError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        raw.parse()
            .map_err(|e| StoreError::QueryError(format!("bad {} column: {}", what, e)))
    }

    fn grant_from_row(row: &PgRow) -> Result<Grant, StoreError> {
        let role: String = row.get("role");
        let permissions: Vec<String> = row.get("permissions");
        let permissions = permissions
            .iter()
            .map(|p| Self::parse(p, "permission"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Grant {
            resource_id: row.get("resource_id"),
            user_id: row.get("user_id"),
            role: Self::parse(&role, "role")?,
            permissions,
            granted_by: row.get("granted_by"),
            granted_at: row.get("granted_at"),
            expires_at: row.get("expires_at"),
            is_active: row.get("is_active"),
        })
    }

    fn protocol_from_row(row: &PgRow) -> Result<Protocol, StoreError> {
        let visibility: String = row.get("visibility");
        let classification: String = row.get("data_classification");

        let parameters: Option<serde_json::Value> = row.get("parameters");
        let adaptations: Option<serde_json::Value> = row.get("adaptations");

        Ok(Protocol {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            tenant_id: row.get("tenant_id"),
            name: row.get("name"),
            visibility: Self::parse(&visibility, "visibility")?,
            data_classification: Self::parse(&classification, "data_classification")?,
            parameters: parameters.map(Self::payload_from_json).transpose()?,
            adaptations: adaptations.map(Self::payload_from_json).transpose()?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn payload_from_json(value: serde_json::Value) -> Result<EncryptedPayload, StoreError> {
        serde_json::from_value(value)
            .map_err(|e| StoreError::QueryError(format!("bad encrypted payload blob: {}", e)))
    }

    fn payload_to_json(payload: &EncryptedPayload) -> Result<serde_json::Value, StoreError> {
        serde_json::to_value(payload)
            .map_err(|e| StoreError::QueryError(format!("failed to encode payload: {}", e)))
    }

    fn audit_from_row(row: &PgRow) -> Result<AuditLogEntry, StoreError> {
        let action: String = row.get("action");
        let severity: String = row.get("severity");

        Ok(AuditLogEntry {
            id: row.get("id"),
            action: Self::parse(&action, "action")?,
            severity: Self::parse(&severity, "severity")?,
            user_id: row.get("user_id"),
            resource_type: row.get("resource_type"),
            resource_id: row.get("resource_id"),
            details: row.get("details"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            tenant_id: row.get("tenant_id"),
            timestamp: row.get("timestamp"),
        })
    }
}

#[async_trait]
impl ProtocolStore for PgStore {
    async fn fetch_grant(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Grant>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT resource_id, user_id, role, permissions,
                   granted_by, granted_at, expires_at, is_active
            FROM protocol_grants
            WHERE resource_id = $1 AND user_id = $2
            "#,
        )
        .bind(resource_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::grant_from_row(&r)).transpose()
    }

    async fn upsert_grant(&self, grant: Grant) -> Result<(), StoreError> {
        let permissions: Vec<String> = grant
            .permissions
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();

        sqlx::query(
            r#"
            INSERT INTO protocol_grants
                (resource_id, user_id, role, permissions,
                 granted_by, granted_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (resource_id, user_id) DO UPDATE SET
                role = EXCLUDED.role,
                permissions = EXCLUDED.permissions,
                granted_by = EXCLUDED.granted_by,
                granted_at = EXCLUDED.granted_at,
                expires_at = EXCLUDED.expires_at,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(grant.resource_id)
        .bind(grant.user_id)
        .bind(grant.role.as_str())
        .bind(&permissions)
        .bind(grant.granted_by)
        .bind(grant.granted_at)
        .bind(grant.expires_at)
        .bind(grant.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn deactivate_grant(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE protocol_grants
            SET is_active = false, expires_at = $3
            WHERE resource_id = $1 AND user_id = $2
            "#,
        )
        .bind(resource_id)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_protocol(&self, id: Uuid) -> Result<Option<Protocol>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, tenant_id, name, visibility, data_classification,
                   parameters, adaptations, created_at, updated_at
            FROM protocols
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::protocol_from_row(&r)).transpose()
    }

    async fn update_protocol_parameters(
        &self,
        id: Uuid,
        payload: EncryptedPayload,
    ) -> Result<bool, StoreError> {
        let blob = Self::payload_to_json(&payload)?;
        let result = sqlx::query(
            "UPDATE protocols SET parameters = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(blob)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_protocol_adaptations(
        &self,
        id: Uuid,
        payload: EncryptedPayload,
    ) -> Result<bool, StoreError> {
        let blob = Self::payload_to_json(&payload)?;
        let result = sqlx::query(
            "UPDATE protocols SET adaptations = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(blob)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_audit(&self, entry: AuditLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log
                (id, action, severity, user_id, resource_type, resource_id,
                 details, ip_address, user_agent, tenant_id, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(entry.id)
        .bind(entry.action.as_str())
        .bind(entry.severity.as_str())
        .bind(entry.user_id)
        .bind(&entry.resource_type)
        .bind(entry.resource_id)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.tenant_id)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, StoreError> {
        let mut builder: sqlx::QueryBuilder<sqlx::Postgres> = sqlx::QueryBuilder::new(
            r#"
            SELECT id, action, severity, user_id, resource_type, resource_id,
                   details, ip_address, user_agent, tenant_id, timestamp
            FROM audit_log
            WHERE 1 = 1
            "#,
        );

        if let Some(user_id) = query.user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(action) = query.action {
            builder.push(" AND action = ").push_bind(action.as_str());
        }
        if let Some(resource_type) = &query.resource_type {
            builder
                .push(" AND resource_type = ")
                .push_bind(resource_type.clone());
        }
        if let Some(resource_id) = query.resource_id {
            builder.push(" AND resource_id = ").push_bind(resource_id);
        }
        if let Some(severity) = query.severity {
            builder.push(" AND severity = ").push_bind(severity.as_str());
        }
        if let Some(tenant_id) = query.tenant_id {
            builder.push(" AND tenant_id = ").push_bind(tenant_id);
        }
        if let Some(start) = query.start_date {
            builder.push(" AND timestamp >= ").push_bind(start);
        }
        if let Some(end) = query.end_date {
            builder.push(" AND timestamp <= ").push_bind(end);
        }

        builder.push(" ORDER BY timestamp DESC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ").push_bind(offset);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(Self::audit_from_row).collect()
    }

    async fn purge_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM audit_log WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
