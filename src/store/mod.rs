use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use models::{AuditLogEntry, AuditQuery, EncryptedPayload, Grant, Protocol};

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Persistence boundary for grants, protocols and the audit log.
///
/// Each call is a single round trip against the backing store; no caching
/// layer sits in front of it, so every permission check re-reads current
/// state. Grant upserts are atomic on (resource_id, user_id), last writer
/// wins.
#[async_trait]
pub trait ProtocolStore: Send + Sync {
    async fn fetch_grant(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Grant>, StoreError>;

    /// Insert or overwrite the grant for (resource_id, user_id).
    async fn upsert_grant(&self, grant: Grant) -> Result<(), StoreError>;

    /// Soft revoke: clears is_active and stamps expires_at. The row is kept.
    /// Returns whether a row was affected.
    async fn deactivate_grant(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn fetch_protocol(&self, id: Uuid) -> Result<Option<Protocol>, StoreError>;

    async fn update_protocol_parameters(
        &self,
        id: Uuid,
        payload: EncryptedPayload,
    ) -> Result<bool, StoreError>;

    async fn update_protocol_adaptations(
        &self,
        id: Uuid,
        payload: EncryptedPayload,
    ) -> Result<bool, StoreError>;

    async fn append_audit(&self, entry: AuditLogEntry) -> Result<(), StoreError>;

    /// Filtered audit query, newest-first, paginated by the query's
    /// limit/offset.
    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, StoreError>;

    /// Bulk-delete audit entries older than the cutoff. Returns the number
    /// of rows removed.
    async fn purge_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
