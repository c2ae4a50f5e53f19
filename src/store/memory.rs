use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{AuditLogEntry, AuditQuery, EncryptedPayload, Grant, Protocol};
use super::{ProtocolStore, StoreError};

/// In-process store used by tests and local development. Mirrors the
/// PostgreSQL semantics: grant upserts replace on (resource_id, user_id),
/// audit queries return newest-first.
#[derive(Default)]
pub struct MemoryStore {
    grants: RwLock<HashMap<(Uuid, Uuid), Grant>>,
    protocols: RwLock<HashMap<Uuid, Protocol>>,
    audit: RwLock<Vec<AuditLogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a protocol row. Protocol creation itself is owned by the wider
    /// resource API, not this subsystem.
    pub async fn insert_protocol(&self, protocol: Protocol) {
        self.protocols
            .write()
            .await
            .insert(protocol.id, protocol);
    }

    fn matches(entry: &AuditLogEntry, query: &AuditQuery) -> bool {
        if let Some(user_id) = query.user_id {
            if entry.user_id != Some(user_id) {
                return false;
            }
        }
        if let Some(action) = query.action {
            if entry.action != action {
                return false;
            }
        }
        if let Some(resource_type) = &query.resource_type {
            if &entry.resource_type != resource_type {
                return false;
            }
        }
        if let Some(resource_id) = query.resource_id {
            if entry.resource_id != Some(resource_id) {
                return false;
            }
        }
        if let Some(severity) = query.severity {
            if entry.severity != severity {
                return false;
            }
        }
        if let Some(tenant_id) = query.tenant_id {
            if entry.tenant_id != Some(tenant_id) {
                return false;
            }
        }
        if let Some(start) = query.start_date {
            if entry.timestamp < start {
                return false;
            }
        }
        if let Some(end) = query.end_date {
            if entry.timestamp > end {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl ProtocolStore for MemoryStore {
    async fn fetch_grant(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Grant>, StoreError> {
        Ok(self
            .grants
            .read()
            .await
            .get(&(resource_id, user_id))
            .cloned())
    }

    async fn upsert_grant(&self, grant: Grant) -> Result<(), StoreError> {
        self.grants
            .write()
            .await
            .insert((grant.resource_id, grant.user_id), grant);
        Ok(())
    }

    async fn deactivate_grant(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut grants = self.grants.write().await;
        match grants.get_mut(&(resource_id, user_id)) {
            Some(grant) => {
                grant.is_active = false;
                grant.expires_at = Some(expires_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn fetch_protocol(&self, id: Uuid) -> Result<Option<Protocol>, StoreError> {
        Ok(self.protocols.read().await.get(&id).cloned())
    }

    async fn update_protocol_parameters(
        &self,
        id: Uuid,
        payload: EncryptedPayload,
    ) -> Result<bool, StoreError> {
        let mut protocols = self.protocols.write().await;
        match protocols.get_mut(&id) {
            Some(protocol) => {
                protocol.parameters = Some(payload);
                protocol.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_protocol_adaptations(
        &self,
        id: Uuid,
        payload: EncryptedPayload,
    ) -> Result<bool, StoreError> {
        let mut protocols = self.protocols.write().await;
        match protocols.get_mut(&id) {
            Some(protocol) => {
                protocol.adaptations = Some(payload);
                protocol.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_audit(&self, entry: AuditLogEntry) -> Result<(), StoreError> {
        self.audit.write().await.push(entry);
        Ok(())
    }

    async fn query_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLogEntry>, StoreError> {
        let audit = self.audit.read().await;
        let mut matched: Vec<AuditLogEntry> = audit
            .iter()
            .filter(|e| Self::matches(e, query))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let mut page: Vec<AuditLogEntry> = matched.into_iter().skip(offset).collect();
        if let Some(limit) = query.limit {
            page.truncate(limit.max(0) as usize);
        }
        Ok(page)
    }

    async fn purge_audit_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut audit = self.audit.write().await;
        let before = audit.len();
        audit.retain(|e| e.timestamp >= cutoff);
        Ok((before - audit.len()) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
