use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::store::models::{Grant, GrantView, Permission, Role};
use crate::store::ProtocolStore;

/// Evaluates and mutates per-protocol, per-user grants.
///
/// Reads fail closed: any store failure during evaluation is logged and
/// treated as denial. Writes report success as a boolean so callers can
/// decide whether to retry or surface an error; no store error crosses this
/// boundary.
pub struct PermissionService {
    store: Arc<dyn ProtocolStore>,
}

impl PermissionService {
    pub fn new(store: Arc<dyn ProtocolStore>) -> Self {
        Self { store }
    }

    /// True when the user may perform `required` on the protocol, either as
    /// its owner or through an effective grant (role matrix or explicit set).
    pub async fn check_permission(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        required: Permission,
    ) -> bool {
        // Ownership is a standalone fact; the owner needs no grant row.
        if self.is_owner(user_id, resource_id).await {
            return true;
        }

        match self.store.fetch_grant(resource_id, user_id).await {
            Ok(Some(grant)) if grant.is_effective(Utc::now()) => grant.allows(required),
            Ok(_) => false,
            Err(e) => {
                tracing::error!(
                    "Permission check failed for user {} on protocol {}: {}",
                    user_id,
                    resource_id,
                    e
                );
                false
            }
        }
    }

    /// Raw effective grant for introspection; not an enforcement path.
    pub async fn get_user_permissions(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
    ) -> Option<GrantView> {
        match self.store.fetch_grant(resource_id, user_id).await {
            Ok(Some(grant)) if grant.is_effective(Utc::now()) => Some(GrantView::from(&grant)),
            Ok(_) => None,
            Err(e) => {
                tracing::error!(
                    "Grant lookup failed for user {} on protocol {}: {}",
                    user_id,
                    resource_id,
                    e
                );
                None
            }
        }
    }

    /// Upsert keyed by (resource_id, user_id): repeated calls replace the
    /// prior grant, reactivate it and reset granted_at.
    pub async fn grant_permission(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        role: Role,
        permissions: Vec<Permission>,
        granted_by: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> bool {
        let grant = Grant {
            resource_id,
            user_id,
            role,
            permissions,
            granted_by,
            granted_at: Utc::now(),
            expires_at,
            is_active: true,
        };

        match self.store.upsert_grant(grant).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    "Failed to store grant for user {} on protocol {}: {}",
                    user_id,
                    resource_id,
                    e
                );
                false
            }
        }
    }

    /// Soft revoke: the row is deactivated and stamped, never deleted, so
    /// grant history survives. Revoking an absent grant is a no-op success.
    pub async fn revoke_permission(&self, user_id: Uuid, resource_id: Uuid) -> bool {
        match self
            .store
            .deactivate_grant(resource_id, user_id, Utc::now())
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(
                    "Failed to revoke grant for user {} on protocol {}: {}",
                    user_id,
                    resource_id,
                    e
                );
                false
            }
        }
    }

    /// Direct owner_id comparison; bypasses the grant table entirely.
    pub async fn is_owner(&self, user_id: Uuid, resource_id: Uuid) -> bool {
        match self.store.fetch_protocol(resource_id).await {
            Ok(Some(protocol)) => protocol.owner_id == user_id,
            Ok(None) => false,
            Err(e) => {
                tracing::error!("Owner check failed for protocol {}: {}", resource_id, e);
                false
            }
        }
    }
}
