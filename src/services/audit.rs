use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::store::models::{
    ActivitySummary, AuditAction, AuditContext, AuditLogEntry, AuditQuery, AuditSeverity,
    NewAuditEntry, Role,
};
use crate::store::ProtocolStore;

/// Upper bound on entries pulled for an activity summary window.
const ACTIVITY_WINDOW_LIMIT: i64 = 1000;

/// Number of entries surfaced as "recent" in an activity summary.
const RECENT_ACTIVITY_COUNT: usize = 10;

/// Appends and queries immutable activity records.
///
/// Logging is non-fatal by contract: a failed append is reported as `false`
/// and logged locally, never propagated, so auditing cannot abort the
/// operation it records.
pub struct AuditService {
    store: Arc<dyn ProtocolStore>,
    default_query_limit: i64,
}

impl AuditService {
    pub fn new(store: Arc<dyn ProtocolStore>) -> Self {
        Self {
            store,
            default_query_limit: 100,
        }
    }

    pub fn with_default_limit(mut self, limit: i64) -> Self {
        self.default_query_limit = limit;
        self
    }

    /// Append one entry with a server-assigned id and timestamp.
    pub async fn log(&self, entry: NewAuditEntry) -> bool {
        let record = AuditLogEntry {
            id: Uuid::new_v4(),
            action: entry.action,
            severity: entry.severity,
            user_id: entry.user_id,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            details: entry.details,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            tenant_id: entry.tenant_id,
            timestamp: Utc::now(),
        };

        match self.store.append_audit(record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to append audit entry: {}", e);
                false
            }
        }
    }

    /// Filtered query, newest-first. Limit defaults when unset; failures
    /// come back as an empty page, logged server-side.
    pub async fn query(&self, query: &AuditQuery) -> Vec<AuditLogEntry> {
        let mut query = query.clone();
        query.limit = Some(query.limit.unwrap_or(self.default_query_limit));
        query.offset = Some(query.offset.unwrap_or(0));

        match self.store.query_audit(&query).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Audit query failed: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn log_protocol_created(
        &self,
        user_id: Uuid,
        protocol_id: Uuid,
        details: Value,
        ctx: &AuditContext,
    ) -> bool {
        self.log_event(
            AuditAction::ProtocolCreated,
            AuditSeverity::Medium,
            Some(user_id),
            Some(protocol_id),
            details,
            ctx,
        )
        .await
    }

    pub async fn log_permission_granted(
        &self,
        granted_by: Uuid,
        protocol_id: Uuid,
        target_user: Uuid,
        role: Role,
        ctx: &AuditContext,
    ) -> bool {
        self.log_event(
            AuditAction::PermissionGranted,
            AuditSeverity::High,
            Some(granted_by),
            Some(protocol_id),
            json!({ "target_user": target_user, "role": role.as_str() }),
            ctx,
        )
        .await
    }

    pub async fn log_permission_revoked(
        &self,
        revoked_by: Uuid,
        protocol_id: Uuid,
        target_user: Uuid,
        ctx: &AuditContext,
    ) -> bool {
        self.log_event(
            AuditAction::PermissionRevoked,
            AuditSeverity::High,
            Some(revoked_by),
            Some(protocol_id),
            json!({ "target_user": target_user }),
            ctx,
        )
        .await
    }

    pub async fn log_data_accessed(
        &self,
        user_id: Uuid,
        protocol_id: Uuid,
        field: &str,
        ctx: &AuditContext,
    ) -> bool {
        self.log_event(
            AuditAction::DataAccessed,
            AuditSeverity::Low,
            Some(user_id),
            Some(protocol_id),
            json!({ "field": field }),
            ctx,
        )
        .await
    }

    pub async fn log_authentication_failed(
        &self,
        user_id: Option<Uuid>,
        reason: &str,
        ctx: &AuditContext,
    ) -> bool {
        self.log_event(
            AuditAction::AuthenticationFailed,
            AuditSeverity::Medium,
            user_id,
            None,
            json!({ "reason": reason }),
            ctx,
        )
        .await
    }

    pub async fn log_authorization_denied(
        &self,
        user_id: Uuid,
        protocol_id: Option<Uuid>,
        required: &str,
        ctx: &AuditContext,
    ) -> bool {
        self.log_event(
            AuditAction::AuthorizationDenied,
            AuditSeverity::High,
            Some(user_id),
            protocol_id,
            json!({ "required": required }),
            ctx,
        )
        .await
    }

    pub async fn log_suspicious_activity(
        &self,
        user_id: Option<Uuid>,
        description: &str,
        ctx: &AuditContext,
    ) -> bool {
        self.log_event(
            AuditAction::SuspiciousActivity,
            AuditSeverity::Critical,
            user_id,
            None,
            json!({ "description": description }),
            ctx,
        )
        .await
    }

    /// Window query plus in-memory aggregation of one user's activity.
    pub async fn user_activity_summary(&self, user_id: Uuid, days: i64) -> ActivitySummary {
        let query = AuditQuery {
            user_id: Some(user_id),
            start_date: Some(Utc::now() - Duration::days(days)),
            limit: Some(ACTIVITY_WINDOW_LIMIT),
            offset: Some(0),
            ..Default::default()
        };

        let entries = match self.store.query_audit(&query).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Activity summary query failed for user {}: {}", user_id, e);
                Vec::new()
            }
        };

        let mut actions_by_type: HashMap<String, u64> = HashMap::new();
        for entry in &entries {
            *actions_by_type
                .entry(entry.action.as_str().to_string())
                .or_insert(0) += 1;
        }

        ActivitySummary {
            total_actions: entries.len() as u64,
            actions_by_type,
            recent_activity: entries
                .iter()
                .take(RECENT_ACTIVITY_COUNT)
                .cloned()
                .collect(),
        }
    }

    /// Bulk-delete entries older than the retention window. Maintenance
    /// path only; returns the number of entries removed.
    pub async fn cleanup_old_logs(&self, retention_days: i64) -> u64 {
        let cutoff = Utc::now() - Duration::days(retention_days);
        match self.store.purge_audit_before(cutoff).await {
            Ok(count) => {
                tracing::info!(
                    "Audit retention cleanup removed {} entries older than {} days",
                    count,
                    retention_days
                );
                count
            }
            Err(e) => {
                tracing::error!("Audit retention cleanup failed: {}", e);
                0
            }
        }
    }

    async fn log_event(
        &self,
        action: AuditAction,
        severity: AuditSeverity,
        user_id: Option<Uuid>,
        resource_id: Option<Uuid>,
        details: Value,
        ctx: &AuditContext,
    ) -> bool {
        self.log(NewAuditEntry {
            action,
            severity,
            user_id,
            resource_type: "protocol".to_string(),
            resource_id,
            details,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            tenant_id: ctx.tenant_id,
        })
        .await
    }
}
