use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Stable action vocabulary exposed through the audit query API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    ProtocolCreated,
    ProtocolUpdated,
    ProtocolDeleted,
    ProtocolShared,
    ProtocolUnshared,
    PermissionGranted,
    PermissionRevoked,
    PermissionUpdated,
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionPaused,
    ExecutionCancelled,
    DataAccessed,
    DataExported,
    DataModified,
    AuthenticationSuccess,
    AuthenticationFailed,
    AuthorizationDenied,
    SuspiciousActivity,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::ProtocolCreated => "PROTOCOL_CREATED",
            AuditAction::ProtocolUpdated => "PROTOCOL_UPDATED",
            AuditAction::ProtocolDeleted => "PROTOCOL_DELETED",
            AuditAction::ProtocolShared => "PROTOCOL_SHARED",
            AuditAction::ProtocolUnshared => "PROTOCOL_UNSHARED",
            AuditAction::PermissionGranted => "PERMISSION_GRANTED",
            AuditAction::PermissionRevoked => "PERMISSION_REVOKED",
            AuditAction::PermissionUpdated => "PERMISSION_UPDATED",
            AuditAction::ExecutionStarted => "EXECUTION_STARTED",
            AuditAction::ExecutionCompleted => "EXECUTION_COMPLETED",
            AuditAction::ExecutionPaused => "EXECUTION_PAUSED",
            AuditAction::ExecutionCancelled => "EXECUTION_CANCELLED",
            AuditAction::DataAccessed => "DATA_ACCESSED",
            AuditAction::DataExported => "DATA_EXPORTED",
            AuditAction::DataModified => "DATA_MODIFIED",
            AuditAction::AuthenticationSuccess => "AUTHENTICATION_SUCCESS",
            AuditAction::AuthenticationFailed => "AUTHENTICATION_FAILED",
            AuditAction::AuthorizationDenied => "AUTHORIZATION_DENIED",
            AuditAction::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROTOCOL_CREATED" => Ok(AuditAction::ProtocolCreated),
            "PROTOCOL_UPDATED" => Ok(AuditAction::ProtocolUpdated),
            "PROTOCOL_DELETED" => Ok(AuditAction::ProtocolDeleted),
            "PROTOCOL_SHARED" => Ok(AuditAction::ProtocolShared),
            "PROTOCOL_UNSHARED" => Ok(AuditAction::ProtocolUnshared),
            "PERMISSION_GRANTED" => Ok(AuditAction::PermissionGranted),
            "PERMISSION_REVOKED" => Ok(AuditAction::PermissionRevoked),
            "PERMISSION_UPDATED" => Ok(AuditAction::PermissionUpdated),
            "EXECUTION_STARTED" => Ok(AuditAction::ExecutionStarted),
            "EXECUTION_COMPLETED" => Ok(AuditAction::ExecutionCompleted),
            "EXECUTION_PAUSED" => Ok(AuditAction::ExecutionPaused),
            "EXECUTION_CANCELLED" => Ok(AuditAction::ExecutionCancelled),
            "DATA_ACCESSED" => Ok(AuditAction::DataAccessed),
            "DATA_EXPORTED" => Ok(AuditAction::DataExported),
            "DATA_MODIFIED" => Ok(AuditAction::DataModified),
            "AUTHENTICATION_SUCCESS" => Ok(AuditAction::AuthenticationSuccess),
            "AUTHENTICATION_FAILED" => Ok(AuditAction::AuthenticationFailed),
            "AUTHORIZATION_DENIED" => Ok(AuditAction::AuthorizationDenied),
            "SUSPICIOUS_ACTIVITY" => Ok(AuditAction::SuspiciousActivity),
            other => Err(format!("unknown audit action: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AuditSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditSeverity::Low => "LOW",
            AuditSeverity::Medium => "MEDIUM",
            AuditSeverity::High => "HIGH",
            AuditSeverity::Critical => "CRITICAL",
        }
    }
}

impl std::str::FromStr for AuditSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(AuditSeverity::Low),
            "MEDIUM" => Ok(AuditSeverity::Medium),
            "HIGH" => Ok(AuditSeverity::High),
            "CRITICAL" => Ok(AuditSeverity::Critical),
            other => Err(format!("unknown audit severity: {}", other)),
        }
    }
}

/// Append-only activity record. Immutable once written; the only destructive
/// operation is bulk retention cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub action: AuditAction,
    pub severity: AuditSeverity,
    /// Unset for events where the caller could not be identified, e.g.
    /// failed authentication.
    pub user_id: Option<Uuid>,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub tenant_id: Option<Uuid>,
    /// Server-assigned at append time.
    pub timestamp: DateTime<Utc>,
}

/// Input for a new audit record; id and timestamp are assigned on append.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub severity: AuditSeverity,
    pub user_id: Option<Uuid>,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    pub details: Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub tenant_id: Option<Uuid>,
}

/// Request context threaded into audit records.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub tenant_id: Option<Uuid>,
}

/// Filter for querying the audit log. All fields are optional and combine
/// with AND; results come back newest-first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub user_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub severity: Option<AuditSeverity>,
    pub tenant_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Aggregated view of one user's recent activity.
#[derive(Debug, Clone, Serialize)]
pub struct ActivitySummary {
    pub total_actions: u64,
    pub actions_by_type: HashMap<String, u64>,
    pub recent_activity: Vec<AuditLogEntry>,
}
