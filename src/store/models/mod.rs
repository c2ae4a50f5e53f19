pub mod audit;
pub mod grant;
pub mod protocol;

pub use audit::{
    ActivitySummary, AuditAction, AuditContext, AuditLogEntry, AuditQuery, AuditSeverity,
    NewAuditEntry,
};
pub use grant::{Grant, GrantView, Permission, Role};
pub use protocol::{DataClassification, EncryptedPayload, Protocol, Visibility};
