use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AttachedGrant, AuthUser, RequestMeta};
use crate::store::models::{
    AuditAction, AuditLogEntry, AuditQuery, AuditSeverity, NewAuditEntry, Permission, Role,
};
use crate::store::ProtocolStore;

/// Fetch a protocol, unsealing its protected fields for the caller.
/// Guarded by READ permission.
pub async fn get_protocol(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<RequestMeta>,
) -> ApiResult<Value> {
    let protocol = state
        .store
        .fetch_protocol(id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Protocol not found"))?;

    let parameters = match &protocol.parameters {
        Some(payload) => Some(state.encryption.decrypt_protocol_parameters(payload)?),
        None => None,
    };
    let adaptations = match &protocol.adaptations {
        Some(payload) => Some(state.encryption.decrypt_user_adaptations(payload)?),
        None => None,
    };

    state
        .audit
        .log_data_accessed(user.user_id, id, "protocol", &meta.audit_context(user.tenant_id))
        .await;

    Ok(ApiResponse::success(json!({
        "id": protocol.id,
        "name": protocol.name,
        "owner_id": protocol.owner_id,
        "tenant_id": protocol.tenant_id,
        "visibility": protocol.visibility,
        "data_classification": protocol.data_classification,
        "parameters": parameters,
        "adaptations": adaptations,
        "created_at": protocol.created_at,
        "updated_at": protocol.updated_at,
    })))
}

/// Replace the protocol's parameter block, sealed as personal data.
/// Guarded by WRITE permission.
pub async fn put_parameters(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<RequestMeta>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let payload = state.encryption.encrypt_protocol_parameters(&body)?;
    let updated = state
        .store
        .update_protocol_parameters(id, payload)
        .await
        .map_err(ApiError::from)?;

    if !updated {
        return Err(ApiError::not_found("Protocol not found"));
    }

    log_field_modified(&state, &user, &meta, id, "parameters").await;
    Ok(ApiResponse::success(json!({ "updated": true })))
}

/// Replace the protocol's adaptation block, sealed as sensitive data.
/// Guarded by WRITE permission.
pub async fn put_adaptations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<RequestMeta>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let payload = state.encryption.encrypt_user_adaptations(&body)?;
    let updated = state
        .store
        .update_protocol_adaptations(id, payload)
        .await
        .map_err(ApiError::from)?;

    if !updated {
        return Err(ApiError::not_found("Protocol not found"));
    }

    log_field_modified(&state, &user, &meta, id, "adaptations").await;
    Ok(ApiResponse::success(json!({ "updated": true })))
}

/// Export the full decrypted protocol bundle.
/// Guarded by EXPORT or ANALYTICS permission.
pub async fn export_protocol(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<RequestMeta>,
) -> ApiResult<Value> {
    let protocol = state
        .store
        .fetch_protocol(id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("Protocol not found"))?;

    let parameters = match &protocol.parameters {
        Some(payload) => Some(state.encryption.decrypt_protocol_parameters(payload)?),
        None => None,
    };
    let adaptations = match &protocol.adaptations {
        Some(payload) => Some(state.encryption.decrypt_user_adaptations(payload)?),
        None => None,
    };

    state
        .audit
        .log(NewAuditEntry {
            action: AuditAction::DataExported,
            severity: AuditSeverity::Medium,
            user_id: Some(user.user_id),
            resource_type: "protocol".to_string(),
            resource_id: Some(id),
            details: json!({ "format": "json" }),
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
            tenant_id: user.tenant_id,
        })
        .await;

    Ok(ApiResponse::success(json!({
        "protocol": {
            "id": protocol.id,
            "name": protocol.name,
            "data_classification": protocol.data_classification,
            "parameters": parameters,
            "adaptations": adaptations,
        },
        "exported_at": Utc::now(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub user_id: Uuid,
    pub role: Role,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Grant a role on this protocol to another user.
/// Guarded by SHARE permission.
pub async fn share_protocol(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<RequestMeta>,
    Json(body): Json<ShareRequest>,
) -> ApiResult<Value> {
    let granted = state
        .permissions
        .grant_permission(
            body.user_id,
            id,
            body.role,
            body.permissions.clone(),
            user.user_id,
            body.expires_at,
        )
        .await;

    if !granted {
        return Err(ApiError::internal_server_error("Failed to store grant"));
    }

    let ctx = meta.audit_context(user.tenant_id);
    state
        .audit
        .log_permission_granted(user.user_id, id, body.user_id, body.role, &ctx)
        .await;
    state
        .audit
        .log(NewAuditEntry {
            action: AuditAction::ProtocolShared,
            severity: AuditSeverity::Medium,
            user_id: Some(user.user_id),
            resource_type: "protocol".to_string(),
            resource_id: Some(id),
            details: json!({ "target_user": body.user_id, "role": body.role.as_str() }),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            tenant_id: ctx.tenant_id,
        })
        .await;

    Ok(ApiResponse::created(json!({
        "granted": true,
        "user_id": body.user_id,
        "role": body.role,
    })))
}

/// Revoke another user's grant on this protocol.
/// Guarded by SHARE permission.
pub async fn unshare_protocol(
    State(state): State<AppState>,
    Path((id, target_user)): Path<(Uuid, Uuid)>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<RequestMeta>,
) -> ApiResult<Value> {
    let revoked = state.permissions.revoke_permission(target_user, id).await;
    if !revoked {
        return Err(ApiError::internal_server_error("Failed to revoke grant"));
    }

    let ctx = meta.audit_context(user.tenant_id);
    state
        .audit
        .log_permission_revoked(user.user_id, id, target_user, &ctx)
        .await;
    state
        .audit
        .log(NewAuditEntry {
            action: AuditAction::ProtocolUnshared,
            severity: AuditSeverity::Medium,
            user_id: Some(user.user_id),
            resource_type: "protocol".to_string(),
            resource_id: Some(id),
            details: json!({ "target_user": target_user }),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            tenant_id: ctx.tenant_id,
        })
        .await;

    Ok(ApiResponse::success(json!({ "revoked": true })))
}

/// Introspect the caller's own effective grant, as attached by the
/// enrichment middleware. Null when no effective grant exists.
pub async fn my_grant(
    Path(id): Path<Uuid>,
    grant: Option<Extension<AttachedGrant>>,
) -> ApiResult<Value> {
    let grant = grant.map(|Extension(AttachedGrant(view))| view);
    Ok(ApiResponse::success(json!({
        "protocol_id": id,
        "grant": grant,
    })))
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub user_id: Uuid,
}

/// Issue a scoped access token for a user, derived from their effective
/// grant (or the full set for the owner). Guarded by SHARE permission.
pub async fn issue_token(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<TokenRequest>,
) -> ApiResult<Value> {
    let permissions: Vec<Permission> = if state.permissions.is_owner(body.user_id, id).await {
        Role::Owner.permissions().to_vec()
    } else {
        match state.permissions.get_user_permissions(body.user_id, id).await {
            Some(view) => {
                let mut merged = view.role.permissions().to_vec();
                for p in view.permissions {
                    if !merged.contains(&p) {
                        merged.push(p);
                    }
                }
                merged
            }
            None => {
                return Err(ApiError::not_found(
                    "User has no effective grant on this protocol",
                ))
            }
        }
    };

    let token = state
        .encryption
        .generate_access_token(body.user_id, id, &permissions)?;

    Ok(ApiResponse::created(json!({
        "token": token,
        "user_id": body.user_id,
        "permissions": permissions,
    })))
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Audit trail for one protocol, owner only.
pub async fn protocol_audit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageParams>,
) -> ApiResult<Vec<AuditLogEntry>> {
    let query = AuditQuery {
        resource_type: Some("protocol".to_string()),
        resource_id: Some(id),
        limit: page.limit,
        offset: page.offset,
        ..Default::default()
    };

    Ok(ApiResponse::success(state.audit.query(&query).await))
}

async fn log_field_modified(
    state: &AppState,
    user: &AuthUser,
    meta: &RequestMeta,
    protocol_id: Uuid,
    field: &str,
) {
    state
        .audit
        .log(NewAuditEntry {
            action: AuditAction::DataModified,
            severity: AuditSeverity::Medium,
            user_id: Some(user.user_id),
            resource_type: "protocol".to_string(),
            resource_id: Some(protocol_id),
            details: json!({ "field": field }),
            ip_address: meta.ip_address.clone(),
            user_agent: meta.user_agent.clone(),
            tenant_id: user.tenant_id,
        })
        .await;
}
