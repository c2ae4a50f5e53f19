use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use futures::future::join_all;
use std::collections::HashMap;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::app::AppState;
use crate::error::ApiError;
use crate::store::models::{GrantView, Permission};

/// Effective grant of the current caller, attached by `attach_permissions`.
#[derive(Clone, Debug)]
pub struct AttachedGrant(pub GrantView);

/// Gate a route on one permission. Terminal outcomes only: 401 without an
/// authenticated user, 400 without a protocol id, 403 on denial. Denials are
/// not audited here; callers wanting a trail log it explicitly.
pub async fn require_permission(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    permission: Permission,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = current_user(&request)?;
    let resource_id = protocol_id(&params)?;

    if state
        .permissions
        .check_permission(user.user_id, resource_id, permission)
        .await
    {
        Ok(next.run(request).await)
    } else {
        Err(ApiError::permission_denied(format!(
            "Missing required permission: {}",
            permission.as_str()
        )))
    }
}

/// Gate a route on protocol ownership.
pub async fn require_ownership(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = current_user(&request)?;
    let resource_id = protocol_id(&params)?;

    if state.permissions.is_owner(user.user_id, resource_id).await {
        Ok(next.run(request).await)
    } else {
        Err(ApiError::ownership_required(
            "Protocol ownership required".to_string(),
        ))
    }
}

/// Gate a route on any of several permissions (logical OR). All checks run
/// concurrently; the route is denied only when every one fails.
pub async fn require_any_permission(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    permissions: &[Permission],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = current_user(&request)?;
    let resource_id = protocol_id(&params)?;

    let checks = permissions
        .iter()
        .map(|p| state.permissions.check_permission(user.user_id, resource_id, *p));

    if join_all(checks).await.into_iter().any(|allowed| allowed) {
        Ok(next.run(request).await)
    } else {
        let required: Vec<&str> = permissions.iter().map(|p| p.as_str()).collect();
        Err(ApiError::permission_denied(format!(
            "Requires any of: {}",
            required.join(", ")
        )))
    }
}

/// Structural tenant gate: both a user and a tenant id must be present.
/// Membership of the user in the tenant is not verified here.
pub async fn require_tenant_access(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = current_user(&request)?;

    if user.tenant_id.is_none() {
        return Err(ApiError::permission_denied(
            "Tenant context required".to_string(),
        ));
    }

    Ok(next.run(request).await)
}

/// Best-effort enrichment: attaches the caller's effective grant when one
/// exists. The only middleware in this chain that fails open - on any
/// missing piece it logs and forwards the request untouched.
pub async fn attach_permissions(
    State(state): State<AppState>,
    params: Option<Path<HashMap<String, String>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = request.extensions().get::<AuthUser>().cloned();
    let resource_id = params
        .as_ref()
        .and_then(|Path(p)| p.get("id"))
        .and_then(|raw| raw.parse::<Uuid>().ok());

    match (user, resource_id) {
        (Some(user), Some(resource_id)) => {
            match state
                .permissions
                .get_user_permissions(user.user_id, resource_id)
                .await
            {
                Some(view) => {
                    request.extensions_mut().insert(AttachedGrant(view));
                }
                None => {
                    tracing::debug!(
                        "No effective grant to attach for user {} on protocol {}",
                        user.user_id,
                        resource_id
                    );
                }
            }
        }
        _ => {
            tracing::debug!("Skipping permission attachment: missing user or protocol id");
        }
    }

    next.run(request).await
}

fn current_user(request: &Request) -> Result<AuthUser, ApiError> {
    request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::authentication_required("Authentication required"))
}

fn protocol_id(params: &HashMap<String, String>) -> Result<Uuid, ApiError> {
    let raw = params
        .get("id")
        .ok_or_else(|| ApiError::resource_id_missing("Protocol id is required"))?;
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid protocol id: {}", raw)))
}
