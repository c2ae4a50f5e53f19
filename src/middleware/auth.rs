use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::store::models::AuditContext;

/// Authenticated caller identity, injected into request extensions.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    /// Tenant context supplied by the fronting gateway; optional because
    /// token-only callers may carry none.
    pub tenant_id: Option<Uuid>,
}

/// Client metadata captured for audit records.
#[derive(Clone, Debug, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip_address = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string());
        let user_agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Self {
            ip_address,
            user_agent,
        }
    }

    pub fn audit_context(&self, tenant_id: Option<Uuid>) -> AuditContext {
        AuditContext {
            ip_address: self.ip_address.clone(),
            user_agent: self.user_agent.clone(),
            tenant_id,
        }
    }
}

/// Authentication middleware: validates the bearer access token and injects
/// the caller identity plus request metadata into the request.
pub async fn authenticate(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let meta = RequestMeta::from_headers(&headers);

    let token = extract_bearer_token(&headers).map_err(ApiError::authentication_required)?;

    let verification = state.encryption.verify_access_token(&token);
    let payload = match verification.payload {
        Some(payload) if verification.valid => payload,
        _ => {
            state
                .audit
                .log_authentication_failed(
                    None,
                    "invalid or expired access token",
                    &meta.audit_context(None),
                )
                .await;
            return Err(ApiError::token_invalid("Invalid or expired access token"));
        }
    };

    let tenant_id = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    let auth_user = AuthUser {
        user_id: payload.user_id,
        tenant_id,
    };

    tracing::debug!("Authenticated user {}", auth_user.user_id);

    request.extensions_mut().insert(auth_user);
    request.extensions_mut().insert(meta);

    Ok(next.run(request).await)
}

/// Extract the bearer token from the Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"))
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty bearer token".to_string());
        }
        Ok(token.to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}
