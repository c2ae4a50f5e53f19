use axum::extract::{Extension, Query, State};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::store::models::{ActivitySummary, AuditLogEntry, AuditQuery};

/// Query the audit log, scoped to the caller's tenant. Guarded by the
/// tenant-access middleware, which guarantees a tenant id is present.
pub async fn query_audit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<AuditQuery>,
) -> ApiResult<Vec<AuditLogEntry>> {
    let mut query = params;
    // Callers see their own tenant's trail only, whatever they asked for.
    query.tenant_id = user.tenant_id;

    Ok(ApiResponse::success(state.audit.query(&query).await))
}

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    #[serde(default = "default_days")]
    pub days: i64,
}

fn default_days() -> i64 {
    30
}

/// Aggregated activity summary for the calling user.
pub async fn activity_summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ActivityParams>,
) -> ApiResult<ActivitySummary> {
    Ok(ApiResponse::success(
        state
            .audit
            .user_activity_summary(user.user_id, params.days)
            .await,
    ))
}
