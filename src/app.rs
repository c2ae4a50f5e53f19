use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::middleware::{from_fn, from_fn_with_state, Next};
use axum::response::Json;
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::handlers;
use crate::middleware::{
    attach_permissions, authenticate, require_any_permission, require_ownership,
    require_permission, require_tenant_access,
};
use crate::services::{AuditService, EncryptionService, PermissionService};
use crate::store::models::Permission;
use crate::store::ProtocolStore;

/// Permissions accepted for protocol export, checked as a logical OR.
const EXPORT_PERMISSIONS: &[Permission] = &[Permission::Export, Permission::Analytics];

/// Shared application state: one store handle and one instance of each
/// service, constructed at startup and injected everywhere.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProtocolStore>,
    pub permissions: Arc<PermissionService>,
    pub audit: Arc<AuditService>,
    pub encryption: Arc<EncryptionService>,
}

impl AppState {
    pub fn new(store: Arc<dyn ProtocolStore>, config: &AppConfig) -> Self {
        let permissions = Arc::new(PermissionService::new(store.clone()));
        let audit = Arc::new(
            AuditService::new(store.clone()).with_default_limit(config.audit.default_query_limit),
        );
        let encryption = Arc::new(EncryptionService::from_config(&config.security));

        Self {
            store,
            permissions,
            audit,
            encryption,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let read_routes = Router::new()
        .route("/api/protocols/:id", get(handlers::protocols::get_protocol))
        .route_layer(from_fn_with_state(
            state.clone(),
            |s: State<AppState>, p: Path<HashMap<String, String>>, req: Request, next: Next| {
                require_permission(s, p, Permission::Read, req, next)
            },
        ));

    let write_routes = Router::new()
        .route(
            "/api/protocols/:id/parameters",
            put(handlers::protocols::put_parameters),
        )
        .route(
            "/api/protocols/:id/adaptations",
            put(handlers::protocols::put_adaptations),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            |s: State<AppState>, p: Path<HashMap<String, String>>, req: Request, next: Next| {
                require_permission(s, p, Permission::Write, req, next)
            },
        ));

    let share_routes = Router::new()
        .route(
            "/api/protocols/:id/share",
            post(handlers::protocols::share_protocol),
        )
        .route(
            "/api/protocols/:id/share/:user_id",
            delete(handlers::protocols::unshare_protocol),
        )
        .route(
            "/api/protocols/:id/token",
            post(handlers::protocols::issue_token),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            |s: State<AppState>, p: Path<HashMap<String, String>>, req: Request, next: Next| {
                require_permission(s, p, Permission::Share, req, next)
            },
        ));

    let export_routes = Router::new()
        .route(
            "/api/protocols/:id/export",
            get(handlers::protocols::export_protocol),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            |s: State<AppState>, p: Path<HashMap<String, String>>, req: Request, next: Next| {
                require_any_permission(s, p, EXPORT_PERMISSIONS, req, next)
            },
        ));

    let owner_routes = Router::new()
        .route(
            "/api/protocols/:id/audit",
            get(handlers::protocols::protocol_audit),
        )
        .route_layer(from_fn_with_state(state.clone(), require_ownership));

    let introspection_routes = Router::new()
        .route("/api/protocols/:id/grant", get(handlers::protocols::my_grant))
        .route_layer(from_fn_with_state(state.clone(), attach_permissions));

    let audit_routes = Router::new()
        .route("/api/audit", get(handlers::audit::query_audit))
        .route("/api/audit/activity", get(handlers::audit::activity_summary))
        .route_layer(from_fn(require_tenant_access));

    let protected = Router::new()
        .merge(read_routes)
        .merge(write_routes)
        .merge(share_routes)
        .merge(export_routes)
        .merge(owner_routes)
        .merge(introspection_routes)
        .merge(audit_routes)
        .layer(from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Protocol API",
            "version": version,
            "endpoints": {
                "health": "/health (public)",
                "protocols": "/api/protocols/:id (protected)",
                "sharing": "/api/protocols/:id/share (protected)",
                "audit": "/api/audit (protected, tenant-scoped)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "store unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "store_error": e.to_string()
                }
            })),
        ),
    }
}
