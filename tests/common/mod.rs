use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use protocol_api::app::{app, AppState};
use protocol_api::services::{AuditService, EncryptionService, PermissionService};
use protocol_api::store::models::{DataClassification, Protocol, Visibility};
use protocol_api::store::MemoryStore;

/// Router, state and the seeded memory store backing them.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

pub async fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        store: store.clone(),
        permissions: Arc::new(PermissionService::new(store.clone())),
        audit: Arc::new(AuditService::new(store.clone())),
        encryption: Arc::new(EncryptionService::new(Some("integration-test-secret"), 24)),
    };
    let router = app(state.clone());

    TestApp {
        router,
        state,
        store,
    }
}

pub async fn seed_protocol(store: &MemoryStore, owner_id: Uuid, tenant_id: Uuid) -> Uuid {
    let now = Utc::now();
    let id = Uuid::new_v4();
    store
        .insert_protocol(Protocol {
            id,
            owner_id,
            tenant_id,
            name: "aerobic base block".to_string(),
            visibility: Visibility::Private,
            data_classification: DataClassification::Personal,
            parameters: None,
            adaptations: None,
            created_at: now,
            updated_at: now,
        })
        .await;
    id
}

/// Identity token for the given user; the permission list inside the token
/// is irrelevant to route authorization, which re-checks grants per request.
pub fn bearer_token(state: &AppState, user_id: Uuid, protocol_id: Uuid) -> String {
    state
        .encryption
        .generate_access_token(user_id, protocol_id, &[])
        .expect("token generation")
}

pub struct RequestSpec<'a> {
    pub method: &'a str,
    pub uri: &'a str,
    pub token: Option<&'a str>,
    pub tenant: Option<Uuid>,
    pub body: Option<Value>,
}

impl<'a> RequestSpec<'a> {
    pub fn get(uri: &'a str, token: &'a str) -> Self {
        Self {
            method: "GET",
            uri,
            token: Some(token),
            tenant: None,
            body: None,
        }
    }

    pub fn with_tenant(mut self, tenant: Uuid) -> Self {
        self.tenant = Some(tenant);
        self
    }
}

pub async fn send(router: &Router, spec: RequestSpec<'_>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(spec.method).uri(spec.uri);
    if let Some(token) = spec.token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    if let Some(tenant) = spec.tenant {
        builder = builder.header("x-tenant-id", tenant.to_string());
    }

    let request = match spec.body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("response body")
        .to_bytes();

    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response json")
    };

    (status, value)
}
