mod common;

use anyhow::Result;
use axum::http::StatusCode;
use chrono::{Duration, Utc};
use uuid::Uuid;

use common::{bearer_token, seed_protocol, send, test_app, RequestSpec};
use protocol_api::store::models::{Permission, Role};
use protocol_api::store::ProtocolStore;

#[tokio::test]
async fn missing_token_is_unauthorized() -> Result<()> {
    let app = test_app().await;
    let proto = seed_protocol(&app.store, Uuid::new_v4(), Uuid::new_v4()).await;

    let (status, body) = send(
        &app.router,
        RequestSpec {
            method: "GET",
            uri: &format!("/api/protocols/{}", proto),
            token: None,
            tenant: None,
            body: None,
        },
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTHENTICATION_REQUIRED");
    Ok(())
}

#[tokio::test]
async fn garbage_token_is_unauthorized() -> Result<()> {
    let app = test_app().await;
    let proto = seed_protocol(&app.store, Uuid::new_v4(), Uuid::new_v4()).await;

    let uri = format!("/api/protocols/{}", proto);
    let (status, body) = send(&app.router, RequestSpec::get(&uri, "not.a-real-token")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_INVALID");
    Ok(())
}

#[tokio::test]
async fn failed_authentication_is_audited() -> Result<()> {
    let app = test_app().await;
    let proto = seed_protocol(&app.store, Uuid::new_v4(), Uuid::new_v4()).await;

    let uri = format!("/api/protocols/{}", proto);
    send(&app.router, RequestSpec::get(&uri, "tampered.token")).await;

    let entries = app
        .state
        .audit
        .query(&protocol_api::store::models::AuditQuery {
            action: Some(protocol_api::store::models::AuditAction::AuthenticationFailed),
            ..Default::default()
        })
        .await;
    assert_eq!(entries.len(), 1);
    Ok(())
}

#[tokio::test]
async fn stranger_without_grant_is_forbidden() -> Result<()> {
    let app = test_app().await;
    let proto = seed_protocol(&app.store, Uuid::new_v4(), Uuid::new_v4()).await;
    let stranger = Uuid::new_v4();

    let token = bearer_token(&app.state, stranger, proto);
    let uri = format!("/api/protocols/{}", proto);
    let (status, body) = send(&app.router, RequestSpec::get(&uri, &token)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "PERMISSION_DENIED");
    Ok(())
}

#[tokio::test]
async fn owner_reads_without_any_grant_row() -> Result<()> {
    let app = test_app().await;
    let owner = Uuid::new_v4();
    let proto = seed_protocol(&app.store, owner, Uuid::new_v4()).await;

    let token = bearer_token(&app.state, owner, proto);
    let uri = format!("/api/protocols/{}", proto);
    let (status, body) = send(&app.router, RequestSpec::get(&uri, &token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["owner_id"], owner.to_string());
    Ok(())
}

#[tokio::test]
async fn malformed_protocol_id_is_bad_request() -> Result<()> {
    let app = test_app().await;
    let proto = seed_protocol(&app.store, Uuid::new_v4(), Uuid::new_v4()).await;
    let token = bearer_token(&app.state, Uuid::new_v4(), proto);

    let (status, _body) = send(
        &app.router,
        RequestSpec::get("/api/protocols/not-a-uuid", &token),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn expired_grant_is_treated_as_absent() -> Result<()> {
    let app = test_app().await;
    let owner = Uuid::new_v4();
    let proto = seed_protocol(&app.store, owner, Uuid::new_v4()).await;
    let user = Uuid::new_v4();

    // stored role is the strongest possible, but the grant is expired
    app.state
        .permissions
        .grant_permission(
            user,
            proto,
            Role::Owner,
            vec![],
            owner,
            Some(Utc::now() - Duration::minutes(5)),
        )
        .await;

    let token = bearer_token(&app.state, user, proto);
    let uri = format!("/api/protocols/{}", proto);
    let (status, _body) = send(&app.router, RequestSpec::get(&uri, &token)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn export_accepts_either_permission() -> Result<()> {
    let app = test_app().await;
    let owner = Uuid::new_v4();
    let proto = seed_protocol(&app.store, owner, Uuid::new_v4()).await;

    // VIEWER alone cannot export
    let viewer = Uuid::new_v4();
    app.state
        .permissions
        .grant_permission(viewer, proto, Role::Viewer, vec![], owner, None)
        .await;
    let token = bearer_token(&app.state, viewer, proto);
    let uri = format!("/api/protocols/{}/export", proto);
    let (status, body) = send(&app.router, RequestSpec::get(&uri, &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].as_str().unwrap().contains("ANALYTICS"));
    assert!(body["message"].as_str().unwrap().contains("EXPORT"));

    // an explicit ANALYTICS permission on top of VIEWER satisfies the OR
    let analyst = Uuid::new_v4();
    app.state
        .permissions
        .grant_permission(
            analyst,
            proto,
            Role::Viewer,
            vec![Permission::Analytics],
            owner,
            None,
        )
        .await;
    let token = bearer_token(&app.state, analyst, proto);
    let (status, _body) = send(&app.router, RequestSpec::get(&uri, &token)).await;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn owner_only_audit_trail() -> Result<()> {
    let app = test_app().await;
    let owner = Uuid::new_v4();
    let proto = seed_protocol(&app.store, owner, Uuid::new_v4()).await;

    // even ADMIN role does not substitute for ownership here
    let admin = Uuid::new_v4();
    app.state
        .permissions
        .grant_permission(admin, proto, Role::Admin, vec![], owner, None)
        .await;

    let uri = format!("/api/protocols/{}/audit", proto);

    let token = bearer_token(&app.state, admin, proto);
    let (status, body) = send(&app.router, RequestSpec::get(&uri, &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "OWNERSHIP_REQUIRED");

    let token = bearer_token(&app.state, owner, proto);
    let (status, _body) = send(&app.router, RequestSpec::get(&uri, &token)).await;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn grant_introspection_fails_open() -> Result<()> {
    let app = test_app().await;
    let owner = Uuid::new_v4();
    let proto = seed_protocol(&app.store, owner, Uuid::new_v4()).await;

    // a viewer sees their attached grant
    let viewer = Uuid::new_v4();
    app.state
        .permissions
        .grant_permission(viewer, proto, Role::Viewer, vec![], owner, None)
        .await;
    let token = bearer_token(&app.state, viewer, proto);
    let uri = format!("/api/protocols/{}/grant", proto);
    let (status, body) = send(&app.router, RequestSpec::get(&uri, &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["grant"]["role"], "VIEWER");

    // a stranger still gets a 200 with no grant attached
    let stranger = Uuid::new_v4();
    let token = bearer_token(&app.state, stranger, proto);
    let (status, body) = send(&app.router, RequestSpec::get(&uri, &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["grant"].is_null());
    Ok(())
}

#[tokio::test]
async fn revoked_grant_row_survives_for_history() -> Result<()> {
    let app = test_app().await;
    let owner = Uuid::new_v4();
    let proto = seed_protocol(&app.store, owner, Uuid::new_v4()).await;
    let user = Uuid::new_v4();

    app.state
        .permissions
        .grant_permission(user, proto, Role::Editor, vec![], owner, None)
        .await;
    app.state.permissions.revoke_permission(user, proto).await;

    let row = app.store.fetch_grant(proto, user).await?.expect("grant row");
    assert!(!row.is_active);
    assert_eq!(row.role, Role::Editor);
    Ok(())
}
