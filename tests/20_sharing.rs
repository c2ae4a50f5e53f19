mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{bearer_token, seed_protocol, send, test_app, RequestSpec};
use protocol_api::store::models::{AuditAction, AuditQuery, Permission};
use protocol_api::store::ProtocolStore;

/// Owner A shares VIEWER with B, B can read but not write, A revokes,
/// B loses access, A keeps full access through ownership alone.
#[tokio::test]
async fn share_read_revoke_lifecycle() -> Result<()> {
    let app = test_app().await;
    let tenant = Uuid::new_v4();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let proto = seed_protocol(&app.store, alice, tenant).await;

    let alice_token = bearer_token(&app.state, alice, proto);
    let bob_token = bearer_token(&app.state, bob, proto);

    // A shares VIEWER with B
    let (status, _body) = send(
        &app.router,
        RequestSpec {
            method: "POST",
            uri: &format!("/api/protocols/{}/share", proto),
            token: Some(&alice_token),
            tenant: Some(tenant),
            body: Some(json!({ "user_id": bob, "role": "VIEWER" })),
        },
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // B can read
    let read_uri = format!("/api/protocols/{}", proto);
    let (status, _body) = send(&app.router, RequestSpec::get(&read_uri, &bob_token)).await;
    assert_eq!(status, StatusCode::OK);

    // B cannot write
    let (status, _body) = send(
        &app.router,
        RequestSpec {
            method: "PUT",
            uri: &format!("/api/protocols/{}/parameters", proto),
            token: Some(&bob_token),
            tenant: None,
            body: Some(json!({ "sets": 5 })),
        },
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A revokes B's grant
    let (status, _body) = send(
        &app.router,
        RequestSpec {
            method: "DELETE",
            uri: &format!("/api/protocols/{}/share/{}", proto, bob),
            token: Some(&alice_token),
            tenant: Some(tenant),
            body: None,
        },
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // B is locked out immediately
    let (status, _body) = send(&app.router, RequestSpec::get(&read_uri, &bob_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A still holds every permission through ownership, no grant row needed
    assert!(
        app.state
            .permissions
            .check_permission(alice, proto, Permission::Delete)
            .await
    );
    assert!(app.store.fetch_grant(proto, alice).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn resharing_upgrades_the_grant_in_place() -> Result<()> {
    let app = test_app().await;
    let tenant = Uuid::new_v4();
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let proto = seed_protocol(&app.store, owner, tenant).await;

    let owner_token = bearer_token(&app.state, owner, proto);
    let share_uri = format!("/api/protocols/{}/share", proto);

    for role in ["VIEWER", "EDITOR"] {
        let (status, _body) = send(
            &app.router,
            RequestSpec {
                method: "POST",
                uri: &share_uri,
                token: Some(&owner_token),
                tenant: Some(tenant),
                body: Some(json!({ "user_id": member, "role": role })),
            },
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // one row, carrying the later role
    let row = app.store.fetch_grant(proto, member).await?.expect("grant");
    assert_eq!(row.role.as_str(), "EDITOR");

    // and EDITOR write access now works end to end
    let member_token = bearer_token(&app.state, member, proto);
    let (status, _body) = send(
        &app.router,
        RequestSpec {
            method: "PUT",
            uri: &format!("/api/protocols/{}/parameters", proto),
            token: Some(&member_token),
            tenant: None,
            body: Some(json!({ "sets": 3, "reps": [8, 8, 8] })),
        },
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn written_fields_are_sealed_at_rest_and_readable_via_api() -> Result<()> {
    let app = test_app().await;
    let owner = Uuid::new_v4();
    let proto = seed_protocol(&app.store, owner, Uuid::new_v4()).await;
    let token = bearer_token(&app.state, owner, proto);

    let parameters = json!({ "sets": 5, "reps": [5, 5, 5, 5, 5], "rest_sec": 180 });
    let (status, _body) = send(
        &app.router,
        RequestSpec {
            method: "PUT",
            uri: &format!("/api/protocols/{}/parameters", proto),
            token: Some(&token),
            tenant: None,
            body: Some(parameters.clone()),
        },
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // at rest: an opaque blob, not the plaintext
    let stored = app.store.fetch_protocol(proto).await?.expect("protocol");
    let sealed = stored.parameters.expect("sealed parameters");
    assert!(!sealed.ciphertext.contains("rest_sec"));
    assert!(!sealed.iv.is_empty());

    // via the API: decrypted back to the original value
    let (status, body) = send(
        &app.router,
        RequestSpec::get(&format!("/api/protocols/{}", proto), &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["parameters"], parameters);
    Ok(())
}

#[tokio::test]
async fn sharing_writes_audit_entries() -> Result<()> {
    let app = test_app().await;
    let tenant = Uuid::new_v4();
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let proto = seed_protocol(&app.store, owner, tenant).await;
    let owner_token = bearer_token(&app.state, owner, proto);

    send(
        &app.router,
        RequestSpec {
            method: "POST",
            uri: &format!("/api/protocols/{}/share", proto),
            token: Some(&owner_token),
            tenant: Some(tenant),
            body: Some(json!({ "user_id": member, "role": "VIEWER" })),
        },
    )
    .await;
    send(
        &app.router,
        RequestSpec {
            method: "DELETE",
            uri: &format!("/api/protocols/{}/share/{}", proto, member),
            token: Some(&owner_token),
            tenant: Some(tenant),
            body: None,
        },
    )
    .await;

    for action in [
        AuditAction::PermissionGranted,
        AuditAction::ProtocolShared,
        AuditAction::PermissionRevoked,
        AuditAction::ProtocolUnshared,
    ] {
        let entries = app
            .state
            .audit
            .query(&AuditQuery {
                action: Some(action),
                resource_id: Some(proto),
                ..Default::default()
            })
            .await;
        assert_eq!(entries.len(), 1, "{:?}", action);
        assert_eq!(entries[0].tenant_id, Some(tenant));
    }
    Ok(())
}

#[tokio::test]
async fn issued_token_carries_the_effective_permission_set() -> Result<()> {
    let app = test_app().await;
    let tenant = Uuid::new_v4();
    let owner = Uuid::new_v4();
    let member = Uuid::new_v4();
    let proto = seed_protocol(&app.store, owner, tenant).await;
    let owner_token = bearer_token(&app.state, owner, proto);

    app.state
        .permissions
        .grant_permission(
            member,
            proto,
            protocol_api::store::models::Role::Viewer,
            vec![Permission::Export],
            owner,
            None,
        )
        .await;

    let (status, body) = send(
        &app.router,
        RequestSpec {
            method: "POST",
            uri: &format!("/api/protocols/{}/token", proto),
            token: Some(&owner_token),
            tenant: None,
            body: Some(json!({ "user_id": member })),
        },
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let issued = body["data"]["token"].as_str().expect("token");
    let verification = app.state.encryption.verify_access_token(issued);
    assert!(verification.valid);
    let payload = verification.payload.expect("payload");
    assert_eq!(payload.user_id, member);
    assert_eq!(payload.protocol_id, proto);
    assert!(payload.permissions.contains(&Permission::Read));
    assert!(payload.permissions.contains(&Permission::Export));
    assert!(!payload.permissions.contains(&Permission::Delete));
    Ok(())
}
