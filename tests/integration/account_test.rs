//! Integration tests for account administration and its share cleanup.

mod helpers;

use http::StatusCode;
use serde_json::json;

use helpers::{CLOUD, SHARES, TestApp};

async fn share_with(app: &TestApp, share_type: i16, with: &str) {
    let response = app
        .request(
            "POST",
            SHARES,
            Some("alice"),
            Some(json!({
                "file_id": 20,
                "share_type": share_type,
                "share_with": with,
                "send_mail": false,
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
}

async fn received_by(app: &TestApp, uid: &str) -> usize {
    let response = app
        .request("GET", &format!("{SHARES}?shared_with_me=true"), Some(uid), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    response.data().as_array().map_or(0, Vec::len)
}

async fn created_by_alice(app: &TestApp) -> usize {
    let response = app.request("GET", SHARES, Some("alice"), None).await;
    assert_eq!(response.status, StatusCode::OK);
    response.data().as_array().map_or(0, Vec::len)
}

#[tokio::test]
async fn test_deleting_recipient_removes_their_shares() {
    let app = TestApp::new().await;
    app.create_folder(20, "alice", "reports").await;
    share_with(&app, 0, "bob").await;
    assert_eq!(received_by(&app, "bob").await, 1);
    assert_eq!(created_by_alice(&app).await, 1);

    let response = app
        .request("DELETE", &format!("{CLOUD}/users/bob"), Some("admin"), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(created_by_alice(&app).await, 0);

    let response = app
        .request("GET", &format!("{CLOUD}/users/bob"), Some("admin"), None)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_group_removes_group_shares() {
    let app = TestApp::new().await;
    app.create_folder(20, "alice", "reports").await;

    let response = app
        .request(
            "POST",
            &format!("{CLOUD}/groups"),
            Some("admin"),
            Some(json!({ "gid": "team", "display_name": "Team" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    let response = app
        .request(
            "POST",
            &format!("{CLOUD}/users/bob/groups"),
            Some("admin"),
            Some(json!({ "gid": "team" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);

    share_with(&app, 1, "team").await;
    assert_eq!(received_by(&app, "bob").await, 1);

    let response = app
        .request("DELETE", &format!("{CLOUD}/groups/team"), Some("admin"), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(received_by(&app, "bob").await, 0);
    assert_eq!(created_by_alice(&app).await, 0);
}

#[tokio::test]
async fn test_account_administration_requires_admin() {
    let app = TestApp::new().await;

    let response = app
        .request("DELETE", &format!("{CLOUD}/users/bob"), Some("alice"), None)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .request(
            "POST",
            &format!("{CLOUD}/groups"),
            Some("bob"),
            Some(json!({ "gid": "rogue" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .request("GET", &format!("{CLOUD}/users/alice"), Some("alice"), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["id"], "alice");
}
