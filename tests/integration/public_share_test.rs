//! Integration tests for shares created over the API and served over WebDAV.

mod helpers;

use http::StatusCode;
use serde_json::json;

use helpers::{SHARES, TestApp, basic};

async fn create_link_share(app: &TestApp, password: Option<&str>) -> (i64, String) {
    let response = app
        .request(
            "POST",
            SHARES,
            Some("alice"),
            Some(json!({
                "file_id": 20,
                "share_type": 3,
                "permissions": 1,
                "password": password,
            })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);

    let id = response.data()["id"].as_str().unwrap().parse().unwrap();
    let token = response.data()["token"].as_str().unwrap().to_string();
    (id, token)
}

#[tokio::test]
async fn test_link_share_is_served_publicly() {
    let app = TestApp::new().await;
    let folder = app.create_folder(20, "alice", "pub").await;
    std::fs::write(folder.join("a.txt"), "public").unwrap();

    let (_, token) = create_link_share(&app, None).await;
    let base = format!("/public.php/dav/files/{token}");

    let response = app.dav_request("GET", &format!("{base}/a.txt"), &[], "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body().as_ref(), b"public");

    let response = app
        .dav_request("PROPFIND", &format!("{base}/"), &[("depth", "1".to_string())], "")
        .await;
    assert_eq!(response.status(), StatusCode::MULTI_STATUS);
    assert!(String::from_utf8_lossy(response.body()).contains("a.txt"));

    let response = app
        .dav_request("PUT", &format!("{base}/b.txt"), &[], "upload")
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!folder.join("b.txt").exists());
}

#[tokio::test]
async fn test_password_protected_link_share() {
    let app = TestApp::new().await;
    let folder = app.create_folder(20, "alice", "pub").await;
    std::fs::write(folder.join("a.txt"), "guarded").unwrap();

    let (_, token) = create_link_share(&app, Some("hunter2")).await;
    let uri = format!("/public.php/dav/files/{token}/a.txt");

    let response = app.dav_request("GET", &uri, &[], "").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = [("authorization", basic("anonymous", "nope"))];
    let response = app.dav_request("GET", &uri, &wrong, "").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let right = [("authorization", basic("anonymous", "hunter2"))];
    let response = app.dav_request("GET", &uri, &right, "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body().as_ref(), b"guarded");
}

#[tokio::test]
async fn test_deleted_link_share_is_gone() {
    let app = TestApp::new().await;
    let folder = app.create_folder(20, "alice", "pub").await;
    std::fs::write(folder.join("a.txt"), "public").unwrap();

    let (id, token) = create_link_share(&app, None).await;
    let response = app
        .request("DELETE", &format!("{SHARES}/{id}"), Some("alice"), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = app
        .dav_request("GET", &format!("/public.php/dav/files/{token}/a.txt"), &[], "")
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_share_sends_notification_mail() {
    let app = TestApp::new().await;
    app.create_folder(20, "alice", "reports").await;

    let response = app
        .request(
            "POST",
            SHARES,
            Some("alice"),
            Some(json!({ "file_id": 20, "share_type": 0, "share_with": "bob" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);

    let sent = app.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].recipients().any(|r| r == "bob@example.com"));

    let silent = app
        .request(
            "POST",
            SHARES,
            Some("alice"),
            Some(json!({
                "file_id": 20,
                "share_type": 0,
                "share_with": "admin",
                "send_mail": false,
            })),
        )
        .await;
    assert_eq!(silent.status, StatusCode::OK);
    assert_eq!(app.mailer.sent().await.len(), 1);
}
