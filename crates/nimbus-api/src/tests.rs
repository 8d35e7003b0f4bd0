use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tower::ServiceExt;

use nimbus_auth::PasswordHasher;
use nimbus_core::config::AppConfig;
use nimbus_core::config::mail::MailConfig;
use nimbus_database::traits::{GroupBackend, UserBackend};
use nimbus_entity::node::Node;
use nimbus_entity::share::NodeType;
use nimbus_entity::user::{Group, User};
use nimbus_service::{Backends, L10nFactory, MemoryMailer, ShareNotifier, ShareProvider};

use crate::router::{CLOUD_PREFIX, SHARES_PREFIX, build_router};
use crate::state::AppState;

const PASSWORD: &str = "secret";

async fn app() -> (Router, AppState) {
    let (backends, directory, nodes) = Backends::memory();
    let hasher = PasswordHasher::new();
    let hash = hasher.hash(PASSWORD).unwrap();
    for uid in ["admin", "alice", "bob"] {
        let mut user = User::new(uid);
        user.password_hash = Some(hash.clone());
        UserBackend::save(directory.as_ref(), &user).await.unwrap();
    }
    GroupBackend::save(directory.as_ref(), &Group::new("admin"))
        .await
        .unwrap();
    directory.add_member("admin", "admin").await.unwrap();

    nodes
        .insert(Node {
            id: 10,
            parent_id: Some(1),
            name: "plan.odt".into(),
            path: "files/plan.odt".into(),
            storage_id: "home::alice".into(),
            node_type: NodeType::File,
            owner: "alice".into(),
        })
        .await;

    let config: AppConfig = serde_json::from_value(json!({
        "server": {},
        "database": { "url": "postgres://localhost/nimbus" }
    }))
    .unwrap();
    let notifier = Arc::new(ShareNotifier::new(
        backends.users.clone(),
        Arc::new(MemoryMailer::new()),
        L10nFactory::new(),
        MailConfig::default(),
        "https://cloud.example",
    ));
    let shares = Arc::new(ShareProvider::new(
        backends.clone(),
        config.sharing.clone(),
        notifier,
    ));
    let state = AppState::new(config, backends, shares);
    (build_router(state.clone()), state)
}

fn basic(uid: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{uid}:{password}")))
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(uid) = user {
        request = request.header(header::AUTHORIZATION, basic(uid, PASSWORD));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn shares_uri(path: &str) -> String {
    format!("{SHARES_PREFIX}/shares{path}")
}

fn data(body: &Value) -> &Value {
    &body["ocs"]["data"]
}

#[tokio::test]
async fn test_health_and_fallback() {
    let (app, _) = app().await;

    let (status, body) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["status"], "ok");

    let (status, body) = call(&app, "GET", "/nowhere", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["ocs"]["meta"]["status"], "failure");
}

#[tokio::test]
async fn test_requires_basic_auth() {
    let (app, _) = app().await;

    let request = Request::builder()
        .uri(shares_uri(""))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    let request = Request::builder()
        .uri(shares_uri(""))
        .header(header::AUTHORIZATION, basic("alice", "wrong"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_link_share_lifecycle() {
    let (app, state) = app().await;

    let (status, body) = call(
        &app,
        "POST",
        &shares_uri(""),
        Some("alice"),
        Some(json!({ "file_id": 10, "share_type": 3, "permissions": 31, "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let share = data(&body);
    assert_eq!(share["share_type"], 3);
    // Create and delete are masked off for files.
    assert_eq!(share["permissions"], 19);
    assert_eq!(share["has_password"], true);
    assert_eq!(share["file_target"], "/plan.odt");
    let token = share["token"].as_str().unwrap().to_string();
    let id = share["id"].as_str().unwrap().to_string();

    let stored = state.shares.get_share_by_token(&token).await.unwrap();
    let hash = stored.password.unwrap();
    assert_ne!(hash, "pw");
    assert!(PasswordHasher::new().verify("pw", &hash).unwrap());

    let (status, body) = call(
        &app,
        "PUT",
        &shares_uri(&format!("/{id}")),
        Some("alice"),
        Some(json!({ "password": "", "label": "Plans", "note": "draft" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["has_password"], false);
    assert_eq!(data(&body)["label"], "Plans");

    let (_, body) = call(&app, "GET", &shares_uri(""), Some("alice"), None).await;
    assert_eq!(data(&body).as_array().unwrap().len(), 1);

    let (status, _) = call(&app, "DELETE", &shares_uri(&format!("/{id}")), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, "GET", &shares_uri(&format!("/{id}")), Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_share_accept_and_leave() {
    let (app, _) = app().await;

    let (status, body) = call(
        &app,
        "POST",
        &shares_uri(""),
        Some("alice"),
        Some(json!({ "file_id": 10, "share_type": 0, "share_with": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = data(&body)["id"].as_str().unwrap().to_string();
    assert_eq!(data(&body)["permissions"], 1);

    let (_, body) = call(&app, "GET", &shares_uri("/pending"), Some("bob"), None).await;
    assert_eq!(data(&body).as_array().unwrap().len(), 1);

    let (status, body) = call(
        &app,
        "POST",
        &shares_uri(&format!("/pending/{id}")),
        Some("bob"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["status"], 1);

    let (_, body) = call(&app, "GET", &shares_uri("/pending"), Some("bob"), None).await;
    assert!(data(&body).as_array().unwrap().is_empty());
    let (_, body) = call(&app, "GET", &shares_uri("?shared_with_me=true"), Some("bob"), None).await;
    assert_eq!(data(&body).as_array().unwrap().len(), 1);

    // Recipients cannot edit, outsiders cannot see.
    let (status, _) = call(
        &app,
        "PUT",
        &shares_uri(&format!("/{id}")),
        Some("bob"),
        Some(json!({ "permissions": 19 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(&app, "GET", &shares_uri(&format!("/{id}")), Some("admin"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, "DELETE", &shares_uri(&format!("/{id}")), Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = call(&app, "GET", &shares_uri(""), Some("alice"), None).await;
    assert!(data(&body).as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_share_validation() {
    let (app, _) = app().await;

    let cases = [
        ("bob", json!({ "file_id": 10, "share_type": 3 }), StatusCode::FORBIDDEN),
        (
            "alice",
            json!({ "file_id": 10, "share_type": 0, "share_with": "alice" }),
            StatusCode::BAD_REQUEST,
        ),
        (
            "alice",
            json!({ "file_id": 10, "share_type": 0, "share_with": "nobody" }),
            StatusCode::NOT_FOUND,
        ),
        ("alice", json!({ "file_id": 10, "share_type": 2 }), StatusCode::BAD_REQUEST),
        ("alice", json!({ "file_id": 99, "share_type": 3 }), StatusCode::NOT_FOUND),
        (
            "alice",
            json!({ "file_id": 10, "share_type": 3, "permissions": 2 }),
            StatusCode::BAD_REQUEST,
        ),
    ];
    for (uid, body, expected) in cases {
        let (status, _) = call(&app, "POST", &shares_uri(""), Some(uid), Some(body.clone())).await;
        assert_eq!(status, expected, "{uid} {body}");
    }
}

#[tokio::test]
async fn test_admin_endpoints() {
    let (app, _) = app().await;
    let users = format!("{CLOUD_PREFIX}/users");

    let carol = json!({ "uid": "carol", "password": PASSWORD, "display_name": "Carol" });
    let (status, _) = call(&app, "POST", &users, Some("alice"), Some(carol.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(&app, "POST", &users, Some("admin"), Some(carol)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)["displayname"], "Carol");

    let (status, _) = call(
        &app,
        "POST",
        &format!("{CLOUD_PREFIX}/groups"),
        Some("admin"),
        Some(json!({ "gid": "staff" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(
        &app,
        "POST",
        &format!("{users}/carol/groups"),
        Some("admin"),
        Some(json!({ "gid": "staff" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "GET", &format!("{users}/carol/groups"), Some("carol"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(data(&body)[0]["id"], "staff");
    let (status, _) = call(&app, "GET", &format!("{users}/carol"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("{users}/carol/groups/staff"),
        Some("admin"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, "DELETE", &format!("{users}/carol"), Some("admin"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, "GET", &format!("{users}/carol"), Some("admin"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
