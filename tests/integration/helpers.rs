//! Shared test helpers for integration tests.
//!
//! Every test gets its own in-memory backends, a temporary data directory
//! and one `ShareProvider` shared by the HTTP API and the WebDAV servers.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use http::{Request, Response, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use nimbus_api::AppState;
use nimbus_auth::PasswordHasher;
use nimbus_core::config::AppConfig;
use nimbus_database::memory::{
    MemoryDirectory, MemoryNodeLookup, MemoryPropertyStore, MemorySystemTags, MemoryTagStore,
};
use nimbus_database::traits::{GroupBackend, UserBackend};
use nimbus_dav::{DavListener, DavServices, ServerFactory};
use nimbus_entity::node::Node;
use nimbus_entity::share::NodeType;
use nimbus_entity::user::{Group, User};
use nimbus_service::{Backends, L10nFactory, MemoryMailer, ShareNotifier, ShareProvider};

pub const PASSWORD: &str = "secret";
pub const SHARES: &str = "/ocs/v2.php/apps/files_sharing/api/v1/shares";
pub const CLOUD: &str = "/ocs/v2.php/cloud";

/// Test application context
pub struct TestApp {
    /// The Axum router for making API requests
    pub router: Router,
    /// WebDAV server factory over the same backends
    pub dav: ServerFactory,
    pub directory: Arc<MemoryDirectory>,
    pub nodes: Arc<MemoryNodeLookup>,
    pub mailer: Arc<MemoryMailer>,
    /// Root of the WebDAV data directory
    pub data: tempfile::TempDir,
}

/// Decoded API response
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    /// The `ocs.data` member of the envelope.
    pub fn data(&self) -> &Value {
        &self.body["ocs"]["data"]
    }
}

impl TestApp {
    /// Create a new test application with accounts `admin`, `alice` and
    /// `bob`. `admin` is a member of the `admin` group.
    pub async fn new() -> Self {
        let data = tempfile::tempdir().expect("Failed to create data directory");
        let (backends, directory, nodes) = Backends::memory();

        let config: AppConfig = serde_json::from_value(json!({
            "server": { "public_url": "https://cloud.example" },
            "database": { "url": "postgres://localhost/nimbus_test" },
            "dav": { "data_dir": data.path().to_string_lossy() },
        }))
        .expect("Failed to build test config");

        let mailer = Arc::new(MemoryMailer::new());
        let notifier = Arc::new(ShareNotifier::new(
            backends.users.clone(),
            mailer.clone(),
            L10nFactory::new(),
            config.mail.clone(),
            config.server.public_url.clone(),
        ));
        let shares = Arc::new(ShareProvider::new(
            backends.clone(),
            config.sharing.clone(),
            notifier,
        ));

        let services = DavServices::new(
            config.dav.clone(),
            config.sharing.clone(),
            shares.clone(),
            backends.users.clone(),
            backends.nodes.clone(),
            Arc::new(MemoryPropertyStore::new()),
            Arc::new(MemoryTagStore::new()),
            Arc::new(MemorySystemTags::new()),
        );
        let dav = ServerFactory::new(services);
        let router = nimbus_api::build_app(AppState::new(config, backends, shares));

        let app = Self {
            router,
            dav,
            directory,
            nodes,
            mailer,
            data,
        };
        app.seed().await;
        app
    }

    async fn seed(&self) {
        let hash = PasswordHasher::new()
            .hash(PASSWORD)
            .expect("Failed to hash password");
        for uid in ["admin", "alice", "bob"] {
            let mut user = User::new(uid);
            user.email = Some(format!("{uid}@example.com"));
            user.password_hash = Some(hash.clone());
            UserBackend::save(self.directory.as_ref(), &user)
                .await
                .expect("Failed to save user");
        }
        GroupBackend::save(self.directory.as_ref(), &Group::new("admin"))
            .await
            .expect("Failed to save group");
        self.directory
            .add_member("admin", "admin")
            .await
            .expect("Failed to add admin");
    }

    /// Registers a folder of `owner` and creates it on disk.
    pub async fn create_folder(&self, id: i64, owner: &str, name: &str) -> std::path::PathBuf {
        let path = self.data.path().join(owner).join("files").join(name);
        std::fs::create_dir_all(&path).expect("Failed to create folder");
        self.nodes
            .insert(Node {
                id,
                parent_id: Some(1),
                name: name.to_string(),
                path: format!("files/{name}"),
                storage_id: format!("home::{owner}"),
                node_type: NodeType::Folder,
                owner: owner.to_string(),
            })
            .await;
        path
    }

    /// Send an API request as `user` (Basic auth with the shared password).
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(uid) = user {
            builder = builder.header(header::AUTHORIZATION, basic(uid, PASSWORD));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        TestResponse {
            status,
            body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
        }
    }

    /// Send a WebDAV request through the listener's routing.
    pub async fn dav_request(
        &self,
        method: &str,
        uri: &str,
        headers: &[(&'static str, String)],
        body: &str,
    ) -> Response<Bytes> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        let request = builder
            .body(Bytes::from(body.to_string()))
            .expect("Failed to build request");
        DavListener::dispatch(&self.dav, request).await
    }
}

pub fn basic(uid: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{uid}:{password}")))
}
