//! WebDAV endpoint configuration.

use serde::{Deserialize, Serialize};

/// Settings for the WebDAV listener and its file tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DavConfig {
    /// Whether the WebDAV listener is started.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Bind port for the WebDAV listener.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URI the DAV tree is mounted under.
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
    /// Base URI for public link shares.
    #[serde(default = "default_public_base_uri")]
    pub public_base_uri: String,
    /// Directory holding per-user file trees (`<data_dir>/<uid>/files`).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Whether the circles companion app is available.
    #[serde(default)]
    pub circles_enabled: bool,
    /// Per-user quota in bytes, `None` for unlimited.
    #[serde(default)]
    pub quota_bytes: Option<u64>,
    /// Reject every DAV request with 503 while set.
    #[serde(default)]
    pub maintenance: bool,
    /// Oldest desktop client version (`mirall/x.y.z`) still accepted.
    #[serde(default = "default_minimum_desktop_version")]
    pub minimum_supported_desktop_version: String,
    /// Realm announced in Basic authentication challenges.
    #[serde(default = "default_auth_realm")]
    pub auth_realm: String,
}

impl Default for DavConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_port(),
            base_uri: default_base_uri(),
            public_base_uri: default_public_base_uri(),
            data_dir: default_data_dir(),
            circles_enabled: false,
            quota_bytes: None,
            maintenance: false,
            minimum_supported_desktop_version: default_minimum_desktop_version(),
            auth_realm: default_auth_realm(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    8081
}

fn default_base_uri() -> String {
    "/remote.php/dav".to_string()
}

fn default_public_base_uri() -> String {
    "/public.php/dav".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_minimum_desktop_version() -> String {
    "2.7.0".to_string()
}

fn default_auth_realm() -> String {
    "Nimbus".to_string()
}
