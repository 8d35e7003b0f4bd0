//! Filesystem view a DAV server instance operates on.
//!
//! A [`View`] is rooted at a local directory (an account's `files/` tree) or
//! at a shared node inside another account's tree. Paths handed to a view
//! are relative to that root, `/`-separated and already percent-decoded.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::debug;

use nimbus_database::traits::NodeLookup;
use nimbus_entity::node::HOME_STORAGE_PREFIX;
use nimbus_entity::share::{Permissions, Share};

use crate::error::{DavError, DavResult};
use crate::server::DavContext;

/// Content type reported for collections.
pub const DIRECTORY_MIME: &str = "httpd/unix-directory";

/// Metadata of one file or collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavEntry {
    /// Path relative to the view root, empty for the root itself.
    pub path: String,
    pub name: String,
    pub is_collection: bool,
    /// Content length in bytes (0 for collections)
    pub size: u64,
    pub content_type: String,
    pub modified: DateTime<Utc>,
    pub created: DateTime<Utc>,
    /// Unquoted entity tag derived from mtime and size.
    pub etag: String,
}

/// A rooted file tree with the permissions the caller holds on it.
#[derive(Debug, Clone)]
pub struct View {
    root: PathBuf,
    owner: String,
    storage_id: String,
    storage_path: String,
    permissions: Permissions,
    quota: Option<u64>,
    share: Option<Share>,
}

impl View {
    /// Full-access view of an account's home `files/` tree.
    pub fn home(root: impl Into<PathBuf>, owner: impl Into<String>, quota: Option<u64>) -> Self {
        let owner = owner.into();
        Self {
            root: root.into(),
            storage_id: format!("{HOME_STORAGE_PREFIX}{owner}"),
            storage_path: "files".to_string(),
            owner,
            permissions: Permissions::ALL,
            quota,
            share: None,
        }
    }

    /// View on a shared node, limited to the share's permissions.
    pub fn shared(root: impl Into<PathBuf>, share: Share, storage_id: String, path: String) -> Self {
        Self {
            root: root.into(),
            owner: share.share_owner.clone(),
            storage_id,
            storage_path: path,
            permissions: share.permissions,
            quota: None,
            share: Some(share),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn storage_id(&self) -> &str {
        &self.storage_id
    }

    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    pub fn quota(&self) -> Option<u64> {
        self.quota
    }

    pub fn share(&self) -> Option<&Share> {
        self.share.as_ref()
    }

    /// Fail with 403 unless the view grants `permission`.
    pub fn require(&self, permission: Permissions, action: &str) -> DavResult<()> {
        if self.permissions.contains(permission) {
            Ok(())
        } else {
            Err(DavError::forbidden(format!("No permission to {action}")))
        }
    }

    /// Storage path of a view path, e.g. `files/docs/a.txt`.
    pub fn storage_path(&self, path: &str) -> String {
        let path = normalize(path);
        match (self.storage_path.is_empty(), path.is_empty()) {
            (_, true) => self.storage_path.clone(),
            (true, false) => path,
            (false, false) => format!("{}/{}", self.storage_path, path),
        }
    }

    /// View path of a storage path, `None` when outside this view.
    pub fn view_path(&self, storage_path: &str) -> Option<String> {
        if self.storage_path.is_empty() {
            return Some(storage_path.to_string());
        }
        if storage_path == self.storage_path {
            return Some(String::new());
        }
        storage_path
            .strip_prefix(&self.storage_path)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
    }

    /// Local filesystem path, refusing segments that would escape the root.
    pub fn local_path(&self, path: &str) -> DavResult<PathBuf> {
        let mut full = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." || segment.contains(|c| c == '\\' || c == '\0') {
                return Err(DavError::forbidden(format!("Invalid path segment \"{segment}\"")));
            }
            full.push(segment);
        }
        Ok(full)
    }

    pub async fn entry(&self, path: &str) -> DavResult<Option<DavEntry>> {
        let local = self.local_path(path)?;
        match fs::metadata(&local).await {
            Ok(meta) => Ok(Some(self.entry_from(normalize(path), &meta))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Like [`View::entry`] but 404 when missing.
    pub async fn require_entry(&self, path: &str) -> DavResult<DavEntry> {
        self.entry(path)
            .await?
            .ok_or_else(|| DavError::not_found(format!("File not found: {}", normalize(path))))
    }

    /// Direct children of a collection, sorted by name.
    pub async fn children(&self, path: &str) -> DavResult<Vec<DavEntry>> {
        let local = self.local_path(path)?;
        let base = normalize(path);
        if !fs::metadata(&local).await?.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&local).await?;
        while let Some(item) = dir.next_entry().await? {
            let name = item.file_name().to_string_lossy().into_owned();
            let meta = item.metadata().await?;
            entries.push(self.entry_from(join(&base, &name), &meta));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    pub async fn read(&self, path: &str) -> DavResult<Bytes> {
        Ok(Bytes::from(fs::read(self.local_path(path)?).await?))
    }

    /// Write a file, returning whether it was newly created.
    pub async fn write(&self, path: &str, data: &[u8]) -> DavResult<bool> {
        let local = self.local_path(path)?;
        let created = fs::metadata(&local).await.is_err();
        fs::write(&local, data).await?;
        debug!(path = %normalize(path), size = data.len(), created, "File written");
        Ok(created)
    }

    pub async fn mkdir(&self, path: &str) -> DavResult<()> {
        fs::create_dir(self.local_path(path)?).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> DavResult<()> {
        let local = self.local_path(path)?;
        if fs::metadata(&local).await?.is_dir() {
            fs::remove_dir_all(&local).await?;
        } else {
            fs::remove_file(&local).await?;
        }
        Ok(())
    }

    /// Copy a file or a whole collection.
    pub async fn copy(&self, from: &str, to: &str) -> DavResult<()> {
        let source = self.local_path(from)?;
        let target = self.local_path(to)?;
        if !fs::metadata(&source).await?.is_dir() {
            fs::copy(&source, &target).await?;
            return Ok(());
        }

        let mut pending = vec![(source, target)];
        while let Some((src, dst)) = pending.pop() {
            fs::create_dir(&dst).await?;
            let mut dir = fs::read_dir(&src).await?;
            while let Some(item) = dir.next_entry().await? {
                let child_dst = dst.join(item.file_name());
                if item.file_type().await?.is_dir() {
                    pending.push((item.path(), child_dst));
                } else {
                    fs::copy(item.path(), child_dst).await?;
                }
            }
        }
        Ok(())
    }

    pub async fn rename(&self, from: &str, to: &str) -> DavResult<()> {
        fs::rename(self.local_path(from)?, self.local_path(to)?).await?;
        Ok(())
    }

    /// Total size of the files below `path`.
    pub async fn size_of(&self, path: &str) -> DavResult<u64> {
        let local = self.local_path(path)?;
        let meta = match fs::metadata(&local).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        if !meta.is_dir() {
            return Ok(meta.len());
        }

        let mut total = 0;
        let mut pending = vec![local];
        while let Some(dir_path) = pending.pop() {
            let mut dir = fs::read_dir(&dir_path).await?;
            while let Some(item) = dir.next_entry().await? {
                let meta = item.metadata().await?;
                if meta.is_dir() {
                    pending.push(item.path());
                } else {
                    total += meta.len();
                }
            }
        }
        Ok(total)
    }

    /// Bytes left under the quota, `None` when unlimited.
    pub async fn free_space(&self) -> DavResult<Option<u64>> {
        match self.quota {
            Some(quota) => Ok(Some(quota.saturating_sub(self.size_of("").await?))),
            None => Ok(None),
        }
    }

    fn entry_from(&self, path: String, meta: &std::fs::Metadata) -> DavEntry {
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let created = meta.created().unwrap_or(modified);
        let name = match path.rsplit('/').next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self
                .root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let is_collection = meta.is_dir();
        let size = if is_collection { 0 } else { meta.len() };
        let content_type = if is_collection {
            DIRECTORY_MIME.to_string()
        } else {
            mime_guess::from_path(&name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        };
        let nanos = modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        DavEntry {
            path,
            name,
            is_collection,
            size,
            content_type,
            modified: DateTime::<Utc>::from(modified),
            created: DateTime::<Utc>::from(created),
            etag: format!("{nanos:x}-{:x}", meta.len()),
        }
    }
}

/// Trim slashes and collapse empty segments.
pub fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a parent path and a child name.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Parent path and base name of a view path.
pub fn split_parent(path: &str) -> (String, String) {
    let path = normalize(path);
    match path.rsplit_once('/') {
        Some((parent, name)) => (parent.to_string(), name.to_string()),
        None => (String::new(), path),
    }
}

/// Resolves the view of a request once the caller is authenticated.
#[async_trait]
pub trait ViewResolver: Send + Sync + std::fmt::Debug {
    async fn resolve(&self, ctx: &DavContext) -> DavResult<View>;
}

/// Home tree of the authenticated account: `<data_dir>/<uid>/files`.
#[derive(Debug, Clone)]
pub struct HomeViewResolver {
    data_dir: PathBuf,
    quota: Option<u64>,
    /// Account named in the request URL, if any.
    url_owner: Option<String>,
}

impl HomeViewResolver {
    pub fn new(data_dir: impl Into<PathBuf>, quota: Option<u64>, url_owner: Option<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            quota,
            url_owner,
        }
    }
}

#[async_trait]
impl ViewResolver for HomeViewResolver {
    async fn resolve(&self, ctx: &DavContext) -> DavResult<View> {
        let user = ctx
            .user
            .as_ref()
            .ok_or_else(|| DavError::forbidden("No authenticated account"))?;
        if let Some(owner) = &self.url_owner {
            if owner != &user.uid {
                return Err(DavError::forbidden(format!(
                    "Account \"{}\" may not access the files of \"{owner}\"",
                    user.uid
                )));
            }
        }

        let root = self.data_dir.join(&user.uid).join("files");
        fs::create_dir_all(&root).await?;
        Ok(View::home(root, user.uid.clone(), self.quota))
    }
}

/// Tree below the node of the link share set by public-share auth.
#[derive(Debug, Clone)]
pub struct ShareViewResolver {
    data_dir: PathBuf,
    nodes: Arc<dyn NodeLookup>,
}

impl ShareViewResolver {
    pub fn new(data_dir: impl Into<PathBuf>, nodes: Arc<dyn NodeLookup>) -> Self {
        Self {
            data_dir: data_dir.into(),
            nodes,
        }
    }
}

#[async_trait]
impl ViewResolver for ShareViewResolver {
    async fn resolve(&self, ctx: &DavContext) -> DavResult<View> {
        let share = ctx
            .share
            .clone()
            .ok_or_else(|| DavError::not_found("No share for this request"))?;

        let node = match share.node() {
            Some(node) => node.clone(),
            None => {
                let node_id = share
                    .node_id()
                    .ok_or_else(|| DavError::not_found("Share has no node"))?;
                self.nodes
                    .get_by_id(node_id)
                    .await?
                    .ok_or_else(|| DavError::not_found("Shared file is gone"))?
            }
        };

        let mut root = self.data_dir.join(&node.owner);
        for segment in node.path.split('/').filter(|s| !s.is_empty()) {
            root.push(segment);
        }
        Ok(View::shared(root, share, node.storage_id, node.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(dir: &tempfile::TempDir) -> View {
        View::home(dir.path(), "alice", Some(100))
    }

    #[test]
    fn test_paths() {
        assert_eq!(normalize("/a//b/"), "a/b");
        assert_eq!(join("", "a"), "a");
        assert_eq!(split_parent("a/b/c.txt"), ("a/b".into(), "c.txt".into()));
        assert_eq!(split_parent("c.txt"), ("".into(), "c.txt".into()));
    }

    #[test]
    fn test_storage_path_mapping() {
        let view = View::home("/tmp/none", "alice", None);
        assert_eq!(view.storage_id(), "home::alice");
        assert_eq!(view.storage_path(""), "files");
        assert_eq!(view.storage_path("/docs/a.txt"), "files/docs/a.txt");
        assert_eq!(view.view_path("files/docs"), Some("docs".into()));
        assert_eq!(view.view_path("files"), Some(String::new()));
        assert_eq!(view.view_path("files_trashbin/x"), None);
    }

    #[test]
    fn test_local_path_rejects_traversal() {
        let view = View::home("/srv/alice/files", "alice", None);
        assert!(view.local_path("a/../../etc").is_err());
        assert_eq!(
            view.local_path("/a/b.txt").unwrap(),
            PathBuf::from("/srv/alice/files/a/b.txt")
        );
    }

    #[tokio::test]
    async fn test_write_read_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let view = view(&dir);
        view.mkdir("docs").await.unwrap();
        assert!(view.write("docs/a.txt", b"hello").await.unwrap());
        assert!(!view.write("docs/a.txt", b"hello!").await.unwrap());

        let entry = view.require_entry("docs/a.txt").await.unwrap();
        assert_eq!(entry.size, 6);
        assert_eq!(entry.content_type, "text/plain");
        assert!(!entry.is_collection);

        let children = view.children("docs").await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].path, "docs/a.txt");
        assert_eq!(&view.read("docs/a.txt").await.unwrap()[..], b"hello!");
        assert!(view.entry("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_copy_tree_and_quota() {
        let dir = tempfile::tempdir().unwrap();
        let view = view(&dir);
        view.mkdir("a").await.unwrap();
        view.mkdir("a/b").await.unwrap();
        view.write("a/b/c.bin", &[0u8; 30]).await.unwrap();

        view.copy("a", "copy").await.unwrap();
        assert!(view.entry("copy/b/c.bin").await.unwrap().is_some());
        assert_eq!(view.size_of("").await.unwrap(), 60);
        assert_eq!(view.free_space().await.unwrap(), Some(40));

        view.delete("a").await.unwrap();
        assert_eq!(view.free_space().await.unwrap(), Some(70));
    }
}
