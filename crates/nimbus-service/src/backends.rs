//! Storage collaborators shared by the services.

use std::sync::Arc;

use nimbus_database::memory::{MemoryDirectory, MemoryNodeLookup, MemoryShareStore};
use nimbus_database::repositories::{
    PgGroupBackend, PgKnownUserStore, PgNodeLookup, PgShareStore, PgUserBackend,
};
use nimbus_database::traits::{GroupBackend, KnownUserStore, NodeLookup, ShareStore, UserBackend};
use nimbus_database::DatabasePool;

/// Handles to every storage backend a service may consult.
#[derive(Debug, Clone)]
pub struct Backends {
    pub shares: Arc<dyn ShareStore>,
    pub users: Arc<dyn UserBackend>,
    pub groups: Arc<dyn GroupBackend>,
    pub known_users: Arc<dyn KnownUserStore>,
    pub nodes: Arc<dyn NodeLookup>,
}

impl Backends {
    /// PostgreSQL-backed stores over one pool.
    pub fn postgres(db: &DatabasePool) -> Self {
        let pool = db.pool().clone();
        Self {
            shares: Arc::new(PgShareStore::new(pool.clone())),
            users: Arc::new(PgUserBackend::new(pool.clone())),
            groups: Arc::new(PgGroupBackend::new(pool.clone())),
            known_users: Arc::new(PgKnownUserStore::new(pool.clone())),
            nodes: Arc::new(PgNodeLookup::new(pool)),
        }
    }

    /// In-memory stores. The directory and node lookup are returned as well
    /// so callers can seed them.
    pub fn memory() -> (Self, Arc<MemoryDirectory>, Arc<MemoryNodeLookup>) {
        let directory = Arc::new(MemoryDirectory::new());
        let nodes = Arc::new(MemoryNodeLookup::new());
        let backends = Self {
            shares: Arc::new(MemoryShareStore::new()),
            users: directory.clone(),
            groups: directory.clone(),
            known_users: directory.clone(),
            nodes: nodes.clone(),
        };
        (backends, directory, nodes)
    }
}
