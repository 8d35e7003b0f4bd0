//! # nimbus-database
//!
//! PostgreSQL connection management, the backend traits the share provider,
//! principal backend and DAV plugins are written against, and their
//! PostgreSQL and in-memory implementations.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod traits;

pub use connection::DatabasePool;
pub use traits::{
    FAVORITE_TAG, GroupBackend, KnownUserStore, NodeLookup, PropertyStore, ProxyStore,
    ShareStore, SystemTagMapper, TagStore, UserBackend,
};
