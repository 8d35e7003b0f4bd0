//! In-memory backends for tests and single-process development servers.

pub mod directory;
pub mod node;
pub mod property;
pub mod proxy;
pub mod share;
pub mod tag;

pub use directory::MemoryDirectory;
pub use node::MemoryNodeLookup;
pub use property::MemoryPropertyStore;
pub use proxy::MemoryProxyStore;
pub use share::MemoryShareStore;
pub use tag::{MemorySystemTags, MemoryTagStore};
