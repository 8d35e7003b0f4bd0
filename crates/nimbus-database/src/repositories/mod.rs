//! PostgreSQL implementations of the backend traits.

pub mod group;
pub mod known_user;
pub mod node;
pub mod property;
pub mod proxy;
pub mod share;
pub mod tag;
pub mod user;

pub use group::PgGroupBackend;
pub use known_user::PgKnownUserStore;
pub use node::PgNodeLookup;
pub use property::PgPropertyStore;
pub use proxy::PgProxyStore;
pub use share::PgShareStore;
pub use tag::{PgSystemTagMapper, PgTagStore};
pub use user::PgUserBackend;
