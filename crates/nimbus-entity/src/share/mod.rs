//! Share domain entities.

pub mod attributes;
pub mod kind;
pub mod model;
pub mod permissions;
pub mod query;
pub mod row;

pub use attributes::{ShareAttribute, ShareAttributes};
pub use kind::{NodeType, ShareStatus, ShareType};
pub use model::{Share, ShareError};
pub use permissions::Permissions;
pub use query::{ShareChanges, ShareFilter, UserFilter};
pub use row::{NewShareRow, ShareRow};

/// Identifier of the built-in share provider.
pub const PROVIDER_ID: &str = "ocinternal";
