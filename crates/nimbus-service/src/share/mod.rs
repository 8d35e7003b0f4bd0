//! Share persistence and resolution.
//!
//! [`ShareProvider`] is the only component that reads or writes the share
//! relation. Its operations are split by concern:
//!
//! - `provider`: creation, updates, per-recipient state and lookups
//! - `cleanup`: reactions to removed accounts, groups and memberships
//! - `access`: who can reach a set of nodes through shares
//! - `notify`: notification mails for new shares and note changes

mod access;
mod cleanup;
pub mod notify;
pub mod provider;
pub mod token;

pub use notify::ShareNotifier;
pub use provider::{ShareProvider, normalize_path};
pub use token::TokenGenerator;

#[cfg(test)]
mod tests;
