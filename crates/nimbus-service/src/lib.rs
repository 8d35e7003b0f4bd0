//! # nimbus-service
//!
//! Business logic for Nimbus. The [`ShareProvider`] persists and resolves
//! user, group and link shares over the storage traits of
//! `nimbus-database`; [`AccountService`] cascades account and group
//! removals into share cleanup.
//!
//! Services take their collaborators at construction time through
//! [`Backends`] and `Arc` references.

pub mod account;
pub mod backends;
pub mod context;
pub mod l10n;
pub mod mail;
pub mod share;

pub use account::{AccountService, CreateUserRequest};
pub use backends::Backends;
pub use context::RequestContext;
pub use l10n::{L10nFactory, Translator};
pub use mail::{EmailTemplate, LogMailer, MailMessage, Mailbox, Mailer, MemoryMailer};
pub use share::{ShareNotifier, ShareProvider, TokenGenerator};
