//! Server plugins.
//!
//! The factory registers the request-level plugins (guards, authentication,
//! locking, logging); [`ViewSetupPlugin`] attaches the file plugins once
//! the filesystem view is known.

pub mod checksum;
pub mod comments;
pub mod custom_properties;
pub mod exception_logger;
pub mod files;
pub mod files_report;
pub mod guard;
pub mod locking;
pub mod quota;
pub mod response;
pub mod shares;
pub mod tags;
pub mod view_only;
pub mod view_setup;

pub use checksum::ChecksumUpdatePlugin;
pub use comments::{CommentCounter, CommentPropertiesPlugin, NoComments};
pub use custom_properties::CustomPropertiesPlugin;
pub use exception_logger::ExceptionLoggerPlugin;
pub use files::FilesPlugin;
pub use files_report::FilesReportPlugin;
pub use guard::{AnonymousOptionsPlugin, BlockLegacyClientPlugin, MaintenancePlugin};
pub use locking::{FakeLockerPlugin, LockPlugin};
pub use quota::QuotaPlugin;
pub use response::{
    BrowserErrorPagePlugin, CopyEtagHeaderPlugin, DummyGetResponsePlugin, RequestIdHeaderPlugin,
};
pub use shares::SharesPlugin;
pub use tags::TagsPlugin;
pub use view_only::ViewOnlyPlugin;
pub use view_setup::ViewSetupPlugin;
