//! Notification mail composition and delivery.
//!
//! Delivery is behind the [`Mailer`] trait. [`LogMailer`] writes messages to
//! the log and [`MemoryMailer`] records them for inspection.

pub mod mailer;
pub mod message;
pub mod template;

pub use mailer::{LogMailer, Mailer, MemoryMailer};
pub use message::{MailMessage, Mailbox};
pub use template::EmailTemplate;
