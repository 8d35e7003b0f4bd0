//! # nimbus-dav
//!
//! WebDAV endpoint for Nimbus. A [`ServerFactory`] assembles one
//! [`DavServer`] per request with its plugin chain: authentication, the
//! filesystem [`View`] resolved once the caller is known, and the file,
//! quota, tag, share, comment and custom-property plugins layered on top.
//!
//! The [`principal`] module maps DAV principals onto accounts and groups.

pub mod auth;
pub mod error;
pub mod listener;
pub mod methods;
pub mod plugins;
pub mod principal;
pub mod properties;
pub mod server;
pub mod view;

pub use error::{DavError, DavResult};
pub use listener::DavListener;
pub use principal::PrincipalBackend;
pub use server::factory::{DavServices, ServerFactory};
pub use server::{DavContext, DavRequest, DavResponse, DavServer, Flow, ServerPlugin};
pub use view::{DavEntry, View, ViewResolver};
