//! Request handlers, grouped by domain.

pub mod admin;
pub mod health;
pub mod share;
