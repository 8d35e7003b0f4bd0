//! # nimbus-entity
//!
//! Domain entity models for Nimbus. Every struct in this crate represents a
//! database table row or a domain value object. Database rows additionally
//! derive `sqlx::FromRow`.

pub mod access;
pub mod node;
pub mod proxy;
pub mod share;
pub mod user;
