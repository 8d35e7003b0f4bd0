//! Circles: user-managed teams exposed as principals.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use nimbus_core::result::AppResult;

/// A circle as seen by the principal backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circle {
    pub single_id: String,
    pub display_name: String,
}

/// Source of circles and their memberships.
#[async_trait]
pub trait CircleBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Circle by its unique id.
    async fn details(&self, circle_id: &str) -> AppResult<Option<Circle>>;

    /// Circles an account has joined.
    async fn joined_circles(&self, uid: &str) -> AppResult<Vec<Circle>>;
}

/// Backend used when the circles app is not installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCircles;

#[async_trait]
impl CircleBackend for NoCircles {
    async fn details(&self, _circle_id: &str) -> AppResult<Option<Circle>> {
        Ok(None)
    }

    async fn joined_circles(&self, _uid: &str) -> AppResult<Vec<Circle>> {
        Ok(Vec::new())
    }
}

/// Circles held in memory.
#[derive(Debug, Default)]
pub struct MemoryCircles {
    circles: RwLock<BTreeMap<String, (Circle, BTreeSet<String>)>>,
}

impl MemoryCircles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a circle with its members.
    pub async fn insert(&self, circle: Circle, members: &[&str]) {
        let members = members.iter().map(|m| m.to_string()).collect();
        self.circles
            .write()
            .await
            .insert(circle.single_id.clone(), (circle, members));
    }
}

#[async_trait]
impl CircleBackend for MemoryCircles {
    async fn details(&self, circle_id: &str) -> AppResult<Option<Circle>> {
        Ok(self
            .circles
            .read()
            .await
            .get(circle_id)
            .map(|(circle, _)| circle.clone()))
    }

    async fn joined_circles(&self, uid: &str) -> AppResult<Vec<Circle>> {
        Ok(self
            .circles
            .read()
            .await
            .values()
            .filter(|(_, members)| members.contains(uid))
            .map(|(circle, _)| circle.clone())
            .collect())
    }
}
