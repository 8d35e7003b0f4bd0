//! Administrative account and group management.
//!
//! Removing an account, a group or a membership cascades into share cleanup
//! so that no share row keeps pointing at something that is gone.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use nimbus_auth::password::PasswordHasher;
use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_entity::share::ShareType;
use nimbus_entity::user::{Group, User};

use crate::backends::Backends;
use crate::context::RequestContext;
use crate::share::ShareProvider;

/// Request to create an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    /// Unique uid.
    pub uid: String,
    /// Initial password.
    pub password: String,
    /// Display name.
    pub display_name: Option<String>,
    /// Primary email.
    pub email: Option<String>,
    /// Preferred language.
    pub language: Option<String>,
}

/// Handles account and group administration.
#[derive(Debug, Clone)]
pub struct AccountService {
    backends: Backends,
    shares: Arc<ShareProvider>,
    hasher: Arc<PasswordHasher>,
}

impl AccountService {
    pub fn new(backends: Backends, shares: Arc<ShareProvider>, hasher: Arc<PasswordHasher>) -> Self {
        Self {
            backends,
            shares,
            hasher,
        }
    }

    /// Lists every account.
    pub async fn list_users(&self, ctx: &RequestContext) -> AppResult<Vec<User>> {
        require_admin(ctx)?;
        self.backends.users.list().await
    }

    /// Creates an account with an Argon2 password hash.
    pub async fn create_user(&self, ctx: &RequestContext, req: CreateUserRequest) -> AppResult<User> {
        require_admin(ctx)?;

        let uid = req.uid.trim();
        if uid.is_empty() || uid.contains('/') {
            return Err(AppError::validation("Invalid uid"));
        }
        if req.password.is_empty() {
            return Err(AppError::validation("Password cannot be empty"));
        }
        if self.backends.users.exists(uid).await? {
            return Err(AppError::conflict(format!("User \"{uid}\" already exists")));
        }

        let mut user = User::new(uid);
        if let Some(name) = req.display_name {
            user.display_name = name;
        }
        user.email = req.email.filter(|e| !e.is_empty());
        user.language = req.language;
        user.password_hash = Some(self.hasher.hash(&req.password)?);
        self.backends.users.save(&user).await?;

        info!(admin = %ctx.uid, uid = %user.uid, "User created");
        Ok(user)
    }

    /// Deletes an account and every share it owns, sent or received.
    pub async fn delete_user(&self, ctx: &RequestContext, uid: &str) -> AppResult<()> {
        require_admin(ctx)?;
        if !self.backends.users.exists(uid).await? {
            return Err(AppError::not_found(format!("User \"{uid}\" not found")));
        }

        let mut removed = 0;
        for share_type in [ShareType::User, ShareType::Group, ShareType::Link] {
            removed += self.shares.user_deleted(uid, share_type).await?;
        }
        self.backends.users.delete(uid).await?;

        info!(admin = %ctx.uid, uid = %uid, shares = removed, "User deleted");
        Ok(())
    }

    /// Creates an empty group.
    pub async fn create_group(
        &self,
        ctx: &RequestContext,
        gid: &str,
        display_name: Option<String>,
    ) -> AppResult<Group> {
        require_admin(ctx)?;
        let gid = gid.trim();
        if gid.is_empty() {
            return Err(AppError::validation("Invalid group id"));
        }
        if self.backends.groups.get(gid).await?.is_some() {
            return Err(AppError::conflict(format!("Group \"{gid}\" already exists")));
        }

        let mut group = Group::new(gid);
        if let Some(name) = display_name.filter(|n| !n.is_empty()) {
            group.display_name = name;
        }
        self.backends.groups.save(&group).await?;
        info!(admin = %ctx.uid, gid = %gid, "Group created");
        Ok(group)
    }

    /// Deletes a group together with the shares it received.
    pub async fn delete_group(&self, ctx: &RequestContext, gid: &str) -> AppResult<()> {
        require_admin(ctx)?;
        if self.backends.groups.get(gid).await?.is_none() {
            return Err(AppError::not_found(format!("Group \"{gid}\" not found")));
        }
        let removed = self.shares.group_deleted(gid).await?;
        self.backends.groups.delete(gid).await?;
        info!(admin = %ctx.uid, gid = %gid, shares = removed, "Group deleted");
        Ok(())
    }

    pub async fn add_user_to_group(&self, ctx: &RequestContext, uid: &str, gid: &str) -> AppResult<()> {
        require_admin(ctx)?;
        if !self.backends.users.exists(uid).await? {
            return Err(AppError::not_found(format!("User \"{uid}\" not found")));
        }
        if self.backends.groups.get(gid).await?.is_none() {
            return Err(AppError::not_found(format!("Group \"{gid}\" not found")));
        }
        self.backends.groups.add_member(gid, uid).await?;
        info!(admin = %ctx.uid, uid = %uid, gid = %gid, "User added to group");
        Ok(())
    }

    /// Removes a membership and cleans up the shares that depended on it.
    pub async fn remove_user_from_group(
        &self,
        ctx: &RequestContext,
        uid: &str,
        gid: &str,
    ) -> AppResult<()> {
        require_admin(ctx)?;
        if !self.backends.groups.remove_member(gid, uid).await? {
            return Err(AppError::not_found(format!(
                "User \"{uid}\" is not a member of \"{gid}\""
            )));
        }
        let removed = self.shares.user_deleted_from_group(uid, gid).await?;
        info!(admin = %ctx.uid, uid = %uid, gid = %gid, shares = removed, "User removed from group");
        Ok(())
    }
}

fn require_admin(ctx: &RequestContext) -> AppResult<()> {
    if ctx.is_admin {
        Ok(())
    } else {
        Err(AppError::authorization("Administrator privileges required"))
    }
}
