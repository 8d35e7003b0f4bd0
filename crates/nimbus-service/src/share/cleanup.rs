//! Share cleanup when accounts, groups or memberships go away.

use std::collections::BTreeSet;

use tracing::{error, info};

use nimbus_core::result::AppResult;
use nimbus_entity::share::{ShareFilter, ShareType, UserFilter};

use super::provider::ShareProvider;

/// Number of parent ids per delete when removing member overrides.
const PARENT_CHUNK: usize = 100;

impl ShareProvider {
    /// Remove the shares of one type tied to a deleted account. Returns the
    /// number of rows removed.
    ///
    /// - `User`: user shares owned by or sent to the account
    /// - `Group`: group shares and overrides it owns, and overrides it received
    /// - `Link`: link shares it owns or initiated
    pub async fn user_deleted(&self, uid: &str, share_type: ShareType) -> AppResult<u64> {
        let shares = &self.backends.shares;
        let removed = match share_type {
            ShareType::User => {
                let owned = ShareFilter::new()
                    .share_type(ShareType::User)
                    .user(UserFilter::Owner(uid.to_string()));
                let received = ShareFilter::new()
                    .share_type(ShareType::User)
                    .share_with(uid);
                shares.delete(&owned).await? + shares.delete(&received).await?
            }
            ShareType::Group => {
                let owned = ShareFilter::new()
                    .share_types(&[ShareType::Group, ShareType::UserGroup])
                    .user(UserFilter::Owner(uid.to_string()));
                let received = ShareFilter::new()
                    .share_type(ShareType::UserGroup)
                    .share_with(uid);
                shares.delete(&owned).await? + shares.delete(&received).await?
            }
            ShareType::Link => {
                let owned = ShareFilter::new()
                    .share_type(ShareType::Link)
                    .user(UserFilter::OwnerOrInitiator(uid.to_string()));
                shares.delete(&owned).await?
            }
            ShareType::UserGroup => {
                error!(
                    uid = %uid,
                    share_type = %share_type,
                    "Share provider cannot delete all shares of this type"
                );
                return Ok(0);
            }
        };
        info!(uid = %uid, share_type = %share_type, rows = removed, "Removed shares of deleted user");
        Ok(removed)
    }

    /// Remove every share received by a deleted group, together with the
    /// member overrides below them.
    pub async fn group_deleted(&self, gid: &str) -> AppResult<u64> {
        let group_shares = ShareFilter::new()
            .share_type(ShareType::Group)
            .share_with(gid);
        let ids = self.group_share_ids(&group_shares).await?;

        let mut removed = 0;
        for chunk in ids.chunks(PARENT_CHUNK) {
            let overrides = ShareFilter::new()
                .share_type(ShareType::UserGroup)
                .parent_in(chunk.to_vec());
            removed += self.backends.shares.delete(&overrides).await?;
        }
        removed += self.backends.shares.delete(&group_shares).await?;

        info!(gid = %gid, rows = removed, "Removed shares of deleted group");
        Ok(removed)
    }

    /// Drop the overrides a former member had on the group's shares.
    ///
    /// When sharing is restricted to group members, direct user shares
    /// between the account and anyone it no longer shares a group with are
    /// deleted as well. Groups on the exclusion list do not count as shared.
    pub async fn user_deleted_from_group(&self, uid: &str, gid: &str) -> AppResult<u64> {
        let group_shares = ShareFilter::new()
            .share_type(ShareType::Group)
            .share_with(gid);
        let ids = self.group_share_ids(&group_shares).await?;

        let mut removed = 0;
        for chunk in ids.chunks(PARENT_CHUNK) {
            let overrides = ShareFilter::new()
                .share_type(ShareType::UserGroup)
                .share_with(uid)
                .parent_in(chunk.to_vec());
            removed += self.backends.shares.delete(&overrides).await?;
        }

        if !self.config.only_share_with_group_members {
            return Ok(removed);
        }
        if self.backends.users.get(uid).await?.is_none() {
            return Ok(removed);
        }
        let user_groups = self.restricting_groups(uid).await?;

        for share in self.get_shared_with(uid, ShareType::User, None, -1, 0).await? {
            if !self.backends.users.exists(&share.shared_by).await? {
                continue;
            }
            let owner_groups = self.restricting_groups(&share.shared_by).await?;
            if user_groups.is_disjoint(&owner_groups) {
                info!(
                    share_id = ?share.id(),
                    uid = %uid,
                    owner = %share.shared_by,
                    "Deleting received share, no common group left"
                );
                removed += self.delete(&share).await?;
            }
        }

        for share in self
            .get_shares_by(uid, ShareType::User, None, true, -1, 0)
            .await?
        {
            let recipient = share.shared_with.clone().unwrap_or_default();
            if !self.backends.users.exists(&recipient).await? {
                continue;
            }
            let recipient_groups = self.restricting_groups(&recipient).await?;
            if user_groups.is_disjoint(&recipient_groups) {
                info!(
                    share_id = ?share.id(),
                    uid = %uid,
                    recipient = %recipient,
                    "Deleting sent share, no common group left"
                );
                removed += self.delete(&share).await?;
            }
        }
        Ok(removed)
    }

    async fn group_share_ids(&self, filter: &ShareFilter) -> AppResult<Vec<i64>> {
        Ok(self
            .backends
            .shares
            .find(filter)
            .await?
            .into_iter()
            .map(|row| row.id)
            .collect())
    }

    /// Groups of an account that count for the group-members-only rule.
    async fn restricting_groups(&self, uid: &str) -> AppResult<BTreeSet<String>> {
        let excluded = &self.config.only_share_with_group_members_exclude_groups;
        Ok(self
            .backends
            .groups
            .user_group_ids(uid)
            .await?
            .into_iter()
            .filter(|g| !excluded.contains(g))
            .collect())
    }
}
