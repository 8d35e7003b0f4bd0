//! Share creation, updates, per-recipient state and lookups.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tracing::{error, info, warn};

use nimbus_core::config::sharing::SharingConfig;
use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;
use nimbus_entity::node::Node;
use nimbus_entity::share::{
    NewShareRow, PROVIDER_ID, Permissions, Share, ShareChanges, ShareFilter, ShareRow,
    ShareStatus, ShareType, UserFilter,
};
use nimbus_entity::user::User;

use super::notify::ShareNotifier;
use crate::backends::Backends;

/// Number of group ids per query when resolving group shares for an account.
const GROUP_CHUNK: usize = 1000;

/// Number of file ids per query when listing shares in a folder.
const FOLDER_CHUNK: usize = 1000;

/// Persists and resolves user, group and link shares.
///
/// Group shares are stored once; per-member state lives in user-group rows
/// whose `parent` is the group share. Only permissions, status and target
/// of such a row override the group share when it is resolved for that
/// member. A permission value of zero hides the share from the member.
#[derive(Debug, Clone)]
pub struct ShareProvider {
    pub(super) backends: Backends,
    pub(super) config: SharingConfig,
    pub(super) notifier: Arc<ShareNotifier>,
}

impl ShareProvider {
    pub fn new(backends: Backends, config: SharingConfig, notifier: Arc<ShareNotifier>) -> Self {
        Self {
            backends,
            config,
            notifier,
        }
    }

    /// Provider id stamped on every share this provider returns.
    pub fn identifier(&self) -> &'static str {
        PROVIDER_ID
    }

    pub fn config(&self) -> &SharingConfig {
        &self.config
    }

    /// Persist a new share and assign its id, provider id and creation time.
    ///
    /// Only user, group and link shares can be created. A link share must
    /// carry a token; user and group shares never store one.
    pub async fn create(&self, mut share: Share) -> AppResult<Share> {
        let node_id = share
            .node_id()
            .ok_or_else(|| AppError::validation("Share has no node"))?;
        let node_type = share
            .node_type()
            .ok_or_else(|| AppError::validation("Share has no node type"))?;
        let now = Utc::now();

        let mut row = NewShareRow {
            share_type: share.share_type.code(),
            uid_owner: share.share_owner.clone(),
            uid_initiator: Some(share.shared_by.clone()),
            item_type: node_type.as_str().to_string(),
            item_source: node_id.to_string(),
            file_source: Some(node_id),
            file_target: share.target.clone(),
            permissions: share.permissions.bits(),
            attributes: share.attributes.as_ref().and_then(|a| a.to_json()),
            note: (!share.note.is_empty()).then(|| share.note.clone()),
            stime: now.timestamp(),
            mail_send: true,
            ..NewShareRow::default()
        };

        match share.share_type {
            ShareType::User => {
                row.share_with = share.shared_with.clone();
                row.accepted = ShareStatus::Pending.code();
                row.expiration = share.expiration;
                row.reminder_sent = share.reminder_sent;
            }
            ShareType::Group => {
                row.share_with = share.shared_with.clone();
                row.expiration = share.expiration;
            }
            ShareType::Link => {
                let token = share
                    .token
                    .clone()
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| AppError::validation("Link share requires a token"))?;
                row.label = share.label.clone();
                row.token = Some(token);
                row.password = share.password.clone();
                row.password_by_talk = share.send_password_by_talk;
                row.expiration = share.expiration;
                row.parent = share.parent;
                row.hide_download = share.hide_download;
            }
            ShareType::UserGroup => return Err(AppError::provider("invalid share type!")),
        }

        let id = self.backends.shares.insert(row).await?;
        share.set_id(id.to_string())?;
        share.set_provider_id(PROVIDER_ID)?;
        share.share_time = Utc.timestamp_opt(now.timestamp(), 0).single();

        info!(
            share_id = id,
            share_type = %share.share_type,
            node_id = node_id,
            owner = %share.share_owner,
            "Share created"
        );
        Ok(share)
    }

    /// Write back a modified share.
    ///
    /// Group share changes are copied to the member override rows: owner,
    /// initiator, node, expiration and note always; permissions and
    /// attributes only where the member has not removed the share. A
    /// changed, non-empty note is mailed to the recipients.
    pub async fn update(&self, share: Share) -> AppResult<Share> {
        let id = share_id(&share)?;
        let original = self.get_share_by_id(id, None).await?;
        let node_id = share
            .node_id()
            .ok_or_else(|| AppError::validation("Share has no node"))?;
        let attributes = share.attributes.as_ref().and_then(|a| a.to_json());
        let note = (!share.note.is_empty()).then(|| share.note.clone());
        let by_id = ShareFilter::new().id(id);

        match share.share_type {
            ShareType::User => {
                let changes = ShareChanges {
                    share_with: Some(share.shared_with.clone()),
                    uid_owner: Some(share.share_owner.clone()),
                    uid_initiator: Some(Some(share.shared_by.clone())),
                    permissions: Some(share.permissions.bits()),
                    attributes: Some(attributes),
                    item_source: Some(node_id.to_string()),
                    file_source: Some(Some(node_id)),
                    expiration: Some(share.expiration),
                    note: Some(note),
                    accepted: Some(share.status.code()),
                    reminder_sent: Some(share.reminder_sent),
                    ..ShareChanges::default()
                };
                self.backends.shares.update(&by_id, &changes).await?;
            }
            ShareType::Group => {
                let base = ShareChanges {
                    uid_owner: Some(share.share_owner.clone()),
                    uid_initiator: Some(Some(share.shared_by.clone())),
                    permissions: Some(share.permissions.bits()),
                    attributes: Some(attributes.clone()),
                    item_source: Some(node_id.to_string()),
                    file_source: Some(Some(node_id)),
                    expiration: Some(share.expiration),
                    note: Some(note.clone()),
                    ..ShareChanges::default()
                };
                self.backends.shares.update(&by_id, &base).await?;

                let children = ShareFilter::new()
                    .parent(id)
                    .share_type(ShareType::UserGroup);
                let inherited = ShareChanges {
                    uid_owner: Some(share.share_owner.clone()),
                    uid_initiator: Some(Some(share.shared_by.clone())),
                    item_source: Some(node_id.to_string()),
                    file_source: Some(Some(node_id)),
                    expiration: Some(share.expiration),
                    note: Some(note),
                    ..ShareChanges::default()
                };
                self.backends.shares.update(&children, &inherited).await?;

                let visible = ShareFilter::new().parent(id).nonzero_permissions();
                let permissions = ShareChanges::new()
                    .permissions(share.permissions.bits())
                    .attributes(attributes);
                self.backends.shares.update(&visible, &permissions).await?;
            }
            ShareType::Link => {
                let token = share
                    .token
                    .clone()
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| AppError::validation("Link share requires a token"))?;
                let changes = ShareChanges {
                    password: Some(share.password.clone()),
                    password_by_talk: Some(share.send_password_by_talk),
                    uid_owner: Some(share.share_owner.clone()),
                    uid_initiator: Some(Some(share.shared_by.clone())),
                    permissions: Some(share.permissions.bits()),
                    attributes: Some(attributes),
                    item_source: Some(node_id.to_string()),
                    file_source: Some(Some(node_id)),
                    token: Some(Some(token)),
                    expiration: Some(share.expiration),
                    note: Some(note),
                    label: Some(share.label.clone()),
                    hide_download: Some(share.hide_download),
                    ..ShareChanges::default()
                };
                self.backends.shares.update(&by_id, &changes).await?;
            }
            ShareType::UserGroup => {}
        }

        if original.note != share.note && !share.note.is_empty() {
            self.propagate_note(&share).await?;
        }
        Ok(share)
    }

    /// Mark a share accepted for `recipient`. For group shares the member's
    /// override row is created first when missing.
    pub async fn accept_share(&self, mut share: Share, recipient: &str) -> AppResult<Share> {
        let id = share_id(&share)?;
        let target_id = match share.share_type {
            ShareType::Group => {
                if !self.ensure_group_member(&share, recipient).await? {
                    return Err(AppError::provider("Recipient not in receiving group"));
                }
                match self.find_member_override(id, recipient).await? {
                    Some(row) => row.id,
                    None => self.create_user_specific_group_share(&share, recipient).await?,
                }
            }
            ShareType::User => {
                if share.shared_with.as_deref() != Some(recipient) {
                    return Err(AppError::provider("Recipient does not match"));
                }
                id
            }
            _ => return Err(AppError::provider("Invalid shareType")),
        };

        self.backends
            .shares
            .update(
                &ShareFilter::new().id(target_id),
                &ShareChanges::new().accepted(ShareStatus::Accepted),
            )
            .await?;
        share.status = ShareStatus::Accepted;
        Ok(share)
    }

    /// Shares whose parent is `parent`, ordered by id.
    pub async fn get_children(&self, parent: &Share) -> AppResult<Vec<Share>> {
        let filter = ShareFilter::new()
            .parent(share_id(parent)?)
            .share_types(&ShareType::PUBLIC_TYPES);
        self.load(&filter).await
    }

    /// Remove a share. Group shares take their member override rows with
    /// them. Returns the number of rows removed.
    pub async fn delete(&self, share: &Share) -> AppResult<u64> {
        let id = share_id(share)?;
        let mut removed = self.backends.shares.delete(&ShareFilter::new().id(id)).await?;
        if share.share_type == ShareType::Group {
            removed += self
                .backends
                .shares
                .delete(&ShareFilter::new().parent(id))
                .await?;
        }
        info!(share_id = id, rows = removed, "Share deleted");
        Ok(removed)
    }

    /// Remove a share for one recipient only.
    ///
    /// User shares are deleted. For group shares the member's override row
    /// is set to zero permissions, creating it when missing; an override
    /// that already has zero permissions is left untouched.
    pub async fn delete_from_self(&self, share: &Share, recipient: &str) -> AppResult<()> {
        let id = share_id(share)?;
        match share.share_type {
            ShareType::Group => {
                if !self.ensure_group_member(share, recipient).await? {
                    return Ok(());
                }
                let (override_id, permissions) = match self.find_member_override(id, recipient).await? {
                    Some(row) => (row.id, row.permissions),
                    None => (
                        self.create_user_specific_group_share(share, recipient).await?,
                        share.permissions.bits(),
                    ),
                };
                if permissions != 0 {
                    self.backends
                        .shares
                        .update(
                            &ShareFilter::new().id(override_id),
                            &ShareChanges::new().permissions(0),
                        )
                        .await?;
                }
                Ok(())
            }
            ShareType::User => {
                if share.shared_with.as_deref() != Some(recipient) {
                    return Err(AppError::provider("Recipient does not match"));
                }
                self.delete(share).await.map(|_| ())
            }
            _ => Err(AppError::provider("Invalid shareType")),
        }
    }

    /// Undo [`Self::delete_from_self`] for a group member by copying the
    /// group share's permissions back onto the member override.
    pub async fn restore(&self, share: &Share, recipient: &str) -> AppResult<Share> {
        let id = share_id(share)?;
        let original = self
            .backends
            .shares
            .find_one(&ShareFilter::new().id(id))
            .await?
            .ok_or_else(|| AppError::share_not_found(format!("Share {id} not found")))?;

        let filter = ShareFilter::new()
            .parent(share.parent.unwrap_or(id))
            .share_type(ShareType::UserGroup)
            .share_with(recipient);
        self.backends
            .shares
            .update(&filter, &ShareChanges::new().permissions(original.permissions))
            .await?;

        self.get_share_by_id(id, Some(recipient)).await
    }

    /// Persist a new target path for `recipient`. Group shares store it on
    /// the member override row, creating the row when missing.
    pub async fn move_share(&self, share: Share, recipient: &str) -> AppResult<Share> {
        let id = share_id(&share)?;
        match share.share_type {
            ShareType::User => {
                self.backends
                    .shares
                    .update(
                        &ShareFilter::new().id(id),
                        &ShareChanges::new().file_target(share.target.clone()),
                    )
                    .await?;
            }
            ShareType::Group => match self.find_member_override(id, recipient).await? {
                Some(row) => {
                    self.backends
                        .shares
                        .update(
                            &ShareFilter::new().id(row.id),
                            &ShareChanges::new().file_target(share.target.clone()),
                        )
                        .await?;
                }
                None => {
                    let mut row = self.member_override_row(&share, recipient, id)?;
                    row.file_target = share.target.clone();
                    row.attributes = share.attributes.as_ref().and_then(|a| a.to_json());
                    self.backends.shares.insert(row).await?;
                }
            },
            _ => {}
        }
        Ok(share)
    }

    /// Shares on the direct children of a folder created by `user`, keyed by
    /// file id. With `reshares`, shares on nodes `user` owns are included.
    pub async fn get_shares_in_folder(
        &self,
        user: &str,
        folder_id: i64,
        reshares: bool,
    ) -> AppResult<BTreeMap<i64, Vec<Share>>> {
        let filter = if reshares {
            UserFilter::OwnerOrInitiator(user.to_string())
        } else {
            UserFilter::Initiator(user.to_string())
        };
        self.shares_in_folder(Some(filter), folder_id).await
    }

    /// Every share on the direct children of a folder, keyed by file id.
    pub async fn get_all_shares_in_folder(
        &self,
        folder_id: i64,
    ) -> AppResult<BTreeMap<i64, Vec<Share>>> {
        self.shares_in_folder(None, folder_id).await
    }

    async fn shares_in_folder(
        &self,
        user: Option<UserFilter>,
        folder_id: i64,
    ) -> AppResult<BTreeMap<i64, Vec<Share>>> {
        let child_ids: Vec<i64> = self
            .backends
            .nodes
            .get_children(folder_id)
            .await?
            .into_iter()
            .map(|n| n.id)
            .collect();

        let mut result: BTreeMap<i64, Vec<Share>> = BTreeMap::new();
        for chunk in child_ids.chunks(FOLDER_CHUNK) {
            let mut filter = ShareFilter::new()
                .share_types(&ShareType::PUBLIC_TYPES)
                .file_source_in(chunk.to_vec());
            filter.user = user.clone();
            for share in self.load(&filter).await? {
                if let Some(node_id) = share.node_id() {
                    result.entry(node_id).or_default().push(share);
                }
            }
        }
        Ok(result)
    }

    /// Shares of one type created by `user`, optionally restricted to a
    /// node. Without `reshares` only shares `user` initiated are returned;
    /// with it, and no node, shares on nodes `user` owns are included too.
    /// A negative `limit` means unlimited.
    pub async fn get_shares_by(
        &self,
        user: &str,
        share_type: ShareType,
        node_id: Option<i64>,
        reshares: bool,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Share>> {
        let mut filter = ShareFilter::new().share_type(share_type).page(limit, offset);
        if !reshares {
            filter = filter.user(UserFilter::Initiator(user.to_string()));
        } else if node_id.is_none() {
            filter = filter.user(UserFilter::OwnerOrInitiator(user.to_string()));
        }
        if let Some(node_id) = node_id {
            filter = filter.file_source(node_id);
        }
        self.load(&filter).await
    }

    /// Share by id. With a recipient, group shares are resolved to that
    /// member's view.
    pub async fn get_share_by_id(&self, id: i64, recipient: Option<&str>) -> AppResult<Share> {
        let filter = ShareFilter::new()
            .id(id)
            .share_types(&ShareType::PUBLIC_TYPES);
        let row = self
            .backends
            .shares
            .find_one(&filter)
            .await?
            .ok_or_else(|| AppError::share_not_found(format!("Share {id} not found")))?;
        let share = self
            .share_from_row(&row)
            .await?
            .ok_or_else(|| AppError::share_not_found(format!("Share {id} is invalid")))?;

        match recipient {
            Some(recipient) if share.share_type == ShareType::Group => self
                .resolve_group_shares(vec![share], recipient)
                .await?
                .pop()
                .ok_or_else(|| AppError::share_not_found(format!("Share {id} not found"))),
            _ => Ok(share),
        }
    }

    /// User, group and link shares on one node.
    pub async fn get_shares_by_path(&self, node_id: i64) -> AppResult<Vec<Share>> {
        let filter = ShareFilter::new()
            .file_source(node_id)
            .share_types(&ShareType::PUBLIC_TYPES);
        self.load(&filter).await
    }

    /// Shares received by `user`, either directly (`User`) or through group
    /// membership (`Group`, resolved to the member's view).
    ///
    /// Shares whose node is gone, sits outside `files/` of a home storage,
    /// or sits in a group-folder trash are skipped. A negative `limit` means
    /// unlimited.
    pub async fn get_shared_with(
        &self,
        user: &str,
        share_type: ShareType,
        node_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Share>> {
        match share_type {
            ShareType::User => {
                let mut filter = ShareFilter::new()
                    .share_type(ShareType::User)
                    .share_with(user)
                    .page(limit, offset);
                if let Some(node_id) = node_id {
                    filter = filter.file_source(node_id);
                }

                let mut shares = Vec::new();
                for row in self.backends.shares.find(&filter).await? {
                    let Some(node) = self.accessible_node(&row).await? else {
                        continue;
                    };
                    if let Some(mut share) = self.share_from_row(&row).await? {
                        share.set_node(node);
                        shares.push(share);
                    }
                }
                Ok(shares)
            }
            ShareType::Group => {
                let groups = self.backends.groups.user_group_ids(user).await?;
                let mut skip = offset.max(0);
                let mut found = Vec::new();

                for chunk in groups.chunks(GROUP_CHUNK) {
                    if limit >= 0 && found.len() as i64 >= limit {
                        break;
                    }
                    let mut filter = ShareFilter::new()
                        .share_type(ShareType::Group)
                        .share_with_in(chunk.iter().filter(|g| !g.is_empty()).cloned().collect());
                    if let Some(node_id) = node_id {
                        filter = filter.file_source(node_id);
                    }

                    for row in self.backends.shares.find(&filter).await? {
                        if skip > 0 {
                            skip -= 1;
                            continue;
                        }
                        if limit >= 0 && found.len() as i64 >= limit {
                            break;
                        }
                        let Some(node) = self.accessible_node(&row).await? else {
                            continue;
                        };
                        if let Some(mut share) = self.share_from_row(&row).await? {
                            share.set_node(node);
                            found.push(share);
                        }
                    }
                }

                self.resolve_group_shares(found, user).await
            }
            _ => Err(AppError::backend("Invalid backend")),
        }
    }

    /// Link share by token.
    pub async fn get_share_by_token(&self, token: &str) -> AppResult<Share> {
        let filter = ShareFilter::new().share_type(ShareType::Link).token(token);
        let row = self
            .backends
            .shares
            .find_one(&filter)
            .await?
            .ok_or_else(|| AppError::share_not_found("No share for this token"))?;
        self.share_from_row(&row)
            .await?
            .ok_or_else(|| AppError::share_not_found("Share for this token is invalid"))
    }

    /// Every user, group and link share. Invalid rows are skipped.
    pub async fn get_all_shares(&self) -> AppResult<Vec<Share>> {
        self.load(&ShareFilter::new().share_types(&ShareType::PUBLIC_TYPES))
            .await
    }

    /// Overlay member override rows onto group shares.
    ///
    /// Only permissions, status and target are taken from the override; the
    /// share's parent is set to the group share id.
    pub async fn resolve_group_shares(
        &self,
        mut shares: Vec<Share>,
        user: &str,
    ) -> AppResult<Vec<Share>> {
        let index: HashMap<i64, usize> = shares
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.numeric_id().map(|id| (id, i)))
            .collect();
        if index.is_empty() {
            return Ok(shares);
        }

        let mut filter = ShareFilter::new()
            .share_type(ShareType::UserGroup)
            .share_with(user);
        if let [single] = shares.as_slice() {
            filter = filter.parent(share_id(single)?);
        }

        for row in self.backends.shares.find(&filter).await? {
            let Some(&i) = row.parent.and_then(|p| index.get(&p)) else {
                continue;
            };
            let share = &mut shares[i];
            share.permissions = Permissions::from_bits(row.permissions);
            share.status = row.status();
            share.target = row.file_target.clone();
            share.parent = row.parent;
        }
        Ok(shares)
    }

    /// Notify the recipient of a user share by mail. Returns whether a mail
    /// was sent.
    pub async fn send_mail_notification(&self, share: &Share) -> bool {
        match self.resolve_node(share).await {
            Ok(node) => self.notifier.send_mail_notification(share, &node.name).await,
            Err(e) => {
                error!(error = %e, share_id = ?share.id(), "Share notification mail could not be sent");
                false
            }
        }
    }

    /// Mail a share's note to every affected recipient.
    pub async fn send_note(&self, recipients: &[User], share: &Share) -> AppResult<()> {
        let node = self.resolve_node(share).await?;
        self.notifier
            .send_note(recipients, share, &node.name, node.id)
            .await
    }

    async fn propagate_note(&self, share: &Share) -> AppResult<()> {
        let Some(with) = share.shared_with.as_deref() else {
            return Ok(());
        };
        let recipients: Vec<User> = match share.share_type {
            ShareType::User => self.backends.users.get(with).await?.into_iter().collect(),
            ShareType::Group => {
                if self.backends.groups.get(with).await?.is_none() {
                    return Ok(());
                }
                let mut members = Vec::new();
                for uid in self.backends.groups.members(with).await? {
                    if let Some(user) = self.backends.users.get(&uid).await? {
                        members.push(user);
                    }
                }
                members
            }
            _ => return Ok(()),
        };
        self.send_note(&recipients, share).await
    }

    /// Load every valid share matching a filter.
    pub(super) async fn load(&self, filter: &ShareFilter) -> AppResult<Vec<Share>> {
        let rows = self.backends.shares.find(filter).await?;
        let mut shares = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(share) = self.share_from_row(row).await? {
                shares.push(share);
            }
        }
        Ok(shares)
    }

    /// Build a share from a row. Rows with an unknown type or node type are
    /// invalid and yield `None`.
    async fn share_from_row(&self, row: &ShareRow) -> AppResult<Option<Share>> {
        let Some(kind) = row.kind() else {
            warn!(share_id = row.id, share_type = row.share_type, "Skipping share with unknown type");
            return Ok(None);
        };

        let mut share = Share::new(kind);
        share.set_id(row.id.to_string())?;
        if share.set_node_type(&row.item_type).is_err() {
            warn!(share_id = row.id, item_type = %row.item_type, "Skipping share with invalid node type");
            return Ok(None);
        }
        share.permissions = Permissions::from_bits(row.permissions);
        share.target = row.file_target.clone();
        share.note = row.note.clone().unwrap_or_default();
        share.mail_send = row.mail_send;
        share.status = row.status();
        share.label = row.label.clone();
        share.share_time = row.share_time();

        match kind {
            ShareType::User => {
                share.shared_with = row.share_with.clone();
                if let Some(uid) = row.share_with.as_deref() {
                    if let Some(user) = self.backends.users.get(uid).await? {
                        share.shared_with_display_name = Some(user.display_name_or_uid().to_string());
                    }
                }
            }
            ShareType::Group => {
                share.shared_with = row.share_with.clone();
                if let Some(gid) = row.share_with.as_deref() {
                    if let Some(group) = self.backends.groups.get(gid).await? {
                        share.shared_with_display_name = Some(group.display_name);
                    }
                }
            }
            ShareType::Link => {
                share.password = row.password.clone();
                share.send_password_by_talk = row.password_by_talk;
                share.token = row.token.clone();
            }
            ShareType::UserGroup => {
                share.shared_with = row.share_with.clone();
            }
        }

        share.attributes = row.decoded_attributes();
        share.shared_by = row.uid_initiator.clone().unwrap_or_default();
        share.share_owner = row.uid_owner.clone();
        if let Some(file_source) = row.file_source {
            share.set_node_id(file_source);
        }
        share.expiration = row.expiration;
        share.set_provider_id(PROVIDER_ID)?;
        share.hide_download = row.hide_download;
        share.reminder_sent = row.reminder_sent;
        share.parent = row.parent;
        Ok(Some(share))
    }

    /// The share's node when it still exists and may be surfaced.
    async fn accessible_node(&self, row: &ShareRow) -> AppResult<Option<Node>> {
        let Some(file_source) = row.file_source else {
            return Ok(None);
        };
        Ok(self
            .backends
            .nodes
            .get_by_id(file_source)
            .await?
            .filter(Node::is_accessible))
    }

    async fn resolve_node(&self, share: &Share) -> AppResult<Node> {
        if let Some(node) = share.node() {
            return Ok(node.clone());
        }
        let id = share
            .node_id()
            .ok_or_else(|| AppError::not_found("Share has no node"))?;
        self.backends
            .nodes
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Node {id} not found")))
    }

    /// Check that the group exists and report whether `recipient` is a member.
    async fn ensure_group_member(&self, share: &Share, recipient: &str) -> AppResult<bool> {
        let gid = share.shared_with.as_deref().unwrap_or_default();
        if self.backends.groups.get(gid).await?.is_none() {
            return Err(AppError::provider(format!("Group \"{gid}\" does not exist")));
        }
        self.backends.groups.is_in_group(recipient, gid).await
    }

    async fn find_member_override(&self, parent: i64, recipient: &str) -> AppResult<Option<ShareRow>> {
        let filter = ShareFilter::new()
            .share_type(ShareType::UserGroup)
            .share_with(recipient)
            .parent(parent);
        self.backends.shares.find_one(&filter).await
    }

    fn member_override_row(&self, share: &Share, recipient: &str, parent: i64) -> AppResult<NewShareRow> {
        let node_id = share
            .node_id()
            .ok_or_else(|| AppError::validation("Share has no node"))?;
        let node_type = share
            .node_type()
            .ok_or_else(|| AppError::validation("Share has no node type"))?;
        let stime = share.share_time.unwrap_or_else(Utc::now).timestamp();
        Ok(NewShareRow {
            share_type: ShareType::UserGroup.code(),
            share_with: Some(recipient.to_string()),
            uid_owner: share.share_owner.clone(),
            uid_initiator: Some(share.shared_by.clone()),
            parent: Some(parent),
            item_type: node_type.as_str().to_string(),
            item_source: node_id.to_string(),
            file_source: Some(node_id),
            permissions: share.permissions.bits(),
            stime,
            mail_send: true,
            ..NewShareRow::default()
        })
    }

    /// Insert the override row for a group member, mounted under their share
    /// folder. Returns the new row id.
    async fn create_user_specific_group_share(&self, share: &Share, recipient: &str) -> AppResult<i64> {
        let parent = share_id(share)?;
        let node = self.resolve_node(share).await?;
        let folder = self.share_folder_for(recipient).await?;

        let mut row = self.member_override_row(share, recipient, parent)?;
        row.file_target = normalize_path(&format!("{folder}/{}", node.name));
        let id = self.backends.shares.insert(row).await?;
        info!(share_id = id, parent = parent, recipient = %recipient, "Member override created");
        Ok(id)
    }

    async fn share_folder_for(&self, uid: &str) -> AppResult<String> {
        if self.config.allow_custom_share_folder {
            if let Some(folder) = self
                .backends
                .users
                .get(uid)
                .await?
                .and_then(|u| u.share_folder)
                .filter(|f| !f.is_empty())
            {
                return Ok(folder);
            }
        }
        Ok(self.config.share_folder.clone())
    }
}

/// Numeric id of a persisted share.
pub(super) fn share_id(share: &Share) -> AppResult<i64> {
    share
        .numeric_id()
        .ok_or_else(|| AppError::share_not_found("Share has no id"))
}

/// Normalize a mount path: one leading `/`, no empty or `.` segments, no
/// trailing `/`.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    format!("/{}", segments.join("/"))
}
