//! Access lists: which accounts reach a set of nodes through shares.

use std::collections::BTreeMap;

use nimbus_core::result::AppResult;
use nimbus_entity::access::{AccessEntry, AccessList, AccessUsers};
use nimbus_entity::share::{ShareFilter, ShareRow, ShareStatus, ShareType};

use super::provider::ShareProvider;

impl ShareProvider {
    /// Accounts with access to any of `node_ids`, and whether a link exists.
    ///
    /// User and user-group rows count only once accepted. Group shares expand
    /// to the current members. With `current_access`, member overrides are
    /// honoured and each account maps to its shortest mount path; otherwise
    /// only the uids are returned.
    pub async fn get_access_list(&self, node_ids: &[i64], current_access: bool) -> AppResult<AccessList> {
        let mut types = ShareType::PUBLIC_TYPES.to_vec();
        if current_access {
            types.push(ShareType::UserGroup);
        }

        let mut users: BTreeMap<String, BTreeMap<i64, ShareRow>> = BTreeMap::new();
        let mut public = false;

        if !node_ids.is_empty() {
            let filter = ShareFilter::new()
                .share_types(&types)
                .file_source_in(node_ids.to_vec());

            for row in self.backends.shares.find(&filter).await? {
                let Some(kind) = row.kind() else { continue };
                let needs_accept = matches!(kind, ShareType::User | ShareType::UserGroup);
                if needs_accept && row.status() != ShareStatus::Accepted {
                    continue;
                }

                match kind {
                    ShareType::User | ShareType::UserGroup => {
                        if let Some(uid) = row.share_with.clone() {
                            users.entry(uid).or_default().insert(row.id, row);
                        }
                    }
                    ShareType::Group => {
                        let Some(gid) = row.share_with.as_deref() else { continue };
                        if self.backends.groups.get(gid).await?.is_none() {
                            continue;
                        }
                        for uid in self.backends.groups.members(gid).await? {
                            users.entry(uid).or_default().insert(row.id, row.clone());
                        }
                    }
                    ShareType::Link => public = true,
                }
            }
        }

        let users = if current_access {
            AccessUsers::Paths(
                users
                    .into_iter()
                    .filter_map(|(uid, rows)| filter_shares_of_user(rows).map(|entry| (uid, entry)))
                    .collect(),
            )
        } else {
            AccessUsers::Uids(users.into_keys().collect())
        };
        Ok(AccessList { users, public })
    }
}

/// Shortest effective mount of one account.
///
/// A member override replaces its group share, and disappears itself when
/// its permissions are zero. Among the remaining rows the target with the
/// fewest `/` wins; ties go to the lowest id.
fn filter_shares_of_user(mut rows: BTreeMap<i64, ShareRow>) -> Option<AccessEntry> {
    let mut hidden = Vec::new();
    for (id, row) in &rows {
        if row.kind() == Some(ShareType::UserGroup) {
            if let Some(parent) = row.parent {
                hidden.push(parent);
            }
            if row.permissions == 0 {
                hidden.push(*id);
            }
        }
    }
    for id in hidden {
        rows.remove(&id);
    }

    rows.values()
        .min_by_key(|row| row.target_depth())
        .map(|row| AccessEntry {
            node_id: row.file_source.unwrap_or_default(),
            node_path: row.file_target.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_entity::share::NewShareRow;

    fn row(id: i64, share_type: ShareType, parent: Option<i64>, target: &str, permissions: i32) -> ShareRow {
        NewShareRow {
            share_type: share_type.code(),
            parent,
            file_source: Some(10),
            file_target: target.to_string(),
            permissions,
            ..NewShareRow::default()
        }
        .into_row(id)
    }

    #[test]
    fn test_filter_prefers_shallowest_path() {
        let rows = BTreeMap::from([
            (1, row(1, ShareType::User, None, "/a/b/c", 1)),
            (2, row(2, ShareType::User, None, "/x", 1)),
            (3, row(3, ShareType::User, None, "/y", 1)),
        ]);
        let best = filter_shares_of_user(rows).unwrap();
        assert_eq!(best.node_path, "/x");
        assert_eq!(best.node_id, 10);
    }

    #[test]
    fn test_filter_override_replaces_group_share() {
        let rows = BTreeMap::from([
            (1, row(1, ShareType::Group, None, "/shared", 31)),
            (2, row(2, ShareType::UserGroup, Some(1), "/deep/renamed", 31)),
        ]);
        assert_eq!(filter_shares_of_user(rows).unwrap().node_path, "/deep/renamed");
    }

    #[test]
    fn test_filter_zero_override_hides_share() {
        let rows = BTreeMap::from([
            (1, row(1, ShareType::Group, None, "/shared", 31)),
            (2, row(2, ShareType::UserGroup, Some(1), "/shared", 0)),
        ]);
        assert!(filter_shares_of_user(rows).is_none());
    }
}
