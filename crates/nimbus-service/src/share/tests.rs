use std::sync::Arc;

use nimbus_core::config::mail::MailConfig;
use nimbus_core::config::sharing::SharingConfig;
use nimbus_core::error::ErrorKind;
use nimbus_database::memory::{MemoryDirectory, MemoryNodeLookup};
use nimbus_database::traits::{GroupBackend, UserBackend};
use nimbus_entity::access::AccessUsers;
use nimbus_entity::node::Node;
use nimbus_entity::share::{
    NewShareRow, NodeType, Permissions, Share, ShareFilter, ShareStatus, ShareType,
};
use nimbus_entity::user::User;

use super::{ShareNotifier, ShareProvider, normalize_path};
use crate::backends::Backends;
use crate::l10n::L10nFactory;
use crate::mail::MemoryMailer;

struct Fixture {
    provider: ShareProvider,
    directory: Arc<MemoryDirectory>,
    nodes: Arc<MemoryNodeLookup>,
    mailer: Arc<MemoryMailer>,
}

fn node(id: i64, name: &str) -> Node {
    Node {
        id,
        parent_id: Some(1),
        name: name.to_string(),
        path: format!("files/{name}"),
        storage_id: "home::alice".to_string(),
        node_type: NodeType::File,
        owner: "alice".to_string(),
    }
}

async fn fixture_with(config: SharingConfig) -> Fixture {
    let (backends, directory, nodes) = Backends::memory();
    let mailer = Arc::new(MemoryMailer::new());
    let notifier = Arc::new(ShareNotifier::new(
        backends.users.clone(),
        mailer.clone(),
        L10nFactory::new(),
        MailConfig::default(),
        "https://cloud.example/",
    ));

    for uid in ["alice", "bob", "carol"] {
        let user = User::new(uid).with_email(format!("{uid}@example.org"));
        UserBackend::save(directory.as_ref(), &user).await.unwrap();
    }
    directory.add_member("staff", "bob").await.unwrap();
    directory.add_member("staff", "carol").await.unwrap();
    nodes.insert(node(10, "report.txt")).await;
    nodes.insert(node(11, "notes.md")).await;

    Fixture {
        provider: ShareProvider::new(backends, config, notifier),
        directory,
        nodes,
        mailer,
    }
}

async fn fixture() -> Fixture {
    fixture_with(SharingConfig::default()).await
}

fn share_to(share_type: ShareType, with: Option<&str>, node_id: i64) -> Share {
    let mut share = Share::new(share_type);
    share.shared_with = with.map(str::to_string);
    share.shared_by = "alice".to_string();
    share.share_owner = "alice".to_string();
    share.permissions = Permissions::ALL;
    share.target = "/report.txt".to_string();
    share.set_node(node(node_id, "report.txt"));
    share
}

fn link_share(token: Option<&str>) -> Share {
    let mut share = share_to(ShareType::Link, None, 10);
    share.token = token.map(str::to_string);
    share
}

async fn rows(f: &Fixture) -> Vec<nimbus_entity::share::ShareRow> {
    f.provider
        .backends
        .shares
        .find(&ShareFilter::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_create_assigns_ids_once() {
    let f = fixture().await;
    let share = f
        .provider
        .create(share_to(ShareType::User, Some("bob"), 10))
        .await
        .unwrap();

    assert_eq!(share.id(), Some("1"));
    assert_eq!(share.provider_id(), Some("ocinternal"));
    assert_eq!(share.full_id().unwrap(), "ocinternal:1");
    assert!(share.share_time.is_some());

    let err = f.provider.create(share).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::IllegalIdChange);
}

#[tokio::test]
async fn test_only_link_rows_carry_tokens() {
    let f = fixture().await;
    let mut user = share_to(ShareType::User, Some("bob"), 10);
    user.token = Some("should-not-persist".to_string());
    f.provider.create(user).await.unwrap();
    f.provider
        .create(share_to(ShareType::Group, Some("staff"), 10))
        .await
        .unwrap();
    f.provider.create(link_share(Some("abc123"))).await.unwrap();

    let err = f.provider.create(link_share(None)).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let stored = rows(&f).await;
    assert_eq!(stored.len(), 3);
    for row in stored {
        assert_eq!(
            row.share_type == ShareType::Link.code(),
            row.token.is_some(),
            "row {} violates the token rule",
            row.id
        );
    }
}

#[tokio::test]
async fn test_update_keeps_link_token() {
    let f = fixture().await;
    let share = f.provider.create(link_share(Some("abc123"))).await.unwrap();

    let mut changed = share.clone();
    changed.token = None;
    let err = f.provider.update(changed).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let mut changed = share;
    changed.token = Some(String::new());
    let err = f.provider.update(changed).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let stored = rows(&f).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].token.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_create_user_group_is_rejected() {
    let f = fixture().await;
    let err = f
        .provider
        .create(share_to(ShareType::UserGroup, Some("bob"), 10))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Provider);
}

#[tokio::test]
async fn test_group_share_resolution() {
    let f = fixture().await;
    let group = f
        .provider
        .create(share_to(ShareType::Group, Some("staff"), 10))
        .await
        .unwrap();
    let id = group.numeric_id().unwrap();

    let mut moved = group.clone();
    moved.target = "/mine.txt".to_string();
    f.provider.move_share(moved, "bob").await.unwrap();

    let for_bob = f.provider.get_share_by_id(id, Some("bob")).await.unwrap();
    assert_eq!(for_bob.target, "/mine.txt");
    assert_eq!(for_bob.parent, Some(id));
    assert_eq!(for_bob.permissions, Permissions::ALL);
    assert_eq!(for_bob.shared_with_display_name.as_deref(), Some("staff"));

    let for_carol = f.provider.get_share_by_id(id, Some("carol")).await.unwrap();
    assert_eq!(for_carol.target, "/report.txt");
    assert_eq!(for_carol.status, ShareStatus::Pending);
}

#[tokio::test]
async fn test_delete_counts() {
    let f = fixture().await;
    let user = f
        .provider
        .create(share_to(ShareType::User, Some("bob"), 10))
        .await
        .unwrap();
    let group = f
        .provider
        .create(share_to(ShareType::Group, Some("staff"), 10))
        .await
        .unwrap();
    f.provider.accept_share(group.clone(), "bob").await.unwrap();
    f.provider.accept_share(group.clone(), "carol").await.unwrap();
    assert_eq!(rows(&f).await.len(), 4);

    assert_eq!(f.provider.delete(&user).await.unwrap(), 1);
    assert_eq!(f.provider.delete(&group).await.unwrap(), 3);
    assert!(rows(&f).await.is_empty());
}

#[tokio::test]
async fn test_delete_from_self_keeps_zero_override() {
    let f = fixture().await;
    let group = f
        .provider
        .create(share_to(ShareType::Group, Some("staff"), 10))
        .await
        .unwrap();
    let id = group.numeric_id().unwrap();

    f.provider.delete_from_self(&group, "bob").await.unwrap();
    let hidden = f.provider.get_share_by_id(id, Some("bob")).await.unwrap();
    assert!(hidden.permissions.is_empty());

    let mut narrowed = group.clone();
    narrowed.permissions = Permissions::READ;
    f.provider.update(narrowed).await.unwrap();

    f.provider.delete_from_self(&group, "bob").await.unwrap();
    let still_hidden = f.provider.get_share_by_id(id, Some("bob")).await.unwrap();
    assert!(still_hidden.permissions.is_empty());
    assert_eq!(rows(&f).await.len(), 2);

    let restored = f.provider.restore(&still_hidden, "bob").await.unwrap();
    assert_eq!(restored.permissions, Permissions::READ);
}

#[tokio::test]
async fn test_delete_from_self_outside_group_is_noop() {
    let f = fixture().await;
    let group = f
        .provider
        .create(share_to(ShareType::Group, Some("staff"), 10))
        .await
        .unwrap();
    f.provider.delete_from_self(&group, "alice").await.unwrap();
    assert_eq!(rows(&f).await.len(), 1);

    let mut missing = share_to(ShareType::Group, Some("ghosts"), 10);
    missing.set_id("99").unwrap();
    let err = f.provider.delete_from_self(&missing, "bob").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Provider);
}

#[tokio::test]
async fn test_accept_share() {
    let mut config = SharingConfig::default();
    config.share_folder = "/Shared".to_string();
    let f = fixture_with(config).await;

    let user = f
        .provider
        .create(share_to(ShareType::User, Some("bob"), 10))
        .await
        .unwrap();
    let err = f.provider.accept_share(user.clone(), "carol").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Provider);
    let accepted = f.provider.accept_share(user, "bob").await.unwrap();
    assert_eq!(accepted.status, ShareStatus::Accepted);

    let mut carol = User::new("carol").with_email("carol@example.org");
    carol.share_folder = Some("/Inbox/".to_string());
    UserBackend::save(f.directory.as_ref(), &carol).await.unwrap();

    let group = f
        .provider
        .create(share_to(ShareType::Group, Some("staff"), 10))
        .await
        .unwrap();
    let id = group.numeric_id().unwrap();
    f.provider.accept_share(group.clone(), "bob").await.unwrap();
    f.provider.accept_share(group.clone(), "carol").await.unwrap();

    let for_bob = f.provider.get_share_by_id(id, Some("bob")).await.unwrap();
    assert_eq!(for_bob.status, ShareStatus::Accepted);
    assert_eq!(for_bob.target, "/Shared/report.txt");
    let for_carol = f.provider.get_share_by_id(id, Some("carol")).await.unwrap();
    assert_eq!(for_carol.target, "/Inbox/report.txt");

    let err = f.provider.accept_share(group, "alice").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Provider);
}

#[tokio::test]
async fn test_get_shared_with_skips_inaccessible_nodes() {
    let f = fixture().await;
    let mut trashed = node(12, "old.txt");
    trashed.path = "files_trashbin/files/old.txt".to_string();
    f.nodes.insert(trashed).await;

    for node_id in [10, 11, 12] {
        f.provider
            .create(share_to(ShareType::User, Some("bob"), node_id))
            .await
            .unwrap();
    }
    f.nodes.remove(11).await;

    let shares = f
        .provider
        .get_shared_with("bob", ShareType::User, None, -1, 0)
        .await
        .unwrap();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].node().map(|n| n.id), Some(10));
}

#[tokio::test]
async fn test_get_shared_with_skips_home_trash_and_versions() {
    let f = fixture().await;
    let mut trashed = node(20, "old.txt.d1700000000");
    trashed.path = "files_trashbin/files/old.txt.d1700000000".to_string();
    let mut version = node(21, "report.txt.v1700000000");
    version.path = "files_versions/report.txt.v1700000000".to_string();
    let mut object = node(22, "draft.txt");
    object.storage_id = "object::user:alice".to_string();
    object.path = "files_trashbin/files/draft.txt".to_string();
    for entry in [trashed, version, object] {
        f.nodes.insert(entry).await;
    }

    for node_id in [10, 20, 21, 22] {
        f.provider
            .create(share_to(ShareType::User, Some("bob"), node_id))
            .await
            .unwrap();
    }

    let shares = f
        .provider
        .get_shared_with("bob", ShareType::User, None, -1, 0)
        .await
        .unwrap();
    let ids: Vec<i64> = shares.iter().filter_map(|s| s.node().map(|n| n.id)).collect();
    assert_eq!(ids, vec![10]);
}

#[tokio::test]
async fn test_get_shared_with_group_paging() {
    let f = fixture().await;
    for node_id in [10, 11] {
        f.provider
            .create(share_to(ShareType::Group, Some("staff"), node_id))
            .await
            .unwrap();
    }

    let all = f
        .provider
        .get_shared_with("bob", ShareType::Group, None, -1, 0)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let skipped = f
        .provider
        .get_shared_with("bob", ShareType::Group, None, -1, 1)
        .await
        .unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].node_id(), Some(11));

    let limited = f
        .provider
        .get_shared_with("bob", ShareType::Group, None, 1, 0)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);

    let none = f
        .provider
        .get_shared_with("alice", ShareType::Group, None, -1, 0)
        .await
        .unwrap();
    assert!(none.is_empty());

    let err = f
        .provider
        .get_shared_with("bob", ShareType::Link, None, -1, 0)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Backend);
}

#[tokio::test]
async fn test_lookups() {
    let f = fixture().await;
    f.provider
        .create(share_to(ShareType::User, Some("bob"), 10))
        .await
        .unwrap();
    f.provider.create(link_share(Some("tok"))).await.unwrap();

    let link = f.provider.get_share_by_token("tok").await.unwrap();
    assert_eq!(link.share_type, ShareType::Link);
    assert_eq!(
        f.provider
            .get_share_by_token("nope")
            .await
            .unwrap_err()
            .kind,
        ErrorKind::ShareNotFound
    );
    assert!(
        f.provider
            .get_share_by_id(42, None)
            .await
            .unwrap_err()
            .is_share_not_found()
    );

    assert_eq!(f.provider.get_shares_by_path(10).await.unwrap().len(), 2);
    assert_eq!(f.provider.get_all_shares().await.unwrap().len(), 2);
    let by_alice = f
        .provider
        .get_shares_by("alice", ShareType::User, None, false, -1, 0)
        .await
        .unwrap();
    assert_eq!(by_alice.len(), 1);
    let by_bob = f
        .provider
        .get_shares_by("bob", ShareType::User, None, true, -1, 0)
        .await
        .unwrap();
    assert!(by_bob.is_empty());
}

#[tokio::test]
async fn test_invalid_rows() {
    let f = fixture().await;
    let valid = NewShareRow {
        share_type: ShareType::User.code(),
        share_with: Some("bob".to_string()),
        uid_owner: "alice".to_string(),
        uid_initiator: Some("alice".to_string()),
        item_type: "file".to_string(),
        item_source: "10".to_string(),
        file_source: Some(10),
        file_target: "/report.txt".to_string(),
        permissions: 1,
        attributes: Some("not json".to_string()),
        ..NewShareRow::default()
    };
    let malformed = f.provider.backends.shares.insert(valid.clone()).await.unwrap();
    let calendar = f
        .provider
        .backends
        .shares
        .insert(NewShareRow {
            item_type: "calendar".to_string(),
            ..valid
        })
        .await
        .unwrap();

    let share = f.provider.get_share_by_id(malformed, None).await.unwrap();
    assert!(share.attributes.is_none());

    let err = f.provider.get_share_by_id(calendar, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ShareNotFound);
    assert_eq!(f.provider.get_all_shares().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_shares_in_folder() {
    let f = fixture().await;
    f.provider
        .create(share_to(ShareType::User, Some("bob"), 10))
        .await
        .unwrap();
    f.provider
        .create(share_to(ShareType::Group, Some("staff"), 11))
        .await
        .unwrap();
    let mut reshare = share_to(ShareType::User, Some("carol"), 11);
    reshare.shared_by = "bob".to_string();
    f.provider.create(reshare).await.unwrap();

    let mine = f.provider.get_shares_in_folder("alice", 1, false).await.unwrap();
    assert_eq!(mine.get(&10).map(Vec::len), Some(1));
    assert_eq!(mine.get(&11).map(Vec::len), Some(1));

    let with_reshares = f.provider.get_shares_in_folder("alice", 1, true).await.unwrap();
    assert_eq!(with_reshares.get(&11).map(Vec::len), Some(2));

    let everything = f.provider.get_all_shares_in_folder(1).await.unwrap();
    assert_eq!(everything.values().map(Vec::len).sum::<usize>(), 3);
    assert!(f.provider.get_all_shares_in_folder(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_children() {
    let f = fixture().await;
    let parent = f
        .provider
        .create(share_to(ShareType::User, Some("bob"), 10))
        .await
        .unwrap();
    let mut child = link_share(Some("child"));
    child.parent = parent.numeric_id();
    f.provider.create(child).await.unwrap();

    let children = f.provider.get_children(&parent).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].token.as_deref(), Some("child"));
}

#[tokio::test]
async fn test_user_deleted() {
    let f = fixture().await;
    f.provider
        .create(share_to(ShareType::User, Some("bob"), 10))
        .await
        .unwrap();
    let mut from_bob = share_to(ShareType::User, Some("carol"), 11);
    from_bob.share_owner = "bob".to_string();
    f.provider.create(from_bob).await.unwrap();
    let group = f
        .provider
        .create(share_to(ShareType::Group, Some("staff"), 10))
        .await
        .unwrap();
    f.provider.accept_share(group, "bob").await.unwrap();
    f.provider.create(link_share(Some("t1"))).await.unwrap();

    assert_eq!(f.provider.user_deleted("bob", ShareType::User).await.unwrap(), 2);
    assert_eq!(f.provider.user_deleted("bob", ShareType::Group).await.unwrap(), 1);
    assert_eq!(f.provider.user_deleted("bob", ShareType::UserGroup).await.unwrap(), 0);
    assert_eq!(f.provider.user_deleted("alice", ShareType::Link).await.unwrap(), 1);
    assert_eq!(f.provider.user_deleted("alice", ShareType::Group).await.unwrap(), 1);
    assert!(rows(&f).await.is_empty());
}

#[tokio::test]
async fn test_group_deleted() {
    let f = fixture().await;
    let group = f
        .provider
        .create(share_to(ShareType::Group, Some("staff"), 10))
        .await
        .unwrap();
    f.provider.accept_share(group.clone(), "bob").await.unwrap();
    f.provider.delete_from_self(&group, "carol").await.unwrap();
    f.provider
        .create(share_to(ShareType::User, Some("bob"), 10))
        .await
        .unwrap();

    assert_eq!(f.provider.group_deleted("staff").await.unwrap(), 3);
    assert_eq!(rows(&f).await.len(), 1);
}

#[tokio::test]
async fn test_user_deleted_from_group_removes_overrides() {
    let f = fixture().await;
    let group = f
        .provider
        .create(share_to(ShareType::Group, Some("staff"), 10))
        .await
        .unwrap();
    f.provider.accept_share(group.clone(), "bob").await.unwrap();
    f.provider.accept_share(group, "carol").await.unwrap();

    assert_eq!(
        f.provider.user_deleted_from_group("bob", "staff").await.unwrap(),
        1
    );
    let remaining = rows(&f).await;
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|r| r.share_with.as_deref() != Some("bob")));
}

#[tokio::test]
async fn test_user_deleted_from_group_restricted_cascade() {
    let mut config = SharingConfig::default();
    config.only_share_with_group_members = true;
    let f = fixture_with(config).await;
    f.directory.add_member("staff", "alice").await.unwrap();

    let mut from_bob = share_to(ShareType::User, Some("alice"), 11);
    from_bob.shared_by = "bob".to_string();
    from_bob.share_owner = "bob".to_string();
    f.provider.create(from_bob).await.unwrap();
    f.provider
        .create(share_to(ShareType::User, Some("bob"), 10))
        .await
        .unwrap();
    f.provider
        .create(share_to(ShareType::User, Some("carol"), 10))
        .await
        .unwrap();

    f.directory.remove_member("staff", "bob").await.unwrap();
    let removed = f.provider.user_deleted_from_group("bob", "staff").await.unwrap();
    assert_eq!(removed, 2);

    let remaining = rows(&f).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].share_with.as_deref(), Some("carol"));
}

#[tokio::test]
async fn test_user_deleted_from_group_without_restriction_keeps_shares() {
    let f = fixture().await;
    f.provider
        .create(share_to(ShareType::User, Some("bob"), 10))
        .await
        .unwrap();
    f.directory.remove_member("staff", "bob").await.unwrap();
    assert_eq!(
        f.provider.user_deleted_from_group("bob", "staff").await.unwrap(),
        0
    );
    assert_eq!(rows(&f).await.len(), 1);
}

#[tokio::test]
async fn test_access_list() {
    let f = fixture().await;
    let direct = f
        .provider
        .create(share_to(ShareType::User, Some("alice"), 10))
        .await
        .unwrap();
    let group = f
        .provider
        .create(share_to(ShareType::Group, Some("staff"), 10))
        .await
        .unwrap();
    f.provider.create(link_share(Some("pub"))).await.unwrap();

    let list = f.provider.get_access_list(&[10], false).await.unwrap();
    assert!(list.public);
    assert_eq!(list.uids(), vec!["bob", "carol"]);

    f.provider.accept_share(direct, "alice").await.unwrap();
    let mut moved = group.clone();
    moved.target = "/deep/nested/report.txt".to_string();
    f.provider.move_share(moved, "bob").await.unwrap();
    f.provider.delete_from_self(&group, "carol").await.unwrap();
    f.provider
        .backends
        .shares
        .update(
            &ShareFilter::new().share_type(ShareType::UserGroup),
            &nimbus_entity::share::ShareChanges::new().accepted(ShareStatus::Accepted),
        )
        .await
        .unwrap();

    let current = f.provider.get_access_list(&[10], true).await.unwrap();
    let AccessUsers::Paths(paths) = &current.users else {
        panic!("expected paths");
    };
    assert_eq!(paths["alice"].node_path, "/report.txt");
    assert_eq!(paths["bob"].node_path, "/deep/nested/report.txt");
    assert!(!paths.contains_key("carol"));

    let empty = f.provider.get_access_list(&[], true).await.unwrap();
    assert!(!empty.public);
}

#[tokio::test]
async fn test_update_propagates_to_members_and_mails_note() {
    let f = fixture().await;
    let group = f
        .provider
        .create(share_to(ShareType::Group, Some("staff"), 10))
        .await
        .unwrap();
    let id = group.numeric_id().unwrap();
    f.provider.accept_share(group.clone(), "bob").await.unwrap();
    f.provider.delete_from_self(&group, "carol").await.unwrap();

    let mut changed = group.clone();
    changed.permissions = Permissions::READ;
    changed.note = "Please review".to_string();
    f.provider.update(changed.clone()).await.unwrap();

    let for_bob = f.provider.get_share_by_id(id, Some("bob")).await.unwrap();
    assert_eq!(for_bob.permissions, Permissions::READ);
    assert_eq!(for_bob.note, "Please review");
    let for_carol = f.provider.get_share_by_id(id, Some("carol")).await.unwrap();
    assert!(for_carol.permissions.is_empty());

    let sent = f.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].to.is_empty());
    assert_eq!(sent[0].bcc.len(), 2);
    assert_eq!(sent[0].subject, "alice added a note to a file shared with you");
    assert!(sent[0].text_body.contains("https://cloud.example/index.php/f/10"));

    f.provider.update(changed).await.unwrap();
    assert_eq!(f.mailer.sent().await.len(), 1);
}

#[tokio::test]
async fn test_note_batches_by_language() {
    let f = fixture().await;
    let carol = User::new("carol")
        .with_email("carol@example.org")
        .with_language("de");
    UserBackend::save(f.directory.as_ref(), &carol).await.unwrap();

    let group = f
        .provider
        .create(share_to(ShareType::Group, Some("staff"), 10))
        .await
        .unwrap();
    let mut changed = group;
    changed.note = "Hallo".to_string();
    f.provider.update(changed).await.unwrap();

    let sent = f.mailer.sent().await;
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.to.len() == 1 && m.bcc.is_empty()));
}

#[tokio::test]
async fn test_send_mail_notification() {
    let f = fixture().await;
    let share = f
        .provider
        .create(share_to(ShareType::User, Some("bob"), 10))
        .await
        .unwrap();
    assert!(f.provider.send_mail_notification(&share).await);

    let sent = f.mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to[0].address, "bob@example.org");
    assert_eq!(sent[0].subject, "alice shared report.txt with you");
    assert_eq!(
        sent[0].reply_to.as_ref().map(|m| m.address.as_str()),
        Some("alice@example.org")
    );
    assert!(
        sent[0]
            .text_body
            .contains("https://cloud.example/index.php/apps/files_sharing/accept/ocinternal:1")
    );

    UserBackend::save(f.directory.as_ref(), &User::new("dave"))
        .await
        .unwrap();
    let no_mail = f
        .provider
        .create(share_to(ShareType::User, Some("dave"), 10))
        .await
        .unwrap();
    assert!(!f.provider.send_mail_notification(&no_mail).await);

    let group = f
        .provider
        .create(share_to(ShareType::Group, Some("staff"), 10))
        .await
        .unwrap();
    assert!(!f.provider.send_mail_notification(&group).await);
    assert_eq!(f.mailer.sent().await.len(), 1);
}

#[test]
fn test_normalize_path() {
    assert_eq!(normalize_path("//report.txt"), "/report.txt");
    assert_eq!(normalize_path("/Shared/./a//b/"), "/Shared/a/b");
    assert_eq!(normalize_path(""), "/");
}
