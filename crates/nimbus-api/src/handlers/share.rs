//! Share endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use tracing::info;

use nimbus_core::error::AppError;
use nimbus_entity::node::Node;
use nimbus_entity::share::{
    NodeType, Permissions, Share, ShareAttribute, ShareAttributes, ShareStatus, ShareType,
};

use crate::dto::request::{CreateShareRequest, ListSharesQuery, UpdateShareRequest};
use crate::dto::response::ShareResponse;
use crate::error::ApiResult;
use crate::extractors::AuthUser;
use crate::ocs::Ocs;
use crate::state::AppState;

/// Files can never be shared with create or delete permission.
const FILE_PERMISSION_MASK: Permissions = Permissions::from_bits(
    Permissions::READ.bits() | Permissions::UPDATE.bits() | Permissions::SHARE.bits(),
);

fn ensure_api_enabled(state: &AppState) -> ApiResult<()> {
    if state.config.sharing.api_enabled {
        Ok(())
    } else {
        Err(AppError::not_found("Share API is disabled").into())
    }
}

fn wrong_share_id() -> AppError {
    AppError::share_not_found("Wrong share ID, share does not exist")
}

fn is_creator(share: &Share, uid: &str) -> bool {
    share.shared_by == uid || share.share_owner == uid
}

async fn is_recipient(state: &AppState, share: &Share, uid: &str) -> ApiResult<bool> {
    let Some(with) = share.shared_with.as_deref() else {
        return Ok(false);
    };
    Ok(match share.share_type {
        ShareType::User => with == uid,
        ShareType::Group => state.backends.groups.is_in_group(uid, with).await?,
        _ => false,
    })
}

/// Loads a share the caller created or received, resolved to the caller's
/// view. Anything else is reported as missing.
async fn load_visible(state: &AppState, id: i64, uid: &str) -> ApiResult<Share> {
    let share = state
        .shares
        .get_share_by_id(id, Some(uid))
        .await
        .map_err(|e| if e.is_share_not_found() { wrong_share_id() } else { e })?;
    if is_creator(&share, uid) || is_recipient(state, &share, uid).await? {
        Ok(share)
    } else {
        Err(wrong_share_id().into())
    }
}

fn to_attributes(attributes: Vec<ShareAttribute>) -> ShareAttributes {
    let mut set = ShareAttributes::new();
    for attribute in attributes {
        set.set(attribute.scope, attribute.key, attribute.value);
    }
    set
}

/// Shares received by `uid` that are still visible to them.
async fn received(state: &AppState, uid: &str, file_id: Option<i64>) -> ApiResult<Vec<Share>> {
    let mut shares = Vec::new();
    for share_type in [ShareType::User, ShareType::Group] {
        shares.extend(
            state
                .shares
                .get_shared_with(uid, share_type, file_id, -1, 0)
                .await?
                .into_iter()
                .filter(|s| !s.permissions.is_empty()),
        );
    }
    Ok(shares)
}

fn respond(shares: &[Share]) -> Ocs<Vec<ShareResponse>> {
    Ocs::ok(shares.iter().map(ShareResponse::from).collect())
}

/// GET /shares
pub async fn list_shares(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListSharesQuery>,
) -> ApiResult<Ocs<Vec<ShareResponse>>> {
    ensure_api_enabled(&state)?;

    if query.shared_with_me {
        let shares = received(&state, &auth.uid, query.file_id).await?;
        return Ok(respond(&shares));
    }

    let mut shares = Vec::new();
    for share_type in ShareType::PUBLIC_TYPES {
        shares.extend(
            state
                .shares
                .get_shares_by(&auth.uid, share_type, query.file_id, query.reshares, -1, 0)
                .await?,
        );
    }
    Ok(respond(&shares))
}

/// GET /shares/pending
pub async fn pending_shares(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Ocs<Vec<ShareResponse>>> {
    ensure_api_enabled(&state)?;
    let shares: Vec<Share> = received(&state, &auth.uid, None)
        .await?
        .into_iter()
        .filter(|s| s.status == ShareStatus::Pending)
        .collect();
    Ok(respond(&shares))
}

/// GET /shares/{id}
pub async fn get_share(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Ocs<ShareResponse>> {
    ensure_api_enabled(&state)?;
    let share = load_visible(&state, id, &auth.uid).await?;
    Ok(Ocs::ok(ShareResponse::from(&share)))
}

/// The most the caller may grant on `node`: everything for the owner,
/// otherwise what a re-shareable received share allows.
async fn grantable_permissions(state: &AppState, node: &Node, uid: &str) -> ApiResult<Permissions> {
    if node.owner == uid {
        return Ok(Permissions::ALL);
    }
    let best = received(state, uid, Some(node.id))
        .await?
        .into_iter()
        .map(|s| s.permissions)
        .filter(|p| p.contains(Permissions::SHARE))
        .fold(Permissions::NONE, |acc, p| acc | p);
    if best.is_empty() {
        return Err(AppError::authorization("You are not allowed to share this node").into());
    }
    Ok(best)
}

/// POST /shares
pub async fn create_share(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateShareRequest>,
) -> ApiResult<Ocs<ShareResponse>> {
    ensure_api_enabled(&state)?;

    let share_type = ShareType::from_code(req.share_type)
        .filter(|t| ShareType::PUBLIC_TYPES.contains(t))
        .ok_or_else(|| AppError::validation("Unknown share type"))?;
    let node = state
        .backends
        .nodes
        .get_by_id(req.file_id)
        .await?
        .ok_or_else(|| AppError::not_found("Wrong path, file/folder does not exist"))?;

    let mut permissions = req
        .permissions
        .map(Permissions::from_bits)
        .unwrap_or(Permissions::READ)
        & grantable_permissions(&state, &node, &auth.uid).await?;
    if node.node_type == NodeType::File {
        permissions = permissions & FILE_PERMISSION_MASK;
    }
    if !permissions.contains(Permissions::READ) {
        return Err(AppError::validation("Shares need at least read permission").into());
    }
    if req.expire_date.is_some_and(|e| e <= Utc::now()) {
        return Err(AppError::validation("Expiration date is in the past").into());
    }

    let mut share = Share::new(share_type);
    match share_type {
        ShareType::User => {
            let with = req
                .share_with
                .filter(|w| !w.is_empty())
                .ok_or_else(|| AppError::validation("Please specify a valid account to share with"))?;
            if with == auth.uid {
                return Err(AppError::validation("You cannot share to yourself").into());
            }
            let recipient = state
                .backends
                .users
                .get(&with)
                .await?
                .ok_or_else(|| AppError::not_found("Please specify a valid account to share with"))?;
            share.shared_with_display_name = Some(recipient.display_name_or_uid().to_string());
            share.shared_with = Some(with);
        }
        ShareType::Group => {
            let with = req
                .share_with
                .filter(|w| !w.is_empty())
                .ok_or_else(|| AppError::validation("Please specify a valid group"))?;
            let group = state
                .backends
                .groups
                .get(&with)
                .await?
                .ok_or_else(|| AppError::not_found("Please specify a valid group"))?;
            share.shared_with_display_name = Some(group.display_name);
            share.shared_with = Some(with);
        }
        _ => {
            share.token = Some(state.tokens.generate());
            share.password = match req.password.filter(|p| !p.is_empty()) {
                Some(password) => Some(state.hasher.hash(&password)?),
                None => None,
            };
            share.label = req.label.filter(|l| !l.is_empty());
            share.hide_download = req.hide_download;
        }
    }

    share.shared_by = auth.uid.clone();
    share.share_owner = node.owner.clone();
    share.permissions = permissions;
    share.expiration = req.expire_date;
    share.note = req.note;
    share.attributes = req.attributes.map(to_attributes).filter(|a| !a.is_empty());
    share.target = format!("/{}", node.name);
    share.set_node(node);

    let share = state.shares.create(share).await?;
    if share_type == ShareType::User && req.send_mail.unwrap_or(true) {
        state.shares.send_mail_notification(&share).await;
    }

    info!(uid = %auth.uid, share_id = ?share.id(), share_type = %share_type, "Share created via API");
    Ok(Ocs::ok(ShareResponse::from(&share)))
}

/// PUT /shares/{id}
pub async fn update_share(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateShareRequest>,
) -> ApiResult<Ocs<ShareResponse>> {
    ensure_api_enabled(&state)?;
    let mut share = load_visible(&state, id, &auth.uid).await?;
    if !is_creator(&share, &auth.uid) {
        return Err(AppError::authorization("You are not allowed to edit incoming shares").into());
    }

    if let Some(bits) = req.permissions {
        let mut permissions = Permissions::from_bits(bits);
        if share.node_type() == Some(NodeType::File) {
            permissions = permissions & FILE_PERMISSION_MASK;
        }
        if !permissions.contains(Permissions::READ) {
            return Err(AppError::validation("Shares need at least read permission").into());
        }
        share.permissions = permissions;
    }
    if req.remove_expire_date {
        share.expiration = None;
    } else if let Some(expiration) = req.expire_date {
        if expiration <= Utc::now() {
            return Err(AppError::validation("Expiration date is in the past").into());
        }
        share.expiration = Some(expiration);
    }
    if let Some(note) = req.note {
        share.note = note;
    }
    if let Some(attributes) = req.attributes {
        share.attributes = Some(to_attributes(attributes)).filter(|a| !a.is_empty());
    }
    if share.share_type == ShareType::Link {
        if let Some(password) = req.password {
            share.password = if password.is_empty() {
                None
            } else {
                Some(state.hasher.hash(&password)?)
            };
        }
        if let Some(label) = req.label {
            share.label = Some(label).filter(|l| !l.is_empty());
        }
        if let Some(hide) = req.hide_download {
            share.hide_download = hide;
        }
    }

    let share = state.shares.update(share).await?;
    Ok(Ocs::ok(ShareResponse::from(&share)))
}

/// DELETE /shares/{id}
///
/// The creator removes the share for everyone; a recipient only removes it
/// from their own view.
pub async fn delete_share(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Ocs<Vec<ShareResponse>>> {
    ensure_api_enabled(&state)?;
    let share = load_visible(&state, id, &auth.uid).await?;
    if is_creator(&share, &auth.uid) {
        state.shares.delete(&share).await?;
    } else {
        state.shares.delete_from_self(&share, &auth.uid).await?;
    }
    Ok(Ocs::ok(Vec::new()))
}

/// POST /shares/pending/{id}
pub async fn accept_share(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Ocs<ShareResponse>> {
    ensure_api_enabled(&state)?;
    let share = load_visible(&state, id, &auth.uid).await?;
    if !is_recipient(&state, &share, &auth.uid).await? {
        return Err(wrong_share_id().into());
    }
    let share = state.shares.accept_share(share, &auth.uid).await?;
    Ok(Ocs::ok(ShareResponse::from(&share)))
}
