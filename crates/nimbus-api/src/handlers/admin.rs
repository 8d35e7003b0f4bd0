//! Account and group administration.

use axum::Json;
use axum::extract::{Path, State};

use nimbus_core::error::AppError;
use nimbus_service::CreateUserRequest;

use crate::dto::request::{CreateGroupRequest, GroupMembershipRequest};
use crate::dto::response::{GroupResponse, UserResponse};
use crate::error::ApiResult;
use crate::extractors::AuthUser;
use crate::ocs::Ocs;
use crate::state::AppState;

fn require_self_or_admin(auth: &AuthUser, uid: &str) -> ApiResult<()> {
    if auth.is_admin || auth.uid == uid {
        Ok(())
    } else {
        Err(AppError::authorization("Administrator privileges required").into())
    }
}

/// GET /cloud/users
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Ocs<Vec<UserResponse>>> {
    let users = state.accounts.list_users(&auth).await?;
    Ok(Ocs::ok(users.iter().map(UserResponse::from).collect()))
}

/// POST /cloud/users
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<Ocs<UserResponse>> {
    let user = state.accounts.create_user(&auth, req).await?;
    Ok(Ocs::ok(UserResponse::from(&user)))
}

/// GET /cloud/users/{uid}
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(uid): Path<String>,
) -> ApiResult<Ocs<UserResponse>> {
    require_self_or_admin(&auth, &uid)?;
    let user = state
        .backends
        .users
        .get(&uid)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User \"{uid}\" not found")))?;
    Ok(Ocs::ok(UserResponse::from(&user)))
}

/// DELETE /cloud/users/{uid}
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(uid): Path<String>,
) -> ApiResult<Ocs<Vec<UserResponse>>> {
    if auth.uid == uid {
        return Err(AppError::validation("You cannot delete your own account").into());
    }
    state.accounts.delete_user(&auth, &uid).await?;
    Ok(Ocs::ok(Vec::new()))
}

/// GET /cloud/users/{uid}/groups
pub async fn list_user_groups(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(uid): Path<String>,
) -> ApiResult<Ocs<Vec<GroupResponse>>> {
    require_self_or_admin(&auth, &uid)?;
    let groups = state.backends.groups.user_groups(&uid).await?;
    Ok(Ocs::ok(groups.iter().map(GroupResponse::from).collect()))
}

/// POST /cloud/users/{uid}/groups
pub async fn add_to_group(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(uid): Path<String>,
    Json(req): Json<GroupMembershipRequest>,
) -> ApiResult<Ocs<Vec<GroupResponse>>> {
    state.accounts.add_user_to_group(&auth, &uid, &req.gid).await?;
    Ok(Ocs::ok(Vec::new()))
}

/// DELETE /cloud/users/{uid}/groups/{gid}
pub async fn remove_from_group(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((uid, gid)): Path<(String, String)>,
) -> ApiResult<Ocs<Vec<GroupResponse>>> {
    state
        .accounts
        .remove_user_from_group(&auth, &uid, &gid)
        .await?;
    Ok(Ocs::ok(Vec::new()))
}

/// POST /cloud/groups
pub async fn create_group(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<Ocs<GroupResponse>> {
    let group = state
        .accounts
        .create_group(&auth, &req.gid, req.display_name)
        .await?;
    Ok(Ocs::ok(GroupResponse::from(&group)))
}

/// DELETE /cloud/groups/{gid}
pub async fn delete_group(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(gid): Path<String>,
) -> ApiResult<Ocs<Vec<GroupResponse>>> {
    state.accounts.delete_group(&auth, &gid).await?;
    Ok(Ocs::ok(Vec::new()))
}
