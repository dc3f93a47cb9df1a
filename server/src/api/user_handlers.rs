use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::auth::{Auth, AuthError, normalize_email};
use crate::entity::users::{self, Role};

use super::{
    AppState, ApiErr,
    dto::{AdminUserResponse, MessageResponse, UpdateUserRequest},
    jwt::AdminUser,
};

pub async fn list_users(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminUserResponse>>, ApiErr> {
    let users = users::Entity::find()
        .order_by_asc(users::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(users.into_iter().map(AdminUserResponse::from).collect()))
}

async fn find_user(db: &DatabaseConnection, id: Uuid) -> Result<users::Model, ApiErr> {
    users::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("User not found"))
}

pub(crate) async fn count_admins(db: &DatabaseConnection) -> Result<u64, ApiErr> {
    users::Entity::find()
        .filter(users::Column::Role.eq(Role::Admin))
        .count(db)
        .await
        .map_err(ApiErr::internal)
}

pub async fn update_user(
    AdminUser(caller): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<AdminUserResponse>, ApiErr> {
    let user = find_user(&state.db, id).await?;

    // Guard: prevent demoting the last admin or revoking your own privileges.
    if body.role == Some(Role::User) && user.is_admin() {
        if caller.id == id {
            return Err(ApiErr::conflict("Cannot revoke your own admin privileges"));
        }
        if count_admins(&state.db).await? == 1 {
            return Err(ApiErr::conflict(
                "Cannot revoke admin from the last admin user",
            ));
        }
    }

    let email = match body.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(raw) => {
            let email = normalize_email(raw)?;
            if email != user.email && state.auth.find_by_email(&email).await?.is_some() {
                return Err(AuthError::EmailTaken.into());
            }
            Some(email)
        }
        None => None,
    };

    let password_hash = match body.password.as_deref().filter(|p| !p.is_empty()) {
        Some(p) => Some(Auth::hash_password(p).map_err(ApiErr::internal)?),
        None => None,
    };

    let mut active: users::ActiveModel = user.into();

    if let Some(email) = email {
        active.email = Set(email);
    }
    if let Some(hash) = password_hash {
        active.password_hash = Set(hash);
    }
    if let Some(role) = body.role {
        active.role = Set(role);
    }
    if let Some(name) = body.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        active.name = Set(name.to_owned());
    }
    active.updated_at = Set(Utc::now().naive_utc());

    let updated = active
        .update(&state.db)
        .await
        .map_err(|e| ApiErr::from(AuthError::from(e)))?;

    tracing::info!(admin_id = %caller.id, user_id = %updated.id, role = updated.role.as_str(), "user updated");

    Ok(Json(AdminUserResponse::from(updated)))
}

pub async fn delete_user(
    AdminUser(caller): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiErr> {
    let user = find_user(&state.db, id).await?;

    // Guard: last-admin check takes priority so the message is unambiguous.
    if user.is_admin() && count_admins(&state.db).await? == 1 {
        return Err(ApiErr::conflict("Cannot delete the last admin user"));
    }

    // Guard: cannot delete your own account.
    if caller.id == id {
        return Err(ApiErr::conflict("Cannot delete your own account"));
    }

    let email = user.email.clone();
    user.delete(&state.db).await.map_err(ApiErr::internal)?;

    tracing::info!(admin_id = %caller.id, user_id = %id, "user deleted");

    Ok(Json(MessageResponse::new(format!(
        "User {email} deleted successfully"
    ))))
}
