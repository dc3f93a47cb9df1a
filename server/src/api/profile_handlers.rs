use axum::{
    extract::{Multipart, State},
    response::Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ModelTrait, Set};

use crate::auth::{AuthError, normalize_email};
use crate::entity::users;
use crate::storage::{AVATAR_FOLDER, IMAGE_EXTENSIONS, allowed_extension};

use super::{
    AppState, ApiErr,
    dto::{ChangePasswordRequest, MessageResponse, ProfileResponse},
    jwt::CurrentUser,
    multipart::read_form,
    user_handlers::count_admins,
};

pub async fn get_profile(CurrentUser(user): CurrentUser) -> Json<ProfileResponse> {
    Json(ProfileResponse::from(user))
}

/// Multipart: optional `name`, `email`, `location` text fields and an optional `avatar` image.
pub async fn update_profile(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ProfileResponse>, ApiErr> {
    let mut form = read_form(multipart).await?;

    let avatar = match form.take_file("avatar") {
        Some(file) => {
            let ext = allowed_extension(&file.filename, IMAGE_EXTENSIONS)
                .ok_or_else(|| ApiErr::bad_request("Only image files are allowed"))?;
            Some((ext, file.bytes))
        }
        None => None,
    };

    let email = match form.text("email") {
        Some(raw) => {
            let email = normalize_email(raw)?;
            if email != user.email && state.auth.find_by_email(&email).await?.is_some() {
                return Err(AuthError::EmailTaken.into());
            }
            Some(email)
        }
        None => None,
    };

    // Stored only once every field has been accepted.
    let avatar = match avatar {
        Some((ext, bytes)) => Some(
            state
                .store
                .put(AVATAR_FOLDER, &ext, &bytes)
                .await
                .map_err(ApiErr::internal)?,
        ),
        None => None,
    };

    let previous_avatar = user.avatar.clone();
    let mut active: users::ActiveModel = user.into();

    if let Some(name) = form.text("name") {
        active.name = Set(name.to_owned());
    }
    if let Some(email) = email {
        active.email = Set(email);
    }
    if let Some(location) = form.text("location") {
        active.location = Set(location.to_owned());
    }
    if let Some(stored) = &avatar {
        active.avatar = Set(stored.public_path.clone());
    }
    active.updated_at = Set(Utc::now().naive_utc());

    let updated = match active.update(&state.db).await {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(stored) = &avatar
                && let Err(rm) = state.store.remove(AVATAR_FOLDER, &stored.stored_name).await
            {
                tracing::warn!(error = %rm, file = %stored.stored_name, "failed to remove orphaned avatar");
            }
            return Err(AuthError::from(e).into());
        }
    };

    if avatar.is_some()
        && let Some(old) = previous_avatar.rsplit('/').next().filter(|n| !n.is_empty())
        && let Err(e) = state.store.remove(AVATAR_FOLDER, old).await
    {
        tracing::warn!(error = %e, avatar = %previous_avatar, "failed to remove replaced avatar");
    }

    tracing::info!(user_id = %updated.id, "profile updated");

    Ok(Json(ProfileResponse::from(updated)))
}

pub async fn change_password(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiErr> {
    let user_id = user.id;
    state
        .auth
        .change_password(user, &body.current_password, &body.new_password)
        .await
        .map_err(|e| match e {
            AuthError::InvalidPassword => ApiErr::bad_request("Current password is incorrect"),
            other => ApiErr::from(other),
        })?;

    tracing::info!(user_id = %user_id, "password changed");

    Ok(Json(MessageResponse::new("Password updated successfully")))
}

pub async fn delete_account(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiErr> {
    if user.is_admin() && count_admins(&state.db).await? == 1 {
        return Err(ApiErr::conflict("Cannot delete the last admin user"));
    }

    let user_id = user.id;
    user.delete(&state.db).await.map_err(ApiErr::internal)?;

    tracing::info!(user_id = %user_id, "account deleted");

    Ok(Json(MessageResponse::new("Account deleted")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{
        body_json, get_request, insert_user, json_request, make_state, multipart_request,
        setup_db, token_for,
    };
    use crate::entity::users::Role;
    use axum::{
        Router,
        http::{Method, StatusCode},
        routing::{get, put},
    };
    use sea_orm::EntityTrait;
    use tower::ServiceExt;

    fn make_router(state: AppState) -> Router {
        Router::new()
            .route(
                "/me",
                get(get_profile).put(update_profile).delete(delete_account),
            )
            .route("/me/password", put(change_password))
            .with_state(state)
    }

    #[tokio::test]
    async fn update_text_fields_and_avatar() {
        let db = setup_db().await;
        let user = insert_user(&db, "ann@example.com", Role::User).await;
        let (state, dir) = make_state(db);

        let res = make_router(state)
            .oneshot(multipart_request(
                Method::PUT,
                "/me",
                &token_for(&user),
                &[
                    ("name", None, b"Ann Lee"),
                    ("location", None, b"Pune"),
                    ("avatar", Some("me.PNG"), b"\x89PNG fake"),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["name"], "Ann Lee");
        assert_eq!(body["location"], "Pune");
        assert_eq!(body["email"], "ann@example.com");
        let avatar = body["avatar"].as_str().unwrap();
        assert!(avatar.starts_with("/uploads/avatars/"));
        assert!(avatar.ends_with(".png"));

        let name = avatar.rsplit('/').next().unwrap();
        assert!(dir.path().join(AVATAR_FOLDER).join(name).exists());
    }

    #[tokio::test]
    async fn non_image_avatar_rejected() {
        let db = setup_db().await;
        let user = insert_user(&db, "ann@example.com", Role::User).await;
        let (state, _dir) = make_state(db);

        let res = make_router(state)
            .oneshot(multipart_request(
                Method::PUT,
                "/me",
                &token_for(&user),
                &[("avatar", Some("evil.svg"), b"<svg/>")],
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["message"], "Only image files are allowed");
    }

    #[tokio::test]
    async fn email_change_to_taken_address_rejected() {
        let db = setup_db().await;
        let ann = insert_user(&db, "ann@example.com", Role::User).await;
        insert_user(&db, "bob@example.com", Role::User).await;
        let (state, _dir) = make_state(db);

        let res = make_router(state)
            .oneshot(multipart_request(
                Method::PUT,
                "/me",
                &token_for(&ann),
                &[("email", None, b"BOB@example.com")],
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["message"], "Email already registered");
    }

    #[tokio::test]
    async fn rejected_update_leaves_no_avatar_behind() {
        let db = setup_db().await;
        let ann = insert_user(&db, "ann@example.com", Role::User).await;
        insert_user(&db, "bob@example.com", Role::User).await;
        let (state, dir) = make_state(db.clone());
        let router = make_router(state);

        for email in [&b"bob@example.com"[..], &b"not-an-email"[..]] {
            let res = router
                .clone()
                .oneshot(multipart_request(
                    Method::PUT,
                    "/me",
                    &token_for(&ann),
                    &[("email", None, email), ("avatar", Some("me.png"), b"\x89PNG fake")],
                ))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        }

        let avatars = dir.path().join(AVATAR_FOLDER);
        let stored = std::fs::read_dir(&avatars).map(|d| d.count()).unwrap_or(0);
        assert_eq!(stored, 0);

        let unchanged = users::Entity::find_by_id(ann.id).one(&db).await.unwrap().unwrap();
        assert_eq!(unchanged.avatar, ann.avatar);
    }

    #[tokio::test]
    async fn password_change_checks_current() {
        let db = setup_db().await;
        let (state, _dir) = make_state(db);
        let user = state
            .auth
            .register("Ann", "ann@example.com", "old-pw")
            .await
            .unwrap();
        let token = token_for(&user);
        let router = make_router(state.clone());

        let res = router
            .clone()
            .oneshot(json_request(
                Method::PUT,
                "/me/password",
                Some(&token),
                serde_json::json!({"currentPassword": "nope", "newPassword": "new-pw"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["message"], "Current password is incorrect");

        let res = router
            .oneshot(json_request(
                Method::PUT,
                "/me/password",
                Some(&token),
                serde_json::json!({"currentPassword": "old-pw", "newPassword": "new-pw"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        state
            .auth
            .authenticate("ann@example.com", "new-pw")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deleted_account_token_resolves_to_404() {
        let db = setup_db().await;
        let user = insert_user(&db, "ann@example.com", Role::User).await;
        let token = token_for(&user);
        let (state, _dir) = make_state(db.clone());
        let router = make_router(state);

        let res = router
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::DELETE)
                    .uri("/me")
                    .header("Authorization", format!("Bearer {token}"))
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["message"], "Account deleted");
        assert!(users::Entity::find_by_id(user.id).one(&db).await.unwrap().is_none());

        let res = router.oneshot(get_request("/me", &token)).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(res).await["message"], "User not found");
    }

    #[tokio::test]
    async fn sole_admin_cannot_delete_own_account() {
        let db = setup_db().await;
        let admin = insert_user(&db, "root@example.com", Role::Admin).await;
        let (state, _dir) = make_state(db.clone());

        let res = make_router(state)
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::DELETE)
                    .uri("/me")
                    .header("Authorization", format!("Bearer {}", token_for(&admin)))
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(res).await["message"], "Cannot delete the last admin user");
        assert!(users::Entity::find_by_id(admin.id).one(&db).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn admin_with_a_peer_can_delete_own_account() {
        let db = setup_db().await;
        let admin = insert_user(&db, "root@example.com", Role::Admin).await;
        insert_user(&db, "ops@example.com", Role::Admin).await;
        let (state, _dir) = make_state(db.clone());

        let res = make_router(state)
            .oneshot(
                axum::http::Request::builder()
                    .method(Method::DELETE)
                    .uri("/me")
                    .header("Authorization", format!("Bearer {}", token_for(&admin)))
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(users::Entity::find_by_id(admin.id).one(&db).await.unwrap().is_none());
    }
}
