use axum::{extract::State, response::Json};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::auth::{Auth, AuthError, normalize_email};
use crate::entity::{admin_settings, users};

use super::{
    AppState, ApiErr,
    dto::{
        AdminSettingsEnvelope, AdminSummary, SettingsResponse, UpdateAccountRequest,
        UpdateAccountResponse, UpdatePreferencesRequest, UpdatePreferencesResponse,
    },
    jwt::AdminUser,
};

const DEFAULT_MAX_UPLOAD_MB: i32 = 10;

async fn find_settings(
    state: &AppState,
    admin_id: Uuid,
) -> Result<Option<admin_settings::Model>, ApiErr> {
    admin_settings::Entity::find()
        .filter(admin_settings::Column::AdminId.eq(admin_id))
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)
}

pub async fn get_settings(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<AdminSettingsEnvelope>, ApiErr> {
    let settings = find_settings(&state, admin.id).await?;
    Ok(Json(AdminSettingsEnvelope {
        admin: AdminSummary::from(&admin),
        settings: settings.map(SettingsResponse::from),
    }))
}

pub async fn update_account(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(body): Json<UpdateAccountRequest>,
) -> Result<Json<UpdateAccountResponse>, ApiErr> {
    let email = match body.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        Some(raw) => {
            let email = normalize_email(raw)?;
            if email != admin.email && state.auth.find_by_email(&email).await?.is_some() {
                return Err(AuthError::EmailTaken.into());
            }
            Some(email)
        }
        None => None,
    };

    let password_hash = body
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(Auth::hash_password)
        .transpose()?;

    // Password, name and email land in a single write.
    let mut active: users::ActiveModel = admin.into();
    if let Some(hash) = password_hash {
        active.password_hash = Set(hash);
    }
    if let Some(name) = body.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        active.name = Set(name.to_owned());
    }
    if let Some(email) = email {
        active.email = Set(email);
    }
    active.updated_at = Set(Utc::now().naive_utc());

    let updated = active
        .update(&state.db)
        .await
        .map_err(|e| ApiErr::from(AuthError::from(e)))?;

    tracing::info!(admin_id = %updated.id, "admin account updated");

    Ok(Json(UpdateAccountResponse {
        message: "Account updated successfully".into(),
        admin: AdminSummary::from(&updated),
    }))
}

/// Created on first write with defaults for any field the request leaves out.
pub async fn update_preferences(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(body): Json<UpdatePreferencesRequest>,
) -> Result<Json<UpdatePreferencesResponse>, ApiErr> {
    if let Some(size) = body.max_upload_size
        && size <= 0
    {
        return Err(ApiErr::bad_request("maxUploadSize must be positive"));
    }

    let now = Utc::now().naive_utc();
    let saved = match find_settings(&state, admin.id).await? {
        Some(existing) => {
            let mut active: admin_settings::ActiveModel = existing.into();
            if let Some(v) = body.enable_uploads {
                active.enable_uploads = Set(v);
            }
            if let Some(v) = body.max_upload_size {
                active.max_upload_size = Set(v);
            }
            if let Some(v) = body.enable_ai {
                active.enable_ai = Set(v);
            }
            active.updated_at = Set(now);
            active.update(&state.db).await
        }
        None => {
            admin_settings::ActiveModel {
                id: Set(Uuid::now_v7()),
                admin_id: Set(admin.id),
                enable_uploads: Set(body.enable_uploads.unwrap_or(true)),
                max_upload_size: Set(body.max_upload_size.unwrap_or(DEFAULT_MAX_UPLOAD_MB)),
                enable_ai: Set(body.enable_ai.unwrap_or(false)),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&state.db)
            .await
        }
    }
    .map_err(ApiErr::internal)?;

    tracing::info!(admin_id = %admin.id, "admin preferences saved");

    Ok(Json(UpdatePreferencesResponse {
        message: "Preferences updated successfully".into(),
        settings: SettingsResponse::from(saved),
    }))
}
