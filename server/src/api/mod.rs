use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::response::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{Auth, AuthError};
use crate::completion::CompletionClient;
use crate::config::Config;
use crate::storage::UploadStore;

pub mod admin_handlers;
pub mod ai_handlers;
pub mod auth_handlers;
pub mod chart_handlers;
pub mod dto;
pub mod jwt;
pub mod multipart;
pub mod profile_handlers;
pub mod settings_handlers;
pub mod stats_handlers;
pub mod upload_handlers;
pub mod user_handlers;

#[cfg(test)]
pub(crate) mod test_support;

// ---------- shared state ----------

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Auth>,
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub store: Arc<dyn UploadStore>,
    pub completion: CompletionClient,
}

// ---------- error type ----------

/// A JSON error response: `{"message": "..."}` with an HTTP status.
#[derive(Debug)]
pub struct ApiErr(StatusCode, String);

impl ApiErr {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self(status, msg.into())
    }

    /// Logs the cause; the client only sees a generic message.
    pub fn internal(e: impl std::fmt::Display) -> Self {
        tracing::error!(error = %e, "request failed");
        Self(StatusCode::INTERNAL_SERVER_ERROR, "Server error".into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(StatusCode::BAD_REQUEST, msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self(StatusCode::UNAUTHORIZED, msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self(StatusCode::FORBIDDEN, msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(StatusCode::NOT_FOUND, msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self(StatusCode::CONFLICT, msg.into())
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "message": self.1 });
        (self.0, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiErr {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Invalid(msg) => ApiErr::bad_request(msg),
            AuthError::EmailTaken => ApiErr::bad_request("Email already registered"),
            AuthError::NotFound => ApiErr::not_found("User not found"),
            AuthError::InvalidPassword => ApiErr::unauthorized("Invalid email or password"),
            other => ApiErr::internal(other),
        }
    }
}

// ---------- router ----------

pub fn app_router(state: AppState) -> Router {
    let allowed_origins: Vec<HeaderValue> = state
        .config
        .cors_allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let cors = if allowed_origins.is_empty() {
        CorsLayer::new() // no origins allowed = same-origin only
    } else {
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    };

    // Everything under the upload root is public; paths stored on records resolve here.
    let uploads = ServeDir::new(&state.config.upload_dir);

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/api", api_routes())
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes()))
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(NormalizePathLayer::trim_trailing_slash())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/test/ping",
            get(|| async { Json(serde_json::json!({ "message": "API is working" })) }),
        )
        // auth
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/me", get(auth_handlers::me))
        .route("/auth/logout", post(auth_handlers::logout))
        // uploads
        .route(
            "/uploads",
            get(upload_handlers::alive).post(upload_handlers::upload),
        )
        .route("/uploads/history", get(upload_handlers::history))
        // profile
        .route(
            "/user/me",
            get(profile_handlers::get_profile)
                .put(profile_handlers::update_profile)
                .delete(profile_handlers::delete_account),
        )
        .route("/user/me/password", put(profile_handlers::change_password))
        // usage tracking
        .route("/stats/track-chart", post(stats_handlers::track_chart))
        .route("/stats/track-download", post(stats_handlers::track_download))
        .route("/stats/user", get(stats_handlers::user_stats))
        // charts
        .route("/charts/process", post(chart_handlers::process))
        .route("/charts/project", post(chart_handlers::project))
        .route("/charts/track-chart", post(chart_handlers::track_chart))
        .route("/charts/track-download", post(chart_handlers::track_download))
        // admin dashboards
        .route("/admin/dashboard", get(admin_handlers::dashboard))
        .route("/admin/engagement", get(admin_handlers::engagement))
        .route("/admin/system-health", get(admin_handlers::system_health))
        .route("/admin/storage-trend", get(admin_handlers::storage_trend))
        .route("/admin/recent-activity", get(admin_handlers::recent_activity))
        .route("/admin/reports", get(admin_handlers::reports))
        .route("/admin/analytics", get(admin_handlers::analytics))
        // admin user management
        .route("/admin/users", get(user_handlers::list_users))
        .route(
            "/admin/users/{id}",
            put(user_handlers::update_user).delete(user_handlers::delete_user),
        )
        // admin self-settings
        .route("/admin-settings", get(settings_handlers::get_settings))
        .route("/admin-settings/account", put(settings_handlers::update_account))
        .route(
            "/admin-settings/preferences",
            put(settings_handlers::update_preferences),
        )
        // completion proxy
        .route("/ai/query", post(ai_handlers::query))
}
