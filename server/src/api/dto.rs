use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::chart::ChartSpec;
use crate::entity::{admin_settings, uploads, users};
use crate::sheet::Row;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ---------- auth ----------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// The short user shape returned alongside a credential.
#[derive(Debug, Serialize, Clone)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: users::Role,
}

impl From<&users::Model> for UserSummary {
    fn from(m: &users::Model) -> Self {
        Self {
            id: m.id,
            name: m.name.clone(),
            email: m.email.clone(),
            role: m.role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub role: users::Role,
    pub user: UserSummary,
}

/// Everything about a user except the password hash.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: users::Role,
    pub location: String,
    pub avatar: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<users::Model> for ProfileResponse {
    fn from(m: users::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            role: m.role,
            location: m.location,
            avatar: m.avatar,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

// ---------- uploads ----------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: Uuid,
    pub filename: String,
    pub path: String,
    pub size_bytes: i64,
    pub status: uploads::UploadStatus,
    pub uploaded_by: Uuid,
    pub created_at: NaiveDateTime,
}

impl From<uploads::Model> for UploadResponse {
    fn from(m: uploads::Model) -> Self {
        Self {
            id: m.id,
            filename: m.filename,
            path: m.path,
            size_bytes: m.size_bytes,
            status: m.status,
            uploaded_by: m.uploaded_by,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadCreatedResponse {
    pub message: String,
    pub upload: UploadResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: Uuid,
    pub filename: String,
    pub path: String,
    pub size_bytes: i64,
    /// `"x.xx MB"`
    pub size: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub status: uploads::UploadStatus,
    pub created_at: NaiveDateTime,
}

impl From<uploads::Model> for HistoryItem {
    fn from(m: uploads::Model) -> Self {
        Self {
            size: format_mb(m.size_bytes),
            date: m.created_at.format("%Y-%m-%d").to_string(),
            id: m.id,
            filename: m.filename,
            path: m.path,
            size_bytes: m.size_bytes,
            status: m.status,
            created_at: m.created_at,
        }
    }
}

pub fn format_mb(bytes: i64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

pub fn format_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / 1024.0 / 1024.0 / 1024.0)
}

// ---------- stats / charts ----------

#[derive(Debug, Deserialize, Default)]
pub struct TrackRequest {
    #[serde(default)]
    pub meta: Option<Value>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UserStatsResponse {
    pub uploads: u64,
    pub charts: u64,
    pub downloads: u64,
}

#[derive(Debug, Deserialize)]
pub struct ProjectRequest {
    pub rows: Vec<Row>,
    #[serde(flatten)]
    pub spec: ChartSpec,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub headers: Vec<String>,
    pub data: Vec<Row>,
}

// ---------- admin dashboards ----------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub total_users: u64,
    pub active_users: u64,
    pub new_registrations: u64,
    pub disk_usage: String,
    pub trends: DashboardTrends,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardTrends {
    pub new_registrations: String,
}

#[derive(Debug, Serialize)]
pub struct EngagementPoint {
    pub date: String,
    pub uploads: u64,
}

#[derive(Debug, Serialize)]
pub struct StoragePoint {
    pub date: String,
    #[serde(rename = "sizeGB")]
    pub size_gb: f64,
}

#[derive(Debug, Serialize)]
pub struct ActivityItem {
    pub time: NaiveDateTime,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UploadOwner {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportItem {
    pub id: Uuid,
    pub filename: String,
    pub path: String,
    pub size_bytes: i64,
    pub status: uploads::UploadStatus,
    pub created_at: NaiveDateTime,
    pub uploaded_by: Option<UploadOwner>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub total_users: u64,
    pub active_today: u64,
    /// Seconds; mean over users of their summed session durations.
    pub avg_usage_time: i64,
    pub weekly: WeeklyUsage,
}

#[derive(Debug, Serialize)]
pub struct WeeklyUsage {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
}

// ---------- admin user management ----------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: users::Role,
    pub created_at: NaiveDateTime,
}

impl From<users::Model> for AdminUserResponse {
    fn from(m: users::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            role: m.role,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<users::Role>,
    pub name: Option<String>,
}

// ---------- admin self-settings ----------

#[derive(Debug, Serialize)]
pub struct AdminSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&users::Model> for AdminSummary {
    fn from(m: &users::Model) -> Self {
        Self {
            id: m.id,
            name: m.name.clone(),
            email: m.email.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub enable_uploads: bool,
    pub max_upload_size: i32,
    #[serde(rename = "enableAI")]
    pub enable_ai: bool,
    pub updated_at: NaiveDateTime,
}

impl From<admin_settings::Model> for SettingsResponse {
    fn from(m: admin_settings::Model) -> Self {
        Self {
            enable_uploads: m.enable_uploads,
            max_upload_size: m.max_upload_size,
            enable_ai: m.enable_ai,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminSettingsEnvelope {
    pub admin: AdminSummary,
    pub settings: Option<SettingsResponse>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateAccountResponse {
    pub message: String,
    pub admin: AdminSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferencesRequest {
    pub enable_uploads: Option<bool>,
    pub max_upload_size: Option<i32>,
    #[serde(rename = "enableAI")]
    pub enable_ai: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UpdatePreferencesResponse {
    pub message: String,
    pub settings: SettingsResponse,
}

// ---------- completion proxy ----------

#[derive(Debug, Deserialize)]
pub struct AiQueryRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct AiQueryResponse {
    pub response: String,
}
