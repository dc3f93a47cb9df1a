use axum::{extract::State, response::Json};
use chrono::{Days, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::entity::{uploads, usage_logs, users};
use crate::system::{self, HealthSnapshot};

use super::{
    AppState, ApiErr,
    dto::{
        ActivityItem, AnalyticsResponse, DashboardResponse, DashboardTrends, EngagementPoint,
        ReportItem, StoragePoint, UploadOwner, WeeklyUsage, format_gb,
    },
    jwt::AdminUser,
};

const WINDOW_DAYS: u64 = 7;
const RECENT_ACTIVITY_LIMIT: u64 = 10;

pub async fn dashboard(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, ApiErr> {
    let now = Utc::now().naive_utc();
    let week_ago = now - TimeDelta::days(7);
    let two_weeks_ago = now - TimeDelta::days(14);

    let total_users = users::Entity::find()
        .count(&state.db)
        .await
        .map_err(ApiErr::internal)?;
    let active_users = users::Entity::find()
        .filter(users::Column::UpdatedAt.gte(week_ago))
        .count(&state.db)
        .await
        .map_err(ApiErr::internal)?;
    let new_registrations = count_created_between(&state.db, now - TimeDelta::days(1), None).await?;

    let last_week = count_created_between(&state.db, week_ago, None).await?;
    let week_before = count_created_between(&state.db, two_weeks_ago, Some(week_ago)).await?;

    let disk_bytes = state.store.total_bytes().await.map_err(ApiErr::internal)?;

    Ok(Json(DashboardResponse {
        total_users,
        active_users,
        new_registrations,
        disk_usage: format_gb(disk_bytes),
        trends: DashboardTrends {
            new_registrations: trend(last_week, week_before),
        },
    }))
}

async fn count_created_between(
    db: &DatabaseConnection,
    from: NaiveDateTime,
    until: Option<NaiveDateTime>,
) -> Result<u64, ApiErr> {
    let mut query = users::Entity::find().filter(users::Column::CreatedAt.gte(from));
    if let Some(until) = until {
        query = query.filter(users::Column::CreatedAt.lt(until));
    }
    query.count(db).await.map_err(ApiErr::internal)
}

/// `"+N"` when there is no previous period to compare with, else a signed
/// percentage with one decimal.
fn trend(current: u64, previous: u64) -> String {
    if previous == 0 {
        return if current > 0 {
            format!("+{current}")
        } else {
            "+0%".to_string()
        };
    }
    let diff = current as f64 - previous as f64;
    let pct = diff / previous as f64 * 100.0;
    let sign = if diff >= 0.0 { "+" } else { "" };
    format!("{sign}{pct:.1}%")
}

/// The `days` calendar days ending `today`, oldest first.
fn day_window(today: NaiveDate, days: u64) -> Vec<NaiveDate> {
    (0..days)
        .rev()
        .filter_map(|i| today.checked_sub_days(Days::new(i)))
        .collect()
}

fn count_by_day(window: &[NaiveDate], stamps: impl IntoIterator<Item = NaiveDateTime>) -> Vec<u64> {
    let mut counts = vec![0u64; window.len()];
    for stamp in stamps {
        if let Some(i) = window.iter().position(|d| *d == stamp.date()) {
            counts[i] += 1;
        }
    }
    counts
}

fn start_of(day: NaiveDate) -> NaiveDateTime {
    day.and_time(chrono::NaiveTime::MIN)
}

pub async fn engagement(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<EngagementPoint>>, ApiErr> {
    let window = day_window(Utc::now().date_naive(), WINDOW_DAYS);
    let Some(first) = window.first().copied() else {
        return Ok(Json(Vec::new()));
    };

    let created: Vec<NaiveDateTime> = uploads::Entity::find()
        .select_only()
        .column(uploads::Column::CreatedAt)
        .filter(uploads::Column::CreatedAt.gte(start_of(first)))
        .into_tuple()
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    let counts = count_by_day(&window, created);
    Ok(Json(
        window
            .iter()
            .zip(counts)
            .map(|(day, uploads)| EngagementPoint {
                date: day.format("%Y-%m-%d").to_string(),
                uploads,
            })
            .collect(),
    ))
}

pub async fn system_health(AdminUser(_): AdminUser) -> Result<Json<HealthSnapshot>, ApiErr> {
    let snapshot = tokio::task::spawn_blocking(system::sample)
        .await
        .map_err(ApiErr::internal)?;
    Ok(Json(snapshot))
}

pub async fn storage_trend(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<StoragePoint>>, ApiErr> {
    let buckets = state
        .store
        .daily_bytes(Utc::now().date_naive(), WINDOW_DAYS)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(
        buckets
            .into_iter()
            .map(|(day, bytes)| StoragePoint {
                date: day.format("%Y-%m-%d").to_string(),
                size_gb: round3(bytes as f64 / 1024f64.powi(3)),
            })
            .collect(),
    ))
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

pub async fn recent_activity(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ActivityItem>>, ApiErr> {
    let rows = uploads::Entity::find()
        .find_also_related(users::Entity)
        .order_by_desc(uploads::Column::CreatedAt)
        .limit(RECENT_ACTIVITY_LIMIT)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(
        rows.into_iter()
            .map(|(upload, owner)| ActivityItem {
                time: upload.created_at,
                message: format!(
                    "{} uploaded by {}",
                    upload.filename,
                    display_name(owner.as_ref())
                ),
                kind: "upload",
            })
            .collect(),
    ))
}

fn display_name(owner: Option<&users::Model>) -> &str {
    match owner {
        Some(u) if !u.name.is_empty() => &u.name,
        Some(u) => &u.email,
        None => "Unknown",
    }
}

pub async fn reports(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ReportItem>>, ApiErr> {
    let rows = uploads::Entity::find()
        .find_also_related(users::Entity)
        .order_by_desc(uploads::Column::CreatedAt)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(
        rows.into_iter()
            .map(|(upload, owner)| ReportItem {
                id: upload.id,
                filename: upload.filename,
                path: upload.path,
                size_bytes: upload.size_bytes,
                status: upload.status,
                created_at: upload.created_at,
                uploaded_by: owner.map(|u| UploadOwner {
                    id: u.id,
                    email: u.email,
                }),
            })
            .collect(),
    ))
}

pub async fn analytics(
    AdminUser(_): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<AnalyticsResponse>, ApiErr> {
    let today = Utc::now().date_naive();
    let window = day_window(today, WINDOW_DAYS);

    let total_users = users::Entity::find()
        .count(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    let active_today: Vec<Option<Uuid>> = usage_logs::Entity::find()
        .select_only()
        .column(usage_logs::Column::UserId)
        .distinct()
        .filter(usage_logs::Column::Date.gte(start_of(today)))
        .filter(usage_logs::Column::UserId.is_not_null())
        .into_tuple()
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    let durations: Vec<(Option<Uuid>, i64)> = usage_logs::Entity::find()
        .select_only()
        .column(usage_logs::Column::UserId)
        .column(usage_logs::Column::Duration)
        .into_tuple()
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    let weekly_stamps: Vec<NaiveDateTime> = match window.first() {
        Some(first) => usage_logs::Entity::find()
            .select_only()
            .column(usage_logs::Column::Date)
            .filter(usage_logs::Column::Date.gte(start_of(*first)))
            .into_tuple()
            .all(&state.db)
            .await
            .map_err(ApiErr::internal)?,
        None => Vec::new(),
    };

    Ok(Json(AnalyticsResponse {
        total_users,
        active_today: active_today.into_iter().flatten().collect::<HashSet<_>>().len() as u64,
        avg_usage_time: average_per_user(&durations),
        weekly: WeeklyUsage {
            labels: window.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect(),
            values: count_by_day(&window, weekly_stamps),
        },
    }))
}

/// Sum durations per user, then average those sums. Rows without a user
/// form one anonymous group. Rounded to whole seconds.
fn average_per_user(rows: &[(Option<Uuid>, i64)]) -> i64 {
    let mut totals: HashMap<Option<Uuid>, i64> = HashMap::new();
    for (user, duration) in rows {
        *totals.entry(*user).or_default() += duration;
    }
    if totals.is_empty() {
        return 0;
    }
    let sum: i64 = totals.values().sum();
    (sum as f64 / totals.len() as f64).round() as i64
}
