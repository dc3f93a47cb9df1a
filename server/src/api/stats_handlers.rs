use axum::{body::Bytes, extract::State, http::StatusCode, response::Json};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use serde_json::Value;
use uuid::Uuid;

use crate::entity::charts::{self, ChartKind};
use crate::entity::uploads::{self, UploadStatus};

use super::{
    AppState, ApiErr,
    dto::{MessageResponse, TrackRequest, UserStatsResponse},
    jwt::CurrentUser,
};

/// Append an immutable chart activity row.
pub(crate) async fn record_chart(
    db: &DatabaseConnection,
    user_id: Uuid,
    kind: ChartKind,
    meta: &Value,
) -> Result<charts::Model, ApiErr> {
    let model = charts::ActiveModel {
        id: Set(Uuid::now_v7()),
        user_id: Set(user_id),
        kind: Set(kind),
        meta: Set(meta.to_string()),
        created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .map_err(ApiErr::internal)?;

    tracing::debug!(user_id = %user_id, kind = ?kind, "chart activity recorded");
    Ok(model)
}

/// Body is optional; an empty body means no metadata.
fn meta_of(body: &Bytes) -> Result<Value, ApiErr> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    let req: TrackRequest =
        serde_json::from_slice(body).map_err(|e| ApiErr::bad_request(e.to_string()))?;
    Ok(req
        .meta
        .unwrap_or_else(|| Value::Object(Default::default())))
}

pub async fn track_chart(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<MessageResponse>), ApiErr> {
    let meta = meta_of(&body)?;
    record_chart(&state.db, user.id, ChartKind::Generation, &meta).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Chart generation tracked")),
    ))
}

pub async fn track_download(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<MessageResponse>), ApiErr> {
    let meta = meta_of(&body)?;
    record_chart(&state.db, user.id, ChartKind::Download, &meta).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Chart download tracked")),
    ))
}

pub async fn user_stats(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<UserStatsResponse>, ApiErr> {
    let uploads = uploads::Entity::find()
        .filter(uploads::Column::UploadedBy.eq(user.id))
        .filter(uploads::Column::Status.eq(UploadStatus::Completed))
        .count(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    let charts = count_charts(&state.db, user.id, ChartKind::Generation).await?;
    let downloads = count_charts(&state.db, user.id, ChartKind::Download).await?;

    Ok(Json(UserStatsResponse {
        uploads,
        charts,
        downloads,
    }))
}

async fn count_charts(
    db: &DatabaseConnection,
    user_id: Uuid,
    kind: ChartKind,
) -> Result<u64, ApiErr> {
    charts::Entity::find()
        .filter(charts::Column::UserId.eq(user_id))
        .filter(charts::Column::Kind.eq(kind))
        .count(db)
        .await
        .map_err(ApiErr::internal)
}
