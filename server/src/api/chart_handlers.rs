use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{Value, json};

use crate::chart::{self, ChartData};
use crate::entity::charts::ChartKind;
use crate::sheet::{self, SheetError};
use crate::storage::{SHEET_EXTENSIONS, allowed_extension};

use super::{
    AppState, ApiErr,
    dto::{MessageResponse, ProcessResponse, ProjectRequest},
    jwt::CurrentUser,
    multipart::read_form,
    stats_handlers::record_chart,
};

/// Parse an uploaded sheet in memory. Nothing is written to storage; one
/// generation row records the attempt.
pub async fn process(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiErr> {
    let mut form = read_form(multipart).await?;
    let file = form
        .take_file("file")
        .ok_or_else(|| ApiErr::bad_request("No file uploaded"))?;

    let ext = allowed_extension(&file.filename, SHEET_EXTENSIONS)
        .ok_or_else(|| ApiErr::bad_request("Only Excel or CSV files are allowed"))?;

    let bytes = file.bytes;
    let table = tokio::task::spawn_blocking(move || sheet::parse(&bytes, &ext))
        .await
        .map_err(ApiErr::internal)?
        .map_err(|e| match e {
            SheetError::Empty | SheetError::Unsupported(_) => ApiErr::bad_request(e.to_string()),
            other => {
                tracing::debug!(error = %other, "unreadable spreadsheet");
                ApiErr::bad_request("Could not read spreadsheet")
            }
        })?;

    record_chart(
        &state.db,
        user.id,
        ChartKind::Generation,
        &json!({ "filename": file.filename, "headers": table.headers }),
    )
    .await?;

    Ok(Json(ProcessResponse {
        headers: table.headers,
        data: table.rows,
    }))
}

/// Rows + axis selection in, chart series out.
pub async fn project(
    CurrentUser(_): CurrentUser,
    body: Bytes,
) -> Result<Json<ChartData>, ApiErr> {
    // Parsed by hand so a bad chart type is a 400 like every other input error.
    let req: ProjectRequest =
        serde_json::from_slice(&body).map_err(|e| ApiErr::bad_request(e.to_string()))?;
    let data = chart::project(&req.rows, &req.spec).map_err(|e| ApiErr::bad_request(e.to_string()))?;
    Ok(Json(data))
}

fn whole_body_meta(body: &Bytes) -> Result<Value, ApiErr> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(json!({}));
    }
    serde_json::from_slice(body).map_err(|e| ApiErr::bad_request(e.to_string()))
}

pub async fn track_chart(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<MessageResponse>), ApiErr> {
    let meta = whole_body_meta(&body)?;
    record_chart(&state.db, user.id, ChartKind::Generation, &meta).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::new("Chart tracked"))))
}

pub async fn track_download(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<MessageResponse>), ApiErr> {
    let meta = whole_body_meta(&body)?;
    record_chart(&state.db, user.id, ChartKind::Download, &meta).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::new("Download tracked"))))
}
