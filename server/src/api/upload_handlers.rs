use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::entity::uploads::{self, UploadStatus};
use crate::storage::{EXCEL_FOLDER, SHEET_EXTENSIONS, allowed_extension};

use super::{
    AppState, ApiErr,
    dto::{HistoryItem, MessageResponse, UploadCreatedResponse, UploadResponse},
    jwt::CurrentUser,
    multipart::read_form,
};

pub async fn alive() -> Json<MessageResponse> {
    Json(MessageResponse::new("Uploads API is working"))
}

pub async fn upload(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadCreatedResponse>), ApiErr> {
    let mut form = read_form(multipart).await?;
    let file = form
        .take_file("file")
        .ok_or_else(|| ApiErr::bad_request("No file uploaded"))?;

    let ext = allowed_extension(&file.filename, SHEET_EXTENSIONS)
        .ok_or_else(|| ApiErr::bad_request("Only Excel or CSV files are allowed"))?;

    let stored = state
        .store
        .put(EXCEL_FOLDER, &ext, &file.bytes)
        .await
        .map_err(ApiErr::internal)?;

    let now = Utc::now().naive_utc();
    let inserted = uploads::ActiveModel {
        id: Set(Uuid::now_v7()),
        filename: Set(file.filename),
        stored_name: Set(stored.stored_name.clone()),
        path: Set(stored.public_path),
        size_bytes: Set(stored.size as i64),
        status: Set(UploadStatus::Completed),
        uploaded_by: Set(user.id),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&state.db)
    .await;

    let model = match inserted {
        Ok(model) => model,
        Err(e) => {
            // Don't leave an orphaned file behind a failed insert.
            if let Err(rm) = state.store.remove(EXCEL_FOLDER, &stored.stored_name).await {
                tracing::warn!(error = %rm, stored_name = %stored.stored_name, "failed to remove orphaned upload");
            }
            return Err(ApiErr::internal(e));
        }
    };

    tracing::info!(
        upload_id = %model.id,
        user_id = %user.id,
        filename = %model.filename,
        size = model.size_bytes,
        "file uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadCreatedResponse {
            message: "File uploaded successfully".into(),
            upload: UploadResponse::from(model),
        }),
    ))
}

pub async fn history(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoryItem>>, ApiErr> {
    let rows = uploads::Entity::find()
        .filter(uploads::Column::UploadedBy.eq(user.id))
        .order_by_desc(uploads::Column::CreatedAt)
        .order_by_desc(uploads::Column::Id)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(rows.into_iter().map(HistoryItem::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{
        body_json, get_request, insert_user, make_state, multipart_request, setup_db, token_for,
    };
    use crate::entity::users::Role;
    use axum::{Router, http::Method, routing::get};
    use sea_orm::PaginatorTrait;
    use tower::ServiceExt;

    fn make_router(state: AppState) -> Router {
        Router::new()
            .route("/uploads", get(alive).post(upload))
            .route("/uploads/history", get(history))
            .with_state(state)
    }

    #[tokio::test]
    async fn csv_upload_creates_one_completed_row_and_file() {
        let db = setup_db().await;
        let user = insert_user(&db, "ann@example.com", Role::User).await;
        let (state, dir) = make_state(db.clone());

        let res = make_router(state)
            .oneshot(multipart_request(
                Method::POST,
                "/uploads",
                &token_for(&user),
                &[("file", Some("Sales.CSV"), b"a,b\n1,2\n")],
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::CREATED);
        let body = body_json(res).await;
        assert_eq!(body["upload"]["filename"], "Sales.CSV");
        assert_eq!(body["upload"]["status"], "Completed");
        assert_eq!(body["upload"]["uploadedBy"], user.id.to_string());

        let rows = uploads::Entity::find().all(&db).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, UploadStatus::Completed);
        assert_eq!(rows[0].uploaded_by, user.id);
        assert!(rows[0].stored_name.ends_with(".csv"));
        assert_eq!(
            rows[0].path,
            format!("/uploads/{EXCEL_FOLDER}/{}", rows[0].stored_name)
        );

        let on_disk = dir.path().join(EXCEL_FOLDER).join(&rows[0].stored_name);
        assert_eq!(std::fs::read(on_disk).unwrap(), b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn disallowed_extension_rejected_without_side_effects() {
        let db = setup_db().await;
        let user = insert_user(&db, "ann@example.com", Role::User).await;
        let (state, dir) = make_state(db.clone());

        let res = make_router(state)
            .oneshot(multipart_request(
                Method::POST,
                "/uploads",
                &token_for(&user),
                &[("file", Some("notes.txt"), b"hello")],
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(res).await["message"],
            "Only Excel or CSV files are allowed"
        );
        assert_eq!(uploads::Entity::find().count(&db).await.unwrap(), 0);
        assert!(!dir.path().join(EXCEL_FOLDER).exists());
    }

    #[tokio::test]
    async fn missing_file_field_rejected() {
        let db = setup_db().await;
        let user = insert_user(&db, "ann@example.com", Role::User).await;
        let (state, _dir) = make_state(db);

        let res = make_router(state)
            .oneshot(multipart_request(
                Method::POST,
                "/uploads",
                &token_for(&user),
                &[("note", None, b"no file here")],
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["message"], "No file uploaded");
    }

    #[tokio::test]
    async fn history_is_scoped_to_caller_and_newest_first() {
        let db = setup_db().await;
        let ann = insert_user(&db, "ann@example.com", Role::User).await;
        let bob = insert_user(&db, "bob@example.com", Role::User).await;
        let (state, _dir) = make_state(db);
        let router = make_router(state);

        for (user, name) in [(&ann, "first.csv"), (&bob, "bobs.xlsx"), (&ann, "second.xls")] {
            let res = router
                .clone()
                .oneshot(multipart_request(
                    Method::POST,
                    "/uploads",
                    &token_for(user),
                    &[("file", Some(name), b"x,y\n")],
                ))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::CREATED);
        }

        let res = router
            .oneshot(get_request("/uploads/history", &token_for(&ann)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["filename"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["second.xls", "first.csv"]);
        assert_eq!(body[0]["size"], "0.00 MB");
        assert_eq!(body[0]["date"].as_str().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn alive_needs_no_credential() {
        let (state, _dir) = make_state(setup_db().await);
        let res = make_router(state)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/uploads")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["message"], "Uploads API is working");
    }
}
