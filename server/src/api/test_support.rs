//! Fixtures shared by the handler unit tests.

use axum::{
    body::Body,
    http::{Method, Request, Response, header},
};
use chrono::Utc;
use migration::MigratorTrait as _;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use std::sync::Arc;
use uuid::Uuid;

use super::{AppState, jwt};
use crate::{
    auth::Auth,
    completion::CompletionClient,
    config::Config,
    entity::users::{self, Role},
    storage::LocalStore,
};

pub const JWT_SECRET: &str = "test-jwt-secret-key-32-chars-pad";

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

/// State over `db` with a throwaway upload root. Keep the `TempDir` alive for the test.
pub fn make_state(db: DatabaseConnection) -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiry_hours: 1,
        upload_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    let state = AppState {
        auth: Arc::new(Auth::new(db.clone(), config.admin_email())),
        db,
        store: Arc::new(LocalStore::new(dir.path())),
        completion: CompletionClient::new(config.completion.clone()).unwrap(),
        config: Arc::new(config),
    };
    (state, dir)
}

pub async fn insert_user(db: &DatabaseConnection, email: &str, role: Role) -> users::Model {
    let now = Utc::now().naive_utc();
    users::ActiveModel {
        id: Set(Uuid::now_v7()),
        name: Set(email.split('@').next().unwrap_or_default().to_string()),
        email: Set(email.to_string()),
        password_hash: Set("hash".to_string()),
        role: Set(role),
        location: Set(String::new()),
        avatar: Set(String::new()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

pub fn token_for(user: &users::Model) -> String {
    let claims = jwt::Claims {
        sub: user.id,
        role: user.role.as_str().to_string(),
        exp: (Utc::now().timestamp() as u64) + 3600,
    };
    jwt::encode_jwt(&claims, JWT_SECRET).unwrap()
}

pub fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

/// Hand-rolled `multipart/form-data` body: `(field, Some(filename), bytes)` for
/// files, `(field, None, bytes)` for text.
pub fn multipart_request(
    method: Method,
    uri: &str,
    token: &str,
    parts: &[(&str, Option<&str>, &[u8])],
) -> Request<Body> {
    const BOUNDARY: &str = "----dataverse-test-boundary";
    let mut body = Vec::new();
    for (name, filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(f) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_json(res: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
