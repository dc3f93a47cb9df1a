use axum::{extract::State, http::StatusCode, response::Json};

use crate::completion::CompletionError;

use super::{
    AppState, ApiErr,
    dto::{AiQueryRequest, AiQueryResponse},
    jwt::CurrentUser,
};

pub async fn query(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<AiQueryRequest>,
) -> Result<Json<AiQueryResponse>, ApiErr> {
    let prompt = body.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiErr::bad_request("Prompt is required"));
    }

    let response = state.completion.complete(prompt).await.map_err(|e| match e {
        CompletionError::NotConfigured => {
            ApiErr::new(StatusCode::SERVICE_UNAVAILABLE, "AI service is not configured")
        }
        other => {
            tracing::error!(error = %other, user_id = %user.id, "completion failed");
            ApiErr::new(StatusCode::BAD_GATEWAY, "Failed to process request")
        }
    })?;

    Ok(Json(AiQueryResponse { response }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{
        body_json, insert_user, json_request, make_state, setup_db, token_for,
    };
    use crate::completion::CompletionClient;
    use crate::config::CompletionConfig;
    use crate::entity::users::Role;
    use axum::{Router, http::Method, routing::post};
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    fn make_router(state: AppState) -> Router {
        Router::new().route("/query", post(query)).with_state(state)
    }

    /// Serve `upstream` on a random local port and return its base URL.
    async fn spawn_upstream(upstream: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn pointed_at(mut state: AppState, base_url: String) -> AppState {
        state.completion = CompletionClient::new(CompletionConfig {
            api_key: Some("test-key".to_string()),
            base_url,
            timeout_secs: 5,
            ..CompletionConfig::default()
        })
        .unwrap();
        state
    }

    async fn ask(state: AppState, user: &crate::entity::users::Model) -> axum::response::Response {
        make_router(state)
            .oneshot(json_request(
                Method::POST,
                "/query",
                Some(&token_for(user)),
                serde_json::json!({"prompt": "summarise my sales"}),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn blank_prompt_is_400() {
        let db = setup_db().await;
        let user = insert_user(&db, "ann@example.com", Role::User).await;
        let (state, _dir) = make_state(db);

        let res = make_router(state)
            .oneshot(json_request(
                Method::POST,
                "/query",
                Some(&token_for(&user)),
                serde_json::json!({"prompt": "   "}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["message"], "Prompt is required");
    }

    #[tokio::test]
    async fn unconfigured_service_is_503() {
        let db = setup_db().await;
        let user = insert_user(&db, "ann@example.com", Role::User).await;
        let (state, _dir) = make_state(db);
        assert!(!state.completion.is_configured());

        let res = make_router(state)
            .oneshot(json_request(
                Method::POST,
                "/query",
                Some(&token_for(&user)),
                serde_json::json!({"prompt": "summarise my sales"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn requires_credential() {
        let (state, _dir) = make_state(setup_db().await);
        let res = make_router(state)
            .oneshot(json_request(
                Method::POST,
                "/query",
                None,
                serde_json::json!({"prompt": "hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upstream_answer_is_returned() {
        let db = setup_db().await;
        let user = insert_user(&db, "ann@example.com", Role::User).await;
        let (state, _dir) = make_state(db);
        let base = spawn_upstream(Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "Sales rose."}}]
                }))
            }),
        ))
        .await;

        let res = ask(pointed_at(state, base), &user).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["response"], "Sales rose.");
    }

    #[tokio::test]
    async fn upstream_error_status_is_502() {
        let db = setup_db().await;
        let user = insert_user(&db, "ann@example.com", Role::User).await;
        let (state, _dir) = make_state(db);
        let base = spawn_upstream(Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        ))
        .await;

        let res = ask(pointed_at(state, base), &user).await;
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(res).await["message"], "Failed to process request");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_502() {
        let db = setup_db().await;
        let user = insert_user(&db, "ann@example.com", Role::User).await;
        let (state, _dir) = make_state(db);

        // grab a free port, then close it so nothing is listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let res = ask(pointed_at(state, format!("http://{addr}/v1")), &user).await;
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(res).await["message"], "Failed to process request");
    }
}
