use axum::{extract::State, http::StatusCode, response::Json};
use axum_extra::extract::cookie::CookieJar;

use crate::auth::AuthError;

use super::{
    AppState, ApiErr,
    dto::{
        LoginRequest, LoginResponse, MessageResponse, ProfileResponse, RegisterRequest,
        RegisterResponse, UserSummary,
    },
    jwt::{CurrentUser, clear_token_cookie, issue_token, token_cookie},
};

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<RegisterResponse>), ApiErr> {
    let user = state
        .auth
        .register(&body.name, &body.email, &body.password)
        .await?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "user registered");

    let token = issue_token(&user, &state)?;
    let jar = jar.add(token_cookie(token.clone(), &state));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(RegisterResponse {
            message: "User registered successfully".into(),
            token,
            user: UserSummary::from(&user),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiErr> {
    // Unknown email and wrong password are indistinguishable to the client.
    let user = state
        .auth
        .authenticate(&body.email, &body.password)
        .await
        .map_err(|e| match e {
            AuthError::NotFound | AuthError::InvalidPassword => {
                ApiErr::unauthorized("Invalid email or password")
            }
            other => ApiErr::from(other),
        })?;

    tracing::debug!(user_id = %user.id, "login");

    let token = issue_token(&user, &state)?;
    let jar = jar.add(token_cookie(token.clone(), &state));

    Ok((
        jar,
        Json(LoginResponse {
            message: "Login successful".into(),
            token,
            role: user.role,
            user: UserSummary::from(&user),
        }),
    ))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<ProfileResponse> {
    Json(ProfileResponse::from(user))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        clear_token_cookie(jar),
        Json(MessageResponse::new("Logged out successfully")),
    )
}
