use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiErr, AppState};
use crate::entity::users;

pub const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id (UUID, stored as string in JWT)
    pub sub: Uuid,
    /// Role at issue time. Informational; the stored role is what gates admin routes.
    pub role: String,
    /// Unix timestamp expiry
    pub exp: u64,
}

pub fn encode_jwt(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

/// Sign a credential for `user` valid for the configured expiry.
pub fn issue_token(user: &users::Model, state: &AppState) -> Result<String, ApiErr> {
    let exp = (Utc::now().timestamp() as u64) + state.config.jwt_expiry_hours * 3600;
    let claims = Claims {
        sub: user.id,
        role: user.role.as_str().to_string(),
        exp,
    };
    encode_jwt(&claims, &state.config.jwt_secret).map_err(ApiErr::internal)
}

/// HttpOnly credential cookie with the same lifetime as the token.
pub fn token_cookie(token: String, state: &AppState) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .path("/")
        .max_age(time::Duration::hours(state.config.jwt_expiry_hours as i64))
        .build()
}

pub fn clear_token_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(TOKEN_COOKIE).path("/"))
}

/// Cookie first, then `Authorization: Bearer`.
fn extract_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(c) = jar.get(TOKEN_COOKIE)
        && !c.value().is_empty()
    {
        return Some(c.value().to_owned());
    }
    parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_owned)
}

async fn resolve_user(parts: &Parts, state: &AppState) -> Result<users::Model, ApiErr> {
    let token =
        extract_token(parts).ok_or_else(|| ApiErr::unauthorized("Not authorized, no token"))?;

    let claims = decode_jwt(&token, &state.config.jwt_secret).map_err(|e| {
        tracing::debug!(error = %e, "rejected token");
        ApiErr::unauthorized("Not authorized, token failed")
    })?;

    users::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("User not found"))
}

/// Extractor: any authenticated identity, resolved to its current database row.
pub struct CurrentUser(pub users::Model);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(CurrentUser(resolve_user(parts, &state).await?))
    }
}

/// Extractor: like [`CurrentUser`], but the stored role must be admin.
pub struct AdminUser(pub users::Model);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let user = resolve_user(parts, &state).await?;

        if !user.is_admin() {
            return Err(ApiErr::forbidden("Access denied. Admins only."));
        }

        Ok(AdminUser(user))
    }
}
