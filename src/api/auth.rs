//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    config::AuthConfig,
    error::AppResult,
    models::user::User,
    services::auth::IssuedToken,
    AppState,
};

use super::AuthenticatedUser;

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    /// Echo in the csrf header on state-changing requests
    pub csrf_token: String,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            expires_at: issued.claims.expires_at_datetime(),
            csrf_token: issued.claims.csrf_token,
            token: issued.token,
            token_type: "Bearer".to_string(),
        }
    }
}

/// Session cookie (HttpOnly) plus the script-readable csrf cookie
fn set_session_cookies(jar: CookieJar, config: &AuthConfig, issued: &IssuedToken) -> CookieJar {
    jar.add(
        Cookie::build((config.session_cookie.clone(), issued.token.clone()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict),
    )
    .add(
        Cookie::build((config.csrf_cookie.clone(), issued.claims.csrf_token.clone()))
            .path("/")
            .same_site(SameSite::Strict),
    )
}

fn clear_session_cookies(jar: CookieJar, config: &AuthConfig) -> CookieJar {
    jar.remove(Cookie::build(config.session_cookie.clone()).path("/"))
        .remove(Cookie::build(config.csrf_cookie.clone()).path("/"))
}

/// Exchange email and password for a token
#[utoipa::path(
    post,
    path = "/auth/token",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn token(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let issued = state
        .services
        .users
        .login(&request.email, &request.password, state.clock.now())
        .await?;

    let jar = set_session_cookies(jar, &state.config.auth, &issued);
    Ok((jar, Json(issued.into())))
}

/// Re-issue the caller's token and extend the session
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Token refreshed", body = TokenResponse),
        (status = 401, description = "Session expired or revoked")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<TokenResponse>)> {
    let issued = state
        .services
        .users
        .refresh(&claims, state.clock.now())
        .await?;

    let jar = set_session_cookies(jar, &state.config.auth, &issued);
    Ok((jar, Json(issued.into())))
}

/// End the caller's session
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Logged out"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    jar: CookieJar,
) -> AppResult<(CookieJar, StatusCode)> {
    state.services.users.logout(&claims.subject).await?;
    Ok((clear_session_cookies(jar, &state.config.auth), StatusCode::NO_CONTENT))
}

/// Get current user profile
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.users.me(&claims).await?;
    Ok(Json(user))
}
