//! Authentication API endpoints

use crate::{
    auth::{clear_cookie, generate_token, session_cookie, Claims, LoginForm, UserInfo},
    error::{WebError, WebResult},
    state::AppState,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use axum_extra::extract::cookie::CookieJar;
use seedkeeper_core::Role;
use serde::Serialize;

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserInfo,
    pub message: String,
}

/// Login endpoint
///
/// Validates credentials and returns JWT token as httpOnly cookie
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(login): Json<LoginForm>,
) -> WebResult<(CookieJar, Json<LoginResponse>)> {
    let user = state.users.authenticate(&login).map_err(|e| {
        tracing::warn!(username = %login.username, "Failed login");
        WebError::from(e)
    })?;

    let claims = Claims::new(&user, state.auth.token_ttl_hours);
    let token = generate_token(&state.auth, &claims)?;

    let response = LoginResponse {
        user: UserInfo::from(user),
        message: "Login successful".to_string(),
    };

    tracing::info!("User logged in: {}", response.user.username);

    Ok((jar.add(session_cookie(&state.auth, token)), Json(response)))
}

/// Logout endpoint
///
/// Clears authentication cookie
pub async fn logout_handler(jar: CookieJar) -> (CookieJar, StatusCode) {
    (jar.add(clear_cookie()), StatusCode::OK)
}

/// Registration endpoint. New accounts always get the `user` role.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(form): Json<LoginForm>,
) -> WebResult<(StatusCode, Json<UserInfo>)> {
    let user = state.users.register(&form.username, &form.password, Role::User)?;
    Ok((StatusCode::CREATED, Json(UserInfo::from(user))))
}

/// Current user endpoint
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> WebResult<Json<UserInfo>> {
    let user = state
        .users
        .get_by_id(&claims.sub)
        .ok_or_else(|| WebError::Auth("User not found".to_string()))?;

    Ok(Json(UserInfo::from(user)))
}
