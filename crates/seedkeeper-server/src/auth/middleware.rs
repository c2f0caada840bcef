//! JWT authentication middleware for Axum

use super::models::Claims;
use super::{AuthError, AuthSettings};
use crate::{
    error::{WebError, WebResult},
    state::AppState,
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

/// Name of the session cookie
pub const TOKEN_COOKIE: &str = "seedkeeper_token";

/// Generate JWT token from claims
pub fn generate_token(settings: &AuthSettings, claims: &Claims) -> Result<String, AuthError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )
    .map_err(|e| AuthError::Token(e.to_string()))
}

/// Validate JWT token and extract claims
pub fn validate_token(settings: &AuthSettings, token: &str) -> Result<Claims, AuthError> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AuthError::Token(e.to_string()))?;

    if claims.is_expired() {
        return Err(AuthError::Token("expired".to_string()));
    }
    Ok(claims)
}

/// Extract JWT from cookie jar
pub fn extract_jwt_from_cookies(jar: &CookieJar) -> Option<String> {
    jar.get(TOKEN_COOKIE).map(|cookie| cookie.value().to_string())
}

/// httpOnly cookie carrying a fresh token
pub fn session_cookie(settings: &AuthSettings, token: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(settings.secure_cookies)
        .max_age(time::Duration::hours(settings.token_ttl_hours))
        .build()
}

/// Expired cookie that makes the browser drop the session
pub fn clear_cookie() -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build()
}

/// Axum middleware to require authentication
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> WebResult<Response> {
    let token = extract_jwt_from_cookies(&jar)
        .ok_or_else(|| WebError::Auth("Not authenticated".to_string()))?;

    let claims = validate_token(&state.auth, &token)?;

    // Claims are picked up by handlers through `Extension<Claims>`.
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}
