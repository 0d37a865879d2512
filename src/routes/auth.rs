/**
 * Admin Authentication Routes
 * Stateless JWT sessions carried in an HttpOnly cookie, with per-IP login lockout
 */
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use bcrypt::verify;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::routes::{api_error, client_ip, internal_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Configuration
// ============================================================================

pub const SESSION_COOKIE: &str = "admin_token";
pub const TOKEN_ISSUER: &str = "revamply-admin";
pub const ADMIN_ROLE: &str = "admin";

/// Session lifetime in days
const SESSION_DAYS: i64 = 7;

// ============================================================================
// Types
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub login_time: DateTime<Utc>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signing material derived from `JWT_SECRET`.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(
        &self,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), jsonwebtoken::errors::Error> {
        let expires_at = now + Duration::days(SESSION_DAYS);
        let claims = Claims {
            sub: username.to_string(),
            role: ADMIN_ROLE.to_string(),
            login_time: now,
            iss: TOKEN_ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok((token, expires_at))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionUser {
    pub username: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockout_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::days(SESSION_DAYS))
        .secure(secure)
        .build()
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Session token from the cookie, falling back to the Authorization header.
fn extract_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| extract_bearer_token(headers))
}

/// Guard for admin-only handlers.
pub fn require_admin(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<Claims, ApiError> {
    let token = extract_token(jar, headers)
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Unauthorized. Please login first."))?;

    let claims = state.sessions.verify(&token).map_err(|e| {
        tracing::debug!(error = %e, "rejected admin session token");
        api_error(StatusCode::UNAUTHORIZED, "Invalid or expired session")
    })?;

    if claims.role != ADMIN_ROLE {
        return Err(api_error(StatusCode::UNAUTHORIZED, "Unauthorized"));
    }
    Ok(claims)
}

async fn credentials_match(state: &AppState, username: &str, password: String) -> bool {
    if username != state.config.admin_username {
        return false;
    }
    let hash = state.config.admin_password_hash.clone();
    // bcrypt is CPU-bound; keep the async executor free.
    tokio::task::spawn_blocking(move || verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

fn failure(status: StatusCode, body: LoginFailure) -> Response {
    (status, Json(body)).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/admin/login
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Response {
    let username = payload.username.trim().to_string();
    if username.is_empty() || payload.password.is_empty() {
        return failure(
            StatusCode::BAD_REQUEST,
            LoginFailure {
                error: "Username and password are required".to_string(),
                remaining_attempts: None,
                lockout_until: None,
            },
        );
    }

    let ip = client_ip(&headers, addr);
    let now = Utc::now();

    let rate = match state.login_limiter.check(&ip, now).await {
        Ok(rate) => rate,
        Err(e) => return internal_error("rate limit lookup failed", e).into_response(),
    };
    if !rate.allowed {
        tracing::warn!(ip = %ip, "login attempt while locked out");
        return failure(
            StatusCode::TOO_MANY_REQUESTS,
            LoginFailure {
                error: format!(
                    "Too many failed login attempts. Please try again in {} minutes.",
                    rate.minutes_remaining(now)
                ),
                remaining_attempts: Some(0),
                lockout_until: rate.lockout_until,
            },
        );
    }

    if !credentials_match(&state, &username, payload.password).await {
        let remaining = match state.login_limiter.record_failure(&ip, now).await {
            Ok(status) => status.remaining_attempts,
            Err(e) => return internal_error("failed to record login failure", e).into_response(),
        };
        tracing::warn!(ip = %ip, remaining, "failed admin login");
        return failure(
            StatusCode::UNAUTHORIZED,
            LoginFailure {
                error: "Invalid credentials".to_string(),
                remaining_attempts: Some(remaining),
                lockout_until: None,
            },
        );
    }

    if let Err(e) = state.login_limiter.clear(&ip).await {
        tracing::warn!(ip = %ip, error = %e, "failed to clear login attempts");
    }

    let (token, expires_at) = match state.sessions.issue(&username, now) {
        Ok(issued) => issued,
        Err(e) => return internal_error("failed to create session token", e).into_response(),
    };

    tracing::info!(ip = %ip, username = %username, "admin logged in");
    let jar = jar.add(session_cookie(token, state.config.is_production()));
    (
        StatusCode::OK,
        jar,
        Json(LoginResponse {
            success: true,
            message: "Login successful".to_string(),
            user: SessionUser {
                username,
                role: ADMIN_ROLE.to_string(),
            },
            expires_at,
        }),
    )
        .into_response()
}

/// POST /api/admin/logout
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (
        jar,
        Json(LogoutResponse {
            success: true,
            message: "Logged out successfully".to_string(),
        }),
    )
}

/// GET /api/admin/verify-session
pub async fn verify_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> impl IntoResponse {
    match require_admin(&state, &jar, &headers) {
        Ok(claims) => (
            StatusCode::OK,
            Json(SessionResponse {
                authenticated: true,
                user: Some(SessionUser {
                    username: claims.sub,
                    role: claims.role,
                }),
                error: None,
            }),
        ),
        Err((status, Json(err))) => (
            status,
            Json(SessionResponse {
                authenticated: false,
                user: None,
                error: Some(err.error),
            }),
        ),
    }
}
