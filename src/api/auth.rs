//! Authentication: password hashing, identity tokens and the auth routes.
//!
//! Identity is carried in an http-only cookie holding a signed, time-limited
//! token. The gate (`authenticate`) turns that cookie into a caller identity
//! or nothing; protocol-level consumers never learn why a token was rejected.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::db::{LoginRequest, SignupRequest, User, UserResponse};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_password};

/// Name of the cookie carrying the identity token.
pub const TOKEN_COOKIE: &str = "token";

/// The authenticated caller derived from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct AuthClaims {
    /// User id
    sub: String,
    email: String,
    /// Issued at (Unix timestamp)
    iat: i64,
    /// Expiration (Unix timestamp)
    exp: i64,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Mint a signed identity token for a user.
pub fn mint_token(
    config: &AuthConfig,
    user_id: &str,
    email: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = AuthClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now,
        exp: now + config.token_ttl_secs,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// Verify a token and derive the caller identity. Expired, tampered and
/// malformed tokens all come back as None.
pub fn verify_token(config: &AuthConfig, token: &str) -> Option<Caller> {
    let data = jsonwebtoken::decode::<AuthClaims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    Some(Caller {
        user_id: data.claims.sub,
        email: data.claims.email,
    })
}

/// Resolve the caller identity from the request cookie, if any.
pub fn authenticate(config: &AuthConfig, jar: &CookieJar) -> Option<Caller> {
    let token = jar.get(TOKEN_COOKIE)?.value().to_string();
    verify_token(config, &token)
}

/// Build the identity cookie. Attributes relax in dev mode where the SPA
/// talks to the API over plain http.
fn auth_cookie(config: &AuthConfig, token: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(!config.dev_mode)
        .same_site(if config.dev_mode {
            SameSite::Lax
        } else {
            SameSite::None
        })
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, ""))
        .path("/")
        .build()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: UserResponse,
}

fn validate_signup(req: &SignupRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_email(&req.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }

    errors.finish().map_err(ApiError::validation)
}

/// Sign-up endpoint: creates the user and logs them in
pub async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<SignupRequest>,
) -> Result<(CookieJar, StatusCode), ApiError> {
    validate_signup(&req)?;

    let email = req.email.to_lowercase();

    let existing: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    if existing.is_some() {
        return Err(ApiError::conflict("Email already in use"));
    }

    let id = Uuid::new_v4().to_string();
    let password_hash = hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, firstname, lastname, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&req.firstname)
    .bind(&req.lastname)
    .bind(Utc::now().to_rfc3339())
    .execute(&state.db)
    .await?;

    tracing::info!("New user signed up: {}", email);

    let token = mint_token(&state.config.auth, &id, &email)
        .map_err(|e| ApiError::internal(format!("Failed to mint token: {}", e)))?;

    Ok((
        jar.add(auth_cookie(&state.config.auth, token)),
        StatusCode::OK,
    ))
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, StatusCode), ApiError> {
    let email = req.email.to_lowercase();

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = mint_token(&state.config.auth, &user.id, &user.email)
        .map_err(|e| ApiError::internal(format!("Failed to mint token: {}", e)))?;

    Ok((
        jar.add(auth_cookie(&state.config.auth, token)),
        StatusCode::OK,
    ))
}

/// Current-user endpoint. A missing cookie is unauthorized; a present but
/// invalid one is forbidden.
pub async fn me(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<MeResponse>, ApiError> {
    let token = jar
        .get(TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let caller =
        verify_token(&state.config.auth, &token).ok_or_else(|| ApiError::forbidden("Forbidden"))?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&caller.email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(MeResponse {
        user: UserResponse::from(user),
    }))
}

/// Logout endpoint: clears the cookie unconditionally
pub async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    (jar.remove(removal_cookie()), StatusCode::OK)
}
