//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for registration, login, and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use image_enhancer_core::domain::{Account, NewAccount};
use image_enhancer_core::ports::{AccountStore, PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::error::port_error_response;
use crate::web::middleware::{session_token, SESSION_COOKIE};
use crate::web::state::{AppState, SessionState};

/// Earliest date of birth the registration form accepts.
const MIN_DATE_OF_BIRTH: (i32, u32, u32) = (1925, 1, 1);

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl RegisterRequest {
    /// Checks the form the same way the registration page does: every field
    /// filled in, matching passwords and a plausible date of birth.
    pub fn validate(&self, today: NaiveDate) -> PortResult<NaiveDate> {
        let date_of_birth = match self.date_of_birth {
            Some(dob)
                if !self.first_name.trim().is_empty()
                    && !self.last_name.trim().is_empty()
                    && !self.email.trim().is_empty()
                    && !self.password.is_empty()
                    && !self.confirm_password.is_empty() =>
            {
                dob
            }
            _ => return Err(PortError::Validation("Please fill in all fields".to_string())),
        };

        if self.password != self.confirm_password {
            return Err(PortError::Validation("Passwords do not match".to_string()));
        }

        let (y, m, d) = MIN_DATE_OF_BIRTH;
        let earliest = NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN);
        if date_of_birth < earliest || date_of_birth > today {
            return Err(PortError::Validation(format!(
                "Date of birth must be between {} and {}",
                earliest, today
            )));
        }
        Ok(date_of_birth)
    }
}

//=========================================================================================
// Password Hashing
//=========================================================================================

/// Hashes a password into an argon2 PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PortError::Unexpected(format!("Failed to hash password: {}", e)))
}

/// Checks a password against a stored argon2 PHC string.
pub fn verify_password(password: &str, password_hash: &str) -> PortResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| PortError::Unexpected(format!("Failed to parse password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Emails are stored and looked up without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_string()
}

/// Returns the account iff `email` is registered and `password` matches its
/// stored hash.
pub async fn authenticate(
    accounts: &dyn AccountStore,
    email: &str,
    password: &str,
) -> PortResult<Option<Account>> {
    match accounts.get_account(email).await {
        Ok(account) if verify_password(password, &account.password_hash)? => Ok(Some(account)),
        Ok(_) | Err(PortError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn session_cookie(token: &str, max_age_seconds: i64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, token, max_age_seconds
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/register - Create a new account (does not log in)
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; log in to continue", body = AuthResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Validate the form
    let date_of_birth = req
        .validate(Utc::now().date_naive())
        .map_err(port_error_response)?;

    // 2. Hash the password
    let password_hash = hash_password(&req.password).map_err(|e| {
        error!("{}", e);
        port_error_response(e)
    })?;

    // 3. Insert the account
    let new_account = NewAccount {
        email: normalize_email(&req.email),
        first_name: req.first_name.trim().to_string(),
        last_name: req.last_name.trim().to_string(),
        date_of_birth,
        password_hash,
    };
    let response = AuthResponse {
        email: new_account.email.clone(),
        first_name: new_account.first_name.clone(),
        last_name: new_account.last_name.clone(),
    };

    let created = state.accounts.register(new_account).await.map_err(|e| {
        error!("Failed to register account: {:?}", e);
        port_error_response(e)
    })?;
    if !created {
        return Err((StatusCode::CONFLICT, "Email already registered".to_string()));
    }

    info!("Registered account {}", response.email);
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /auth/login - Login with an existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Verify the credentials
    let email = normalize_email(&req.email);
    let account = authenticate(state.accounts.as_ref(), &email, &req.password)
        .await
        .map_err(|e| {
            error!("Failed to authenticate {}: {:?}", email, e);
            port_error_response(e)
        })?
        .ok_or_else(|| {
            warn!("Rejected login for {}", email);
            (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string())
        })?;

    // 2. Start an authenticated session
    let mut session = SessionState::new();
    session.login(&account.email);
    let token = state.sessions.create(session).await;
    info!(
        "{} logged in ({} active sessions)",
        account.email,
        state.sessions.len().await
    );

    // 3. Return response with cookie
    let cookie = session_cookie(&token, state.sessions.ttl().num_seconds());
    let response = AuthResponse {
        email: account.email,
        first_name: account.first_name,
        last_name: account.last_name,
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and drop the session with its images
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Extract session token
    let token = session_token(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    // 2. Remove the session and clear whatever it still holds
    let session = state
        .sessions
        .remove(token)
        .await
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;
    let mut session = session.lock().await;
    if let Some(email) = session.current_user() {
        info!("{} logged out", email);
    }
    session.logout();

    // 3. Clear cookie
    Ok((StatusCode::OK, [(header::SET_COOKIE, session_cookie("", 0))]))
}
