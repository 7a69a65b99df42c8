//! services/api/src/web/account.rs
//!
//! Handlers for the profile and analytics views, and for switching between views.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::{DateTime, NaiveDate, Utc};
use image_enhancer_core::domain::{Account, UsageRecord, View};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::error::port_error_response;
use crate::web::state::{AppState, SessionHandle};

/// Number of usage records shown under "recent activity".
const RECENT_ACTIVITY_LIMIT: usize = 5;

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct ActivityEntry {
    pub technique: String,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub source_filename: String,
}

impl From<&UsageRecord> for ActivityEntry {
    fn from(record: &UsageRecord) -> Self {
        Self {
            technique: record.technique.id().to_string(),
            label: record.technique.label().to_string(),
            timestamp: record.timestamp,
            source_filename: record.source_filename.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub age: u32,
    pub join_date: NaiveDate,
    pub enhancement_count: u64,
    /// Ids of every technique the account has used at least once.
    pub techniques_used: Vec<String>,
    pub recent_activity: Vec<ActivityEntry>,
}

impl ProfileResponse {
    pub fn from_account(account: &Account, today: NaiveDate) -> Self {
        Self {
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            date_of_birth: account.date_of_birth,
            age: account.age_on(today),
            join_date: account.join_date,
            enhancement_count: account.enhancement_count,
            techniques_used: account
                .enhancement_types
                .iter()
                .map(|t| t.id().to_string())
                .collect(),
            recent_activity: account
                .recent_activity(RECENT_ACTIVITY_LIMIT)
                .into_iter()
                .map(ActivityEntry::from)
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TechniqueUsage {
    pub technique: String,
    pub label: String,
    pub count: u64,
}

#[derive(Serialize, ToSchema)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub total: u64,
}

#[derive(Serialize, ToSchema)]
pub struct AnalyticsResponse {
    pub enhancement_count: u64,
    pub technique_counts: Vec<TechniqueUsage>,
    pub timeline: Vec<TimelineEntry>,
}

impl From<&Account> for AnalyticsResponse {
    fn from(account: &Account) -> Self {
        Self {
            enhancement_count: account.enhancement_count,
            technique_counts: account
                .technique_counts()
                .into_iter()
                .map(|c| TechniqueUsage {
                    technique: c.technique.id().to_string(),
                    label: c.technique.label().to_string(),
                    count: c.count,
                })
                .collect(),
            timeline: account
                .timeline()
                .into_iter()
                .map(|p| TimelineEntry {
                    timestamp: p.timestamp,
                    total: p.total,
                })
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ViewPayload {
    #[schema(value_type = String, example = "profile")]
    pub view: View,
}

/// Loads the account behind the session from the store.
async fn current_account(
    state: &AppState,
    session: &SessionHandle,
) -> Result<Account, (StatusCode, String)> {
    let email = session
        .lock()
        .await
        .current_user()
        .map(str::to_string)
        .ok_or((StatusCode::UNAUTHORIZED, "Not authenticated".to_string()))?;

    state.accounts.get_account(&email).await.map_err(|e| {
        error!("Failed to load account {}: {:?}", email, e);
        port_error_response(e)
    })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /profile - Account details and recent activity
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The logged-in account", body = ProfileResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let account = current_account(&state, &session).await?;
    Ok(Json(ProfileResponse::from_account(
        &account,
        Utc::now().date_naive(),
    )))
}

/// GET /analytics - Usage counts per technique and the activity timeline
#[utoipa::path(
    get,
    path = "/analytics",
    responses(
        (status = 200, description = "Usage analytics for the logged-in account", body = AnalyticsResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn analytics_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let account = current_account(&state, &session).await?;
    Ok(Json(AnalyticsResponse::from(&account)))
}

/// GET /view - The session's active view
#[utoipa::path(
    get,
    path = "/view",
    responses(
        (status = 200, description = "The active view", body = ViewPayload),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_view_handler(Extension(session): Extension<SessionHandle>) -> Json<ViewPayload> {
    Json(ViewPayload {
        view: session.lock().await.active_view(),
    })
}

/// PUT /view - Switch the session to another view
#[utoipa::path(
    put,
    path = "/view",
    request_body = ViewPayload,
    responses(
        (status = 200, description = "View switched", body = ViewPayload),
        (status = 400, description = "Unknown view"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn set_view_handler(
    Extension(session): Extension<SessionHandle>,
    Json(req): Json<ViewPayload>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut session = session.lock().await;
    session.switch_view(req.view).map_err(port_error_response)?;
    Ok(Json(ViewPayload {
        view: session.active_view(),
    }))
}
