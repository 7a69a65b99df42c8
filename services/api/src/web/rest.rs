//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification, collecting the
//! handlers of every view.

use utoipa::OpenApi;

use crate::web::{account, auth, enhance};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        enhance::techniques_handler,
        enhance::upload_handler,
        enhance::apply_handler,
        enhance::original_preview_handler,
        enhance::enhanced_preview_handler,
        enhance::download_handler,
        account::profile_handler,
        account::analytics_handler,
        account::get_view_handler,
        account::set_view_handler,
    ),
    components(
        schemas(
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            enhance::UploadResponse,
            enhance::ApplyRequest,
            enhance::ApplyResponse,
            enhance::TechniqueInfo,
            account::ActivityEntry,
            account::ProfileResponse,
            account::TechniqueUsage,
            account::TimelineEntry,
            account::AnalyticsResponse,
            account::ViewPayload,
        )
    ),
    tags(
        (name = "Image Enhancer API", description = "Accounts, image enhancement and usage analytics.")
    )
)]
pub struct ApiDoc;
