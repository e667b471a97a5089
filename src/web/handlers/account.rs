//! Service and account information handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::web::dto::{ApiResponse, DetailsResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// GET / - Liveness message.
pub async fn home() -> &'static str {
    "megagate is running"
}

/// GET /details - Account, quota and storage space information.
pub async fn details(
    State(state): State<Arc<AppState>>,
    AuthUser(_claims): AuthUser,
) -> Result<Json<ApiResponse<DetailsResponse>>, ApiError> {
    let storage = state.storage();

    let details = storage.get_user().await?;
    let quota = storage.get_quota().await?;
    let space = storage.get_storage_space().await?;

    Ok(Json(ApiResponse::new(DetailsResponse {
        details,
        quota,
        space,
    })))
}
