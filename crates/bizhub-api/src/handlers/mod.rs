//! Route handlers organized by domain.

pub mod approval;
pub mod health;
pub mod notification;
pub mod presence;

use axum::Json;

use crate::dto::response::ApiResponse;
use crate::error::ApiError;

/// Handler return type: a wrapped JSON body or a mapped error.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wrap `data` in a success envelope.
pub fn ok<T: serde::Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}
