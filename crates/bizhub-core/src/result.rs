//! Convenience result type alias for BizHub.

use crate::error::AppError;

/// A specialized `Result` type for BizHub operations.
pub type AppResult<T> = Result<T, AppError>;
