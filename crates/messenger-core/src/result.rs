//! Convenience result type alias for the messenger.

use crate::error::AppError;

/// A specialized `Result` type for messenger operations.
pub type AppResult<T> = Result<T, AppError>;
