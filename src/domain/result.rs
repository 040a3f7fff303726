//! Result type alias for dhis2sync

use super::errors::SyncError;

/// Result type alias for dhis2sync operations
///
/// # Examples
///
/// ```
/// use dhis2sync::domain::result::Result;
/// use dhis2sync::domain::errors::SyncError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(SyncError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, SyncError>;
