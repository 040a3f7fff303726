//! CLI command implementations
//!
//! Every command returns the process exit code:
//! 0 success, 2 configuration or validation error, 3 awaiting user decision,
//! 4 connection error, 5 fatal or transfer error, 6 cancelled.

pub mod init;
pub mod status;
pub mod transfer;
pub mod validate;

use crate::domain::{PlatformError, SyncError};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_AWAITING: i32 = 3;
pub const EXIT_CONNECTION: i32 = 4;
pub const EXIT_FATAL: i32 = 5;
pub const EXIT_CANCELLED: i32 = 6;

/// Exit code for a failed operation
pub fn exit_code_for(error: &SyncError) -> i32 {
    match error {
        SyncError::Configuration(_) | SyncError::Validation(_) => EXIT_CONFIG,
        SyncError::Platform(
            PlatformError::ConnectionFailed(_)
            | PlatformError::AuthenticationFailed(_)
            | PlatformError::Timeout(_),
        ) => EXIT_CONNECTION,
        _ => EXIT_FATAL,
    }
}
