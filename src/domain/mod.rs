//! Domain models and types for dhis2sync.
//!
//! This module contains the core domain models, types, and business rules.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`TaskId`], [`Uid`], [`Period`])
//! - **Transfer inputs** ([`TransferRequest`], [`Resolution`])
//! - **Values and summaries** ([`ReportedValue`], [`ImportSummary`])
//! - **Progress state machine** ([`TransferProgress`], [`TransferStatus`])
//! - **Error types** ([`SyncError`], [`PlatformError`], [`ImportError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, SyncError>`]:
//!
//! ```rust
//! use dhis2sync::domain::{Result, TransferRequest};
//!
//! fn check(request: &TransferRequest) -> Result<()> {
//!     request.validate()?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod ids;
pub mod progress;
pub mod request;
pub mod result;
pub mod summary;
pub mod value;

// Re-export commonly used types for convenience
pub use errors::{ImportError, PlatformError, SyncError};
pub use ids::{Period, PeriodType, TaskId, Uid};
pub use progress::{TransferProgress, TransferStatus, MAX_LOG_MESSAGES};
pub use request::{
    OrgUnitSelection, Resolution, ResolutionAction, ResolutionKind, TransferRequest,
};
pub use result::Result;
pub use summary::{Conflict, ImportCount, ImportSummary};
pub use value::ReportedValue;
