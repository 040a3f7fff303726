//! Transfer orchestration
//!
//! [`TransferService`] is what callers use; it owns the progress repository
//! and spawns one [`TransferOrchestrator`] run per submitted request.

pub mod completeness;
pub mod orchestrator;
pub mod report;
pub mod service;

pub use orchestrator::TransferOrchestrator;
pub use service::{TransferHandle, TransferService};
