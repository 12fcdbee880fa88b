//! Stored forms management: list, show, delete, update, parse-only, export.
//!
//! This crate implements the **business logic** for managing forms already
//! stored by the service. It is a library crate with no HTTP dependency;
//! the application provides a `FormsConnection` implementation that bridges
//! to the actual client.
//!
//! # Operations
//!
//! - **List / Show**: all stored forms, or one form with its questions and options
//! - **Delete**: one form, or every form
//! - **Update**: revalidate a replacement workbook, then replace the stored form
//! - **Parse**: parse a workbook without storing it, with classified failures
//! - **Export**: write stored forms to disk as pretty JSON

pub mod error;
pub mod manager;
pub mod types;

// Re-export primary types for convenience.
pub use error::FormsError;
pub use manager::{FormsConnection, FormsManager, export_file_name};
pub use types::{ExportReport, UpdateOutcome};
