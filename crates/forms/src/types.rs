//! Result types for stored forms management.

use std::path::PathBuf;

use formbatch_protocol::{FormPreview, ValidationVerdict};

/// Result of replacing a stored form.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// Verdict of the validation pass that gated the update.
    pub verdict: ValidationVerdict,
    pub previews: Vec<FormPreview>,
}

/// Result of a bulk export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    /// `(form id, error)` for each form that could not be exported.
    pub failed: Vec<(String, String)>,
}
