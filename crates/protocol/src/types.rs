use serde::{Deserialize, Serialize};

/// Category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// The file could not be read or sent.
    FileError,
    InvalidFormat,
    MissingSheet,
    MissingColumn,
    EmptySheet,
    InvalidValue,
    DuplicateValue,
    FileTooLarge,
    ConnectionError,
    /// Any category this client does not know about yet.
    #[serde(other)]
    Other,
}

/// One error or warning attached to a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: location.into(),
            row: None,
            column: None,
            suggestions: Vec::new(),
        }
    }

    /// Renders `location[:row][/column]` for display.
    pub fn position(&self) -> String {
        let mut pos = self.location.clone();
        if let Some(row) = self.row {
            pos.push_str(&format!(":{row}"));
        }
        if let Some(column) = &self.column {
            pos.push_str(&format!("/{column}"));
        }
        pos
    }
}

/// Form-level facts the service extracts while validating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub questions_count: u32,
    #[serde(default)]
    pub options_count: u32,
}

/// Result of validating one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub valid: bool,
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ValidationIssue>,
    #[serde(default)]
    pub warnings: Vec<ValidationIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FormMetadata>,
}

impl ValidationVerdict {
    /// Synthetic verdict for a file whose validation call never produced an
    /// answer (unreadable content, network failure, bad response).
    pub fn validation_failed(file_name: &str, detail: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: "Validation failed".into(),
            errors: vec![ValidationIssue::new(
                IssueKind::FileError,
                detail,
                file_name,
            )],
            warnings: Vec::new(),
            metadata: None,
        }
    }
}

/// Classification of a parse-only failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    InvalidFormat,
    MissingSheet,
    MissingColumn,
    FileTooLarge,
    ConnectionError,
    Unknown,
}

impl ParseErrorKind {
    /// Classifies a failure from its HTTP status (if any) and detail text.
    ///
    /// `status == None` means the request never got an answer.
    pub fn classify(status: Option<u16>, detail: &str) -> Self {
        let Some(status) = status else {
            return ParseErrorKind::ConnectionError;
        };
        if status == 413 {
            return ParseErrorKind::FileTooLarge;
        }

        let detail = detail.to_ascii_lowercase();
        if detail.contains("too large") || detail.contains("size limit") {
            ParseErrorKind::FileTooLarge
        } else if detail.contains("sheet") {
            ParseErrorKind::MissingSheet
        } else if detail.contains("column") {
            ParseErrorKind::MissingColumn
        } else if detail.contains("format")
            || detail.contains(".xls")
            || detail.contains("excel")
            || detail.contains("zip file")
        {
            ParseErrorKind::InvalidFormat
        } else {
            ParseErrorKind::Unknown
        }
    }

    /// User-facing explanation.
    pub fn user_message(self) -> &'static str {
        match self {
            ParseErrorKind::InvalidFormat => "The file is not a readable Excel workbook.",
            ParseErrorKind::MissingSheet => "The workbook is missing a required sheet.",
            ParseErrorKind::MissingColumn => "A sheet is missing a required column.",
            ParseErrorKind::FileTooLarge => "The file is larger than the service accepts.",
            ParseErrorKind::ConnectionError => "The form service could not be reached.",
            ParseErrorKind::Unknown => "The form could not be parsed.",
        }
    }

    /// Remediation hints shown under the message.
    pub fn suggestions(self) -> &'static [&'static str] {
        match self {
            ParseErrorKind::InvalidFormat => &[
                "Save the file as .xlsx or .xls",
                "Check that the file is not password protected",
            ],
            ParseErrorKind::MissingSheet => &[
                "The workbook needs the sheets 'Forms', 'Questions Info' and 'Answer Options'",
                "Check sheet names for typos and trailing spaces",
            ],
            ParseErrorKind::MissingColumn => &[
                "Compare the header row against the form template",
                "Column names are case sensitive",
            ],
            ParseErrorKind::FileTooLarge => &[
                "Split the form into smaller workbooks",
                "Remove unused sheets and embedded images",
            ],
            ParseErrorKind::ConnectionError => &[
                "Check that the form service is running",
                "Check the configured API URL",
            ],
            ParseErrorKind::Unknown => &[],
        }
    }
}

/// A classified parse failure, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct ParseFailure {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Raw detail reported by the service or transport.
    pub detail: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ParseFailure {
    pub fn new(kind: ParseErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            message: kind.user_message().to_string(),
            detail: detail.into(),
            suggestions: kind.suggestions().iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Classifies and wraps a failure in one step.
    pub fn classify(status: Option<u16>, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self::new(ParseErrorKind::classify(status, &detail), detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&IssueKind::MissingColumn).unwrap(),
            "\"missing_column\""
        );
        let kind: IssueKind = serde_json::from_str("\"some_new_kind\"").unwrap();
        assert_eq!(kind, IssueKind::Other);
    }

    #[test]
    fn issue_omits_empty_optionals() {
        let issue = ValidationIssue::new(IssueKind::EmptySheet, "no rows", "Questions Info");
        let json = serde_json::to_string(&issue).unwrap();
        assert!(!json.contains("row"));
        assert!(!json.contains("column"));
        assert!(!json.contains("suggestions"));
    }

    #[test]
    fn issue_position_formatting() {
        let mut issue = ValidationIssue::new(IssueKind::InvalidValue, "bad", "Answer Options");
        assert_eq!(issue.position(), "Answer Options");
        issue.row = Some(12);
        issue.column = Some("Label".into());
        assert_eq!(issue.position(), "Answer Options:12/Label");
    }

    #[test]
    fn synthetic_verdict_shape() {
        let v = ValidationVerdict::validation_failed("a.xlsx", "connection refused");
        assert!(!v.valid);
        assert_eq!(v.message, "Validation failed");
        assert_eq!(v.errors.len(), 1);
        assert_eq!(v.errors[0].kind, IssueKind::FileError);
        assert_eq!(v.errors[0].location, "a.xlsx");
    }

    #[test]
    fn minimal_verdict_parses() {
        let v: ValidationVerdict =
            serde_json::from_str(r#"{"valid":true,"message":"File format is valid."}"#).unwrap();
        assert!(v.valid);
        assert!(v.errors.is_empty());
        assert!(v.metadata.is_none());
    }

    #[test]
    fn classify_parse_errors() {
        assert_eq!(
            ParseErrorKind::classify(None, "refused"),
            ParseErrorKind::ConnectionError
        );
        assert_eq!(
            ParseErrorKind::classify(Some(413), ""),
            ParseErrorKind::FileTooLarge
        );
        assert_eq!(
            ParseErrorKind::classify(Some(400), "Worksheet named 'Forms' not found"),
            ParseErrorKind::MissingSheet
        );
        assert_eq!(
            ParseErrorKind::classify(Some(400), "Missing column: Title"),
            ParseErrorKind::MissingColumn
        );
        assert_eq!(
            ParseErrorKind::classify(Some(400), "File is not a zip file"),
            ParseErrorKind::InvalidFormat
        );
        assert_eq!(
            ParseErrorKind::classify(Some(500), "something odd"),
            ParseErrorKind::Unknown
        );
    }

    #[test]
    fn parse_failure_carries_hints() {
        let failure = ParseFailure::classify(Some(413), "Request Entity Too Large");
        assert_eq!(failure.kind, ParseErrorKind::FileTooLarge);
        assert_eq!(failure.to_string(), ParseErrorKind::FileTooLarge.user_message());
        assert!(!failure.suggestions.is_empty());
    }
}
