use serde::{Deserialize, Serialize};

use crate::types::{FormMetadata, IssueKind, ValidationIssue, ValidationVerdict};

// ---------------------------------------------------------------------------
// Stored forms
// ---------------------------------------------------------------------------

/// A stored form as listed by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    pub form_id: String,
    pub order: i64,
    pub title: String,
    #[serde(default)]
    pub view_sequence: i64,
    #[serde(default)]
    pub input_type: i64,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionRecord {
    pub id: String,
    pub form_id: String,
    pub order: i64,
    pub option_id: i64,
    pub label: String,
    #[serde(default)]
    pub created_at: String,
}

/// Full details of one stored form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormDetails {
    pub form: FormRecord,
    #[serde(default)]
    pub questions: Vec<QuestionRecord>,
    #[serde(default)]
    pub options: Vec<OptionRecord>,
    #[serde(default)]
    pub questions_count: u32,
    #[serde(default)]
    pub options_count: u32,
}

/// Response of the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormsList {
    pub forms: Vec<FormRecord>,
    #[serde(default)]
    pub count: u32,
}

/// Plain acknowledgement (`{"message": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Parsed schema
// ---------------------------------------------------------------------------

/// Text with a default-language variant (`{"default": "..."}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    #[serde(default)]
    pub default: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    #[serde(default)]
    pub questions_count: u32,
    #[serde(default)]
    pub options_count: u32,
    #[serde(default)]
    pub parse_time: f64,
    #[serde(default)]
    pub created_at: String,
}

/// Form schema produced by the parser, stored or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSchema {
    #[serde(default)]
    pub id: Option<String>,
    pub title: LocalizedText,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub groups: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SchemaMetadata>,
}

impl ParsedSchema {
    /// Number of questions across all groups, counting nested `questions`
    /// arrays when the metadata block is absent.
    pub fn questions_count(&self) -> u32 {
        if let Some(meta) = &self.metadata {
            return meta.questions_count;
        }
        self.groups
            .iter()
            .filter_map(|g| g.get("questions").and_then(|q| q.as_array()))
            .map(|q| q.len() as u32)
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Response shape adapters
// ---------------------------------------------------------------------------

/// Display summary of a form, whatever shape the service answered with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormPreview {
    pub id: Option<String>,
    pub title: String,
    pub language: String,
    pub version: String,
    pub questions_count: u32,
    pub options_count: u32,
}

impl From<&FormDetails> for FormPreview {
    fn from(d: &FormDetails) -> Self {
        Self {
            id: Some(d.form.id.clone()),
            title: d.form.title.clone(),
            language: d.form.language.clone(),
            version: d.form.version.clone(),
            questions_count: if d.questions_count > 0 {
                d.questions_count
            } else {
                d.questions.len() as u32
            },
            options_count: if d.options_count > 0 {
                d.options_count
            } else {
                d.options.len() as u32
            },
        }
    }
}

impl From<&ParsedSchema> for FormPreview {
    fn from(s: &ParsedSchema) -> Self {
        Self {
            id: s.id.clone(),
            title: s.title.default.clone(),
            language: s.language.clone(),
            version: s.version.clone(),
            questions_count: s.questions_count(),
            options_count: s.metadata.as_ref().map_or(0, |m| m.options_count),
        }
    }
}

/// Every known shape of an upload/parse/get answer.
///
/// Variant order matters for untagged decoding: the array form first, then
/// the stored-details object (has `form`), then the bare schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormPayload {
    Many(Vec<FormDetails>),
    Details(Box<FormDetails>),
    Schema(Box<ParsedSchema>),
}

impl FormPayload {
    /// One preview per form contained in the payload.
    pub fn previews(&self) -> Vec<FormPreview> {
        match self {
            FormPayload::Many(items) => items.iter().map(FormPreview::from).collect(),
            FormPayload::Details(d) => vec![FormPreview::from(d.as_ref())],
            FormPayload::Schema(s) => vec![FormPreview::from(s.as_ref())],
        }
    }

    /// Id of the first stored form, if the service assigned one.
    pub fn first_id(&self) -> Option<String> {
        self.previews().into_iter().find_map(|p| p.id)
    }
}

/// Per-sheet structure check reported by the sheet-oriented validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetCheck {
    pub name: String,
    pub exists: bool,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub missing_columns: Vec<String>,
    #[serde(default)]
    pub row_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetFormMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub language: String,
}

/// Sheet-oriented validation answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetReport {
    pub valid: bool,
    pub message: String,
    pub sheets: Vec<SheetCheck>,
    #[serde(default)]
    pub form_metadata: SheetFormMetadata,
    #[serde(default)]
    pub questions_count: u32,
    #[serde(default)]
    pub options_count: u32,
}

/// Every known shape of a validation answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidatePayload {
    SheetReport(SheetReport),
    Structured(ValidationVerdict),
}

impl ValidatePayload {
    /// Normalizes the answer into a verdict.
    pub fn into_verdict(self) -> ValidationVerdict {
        match self {
            ValidatePayload::Structured(v) => v,
            ValidatePayload::SheetReport(report) => sheet_report_verdict(report),
        }
    }
}

fn sheet_report_verdict(report: SheetReport) -> ValidationVerdict {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for sheet in &report.sheets {
        if !sheet.exists {
            errors.push(ValidationIssue {
                suggestions: vec![format!("Add a sheet named '{}'", sheet.name)],
                ..ValidationIssue::new(
                    IssueKind::MissingSheet,
                    format!("Sheet '{}' is missing", sheet.name),
                    &sheet.name,
                )
            });
            continue;
        }
        for column in &sheet.missing_columns {
            errors.push(ValidationIssue {
                column: Some(column.clone()),
                row: Some(1),
                ..ValidationIssue::new(
                    IssueKind::MissingColumn,
                    format!("Column '{column}' is missing"),
                    &sheet.name,
                )
            });
        }
        if sheet.row_count == 0 {
            warnings.push(ValidationIssue::new(
                IssueKind::EmptySheet,
                format!("Sheet '{}' has no rows", sheet.name),
                &sheet.name,
            ));
        }
    }

    let meta = &report.form_metadata;
    let metadata = (!meta.title.is_empty()
        || !meta.language.is_empty()
        || report.questions_count > 0
        || report.options_count > 0)
        .then(|| FormMetadata {
            title: meta.title.clone(),
            language: meta.language.clone(),
            questions_count: report.questions_count,
            options_count: report.options_count,
        });

    ValidationVerdict {
        // A report may claim validity while listing structural gaps; gaps win.
        valid: report.valid && errors.is_empty(),
        message: report.message,
        errors,
        warnings,
        metadata,
    }
}
