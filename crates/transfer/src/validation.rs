use std::path::Path;

use crate::TransferError;
use crate::types::FileHandle;

/// MIME type of an Office Open XML workbook.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// MIME type of a legacy Excel workbook.
pub const XLS_MIME: &str = "application/vnd.ms-excel";

const OCTET_STREAM: &str = "application/octet-stream";

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Guesses the content type from the file extension.
pub fn content_type_for(name: &str) -> &'static str {
    match extension(name).as_deref() {
        Some("xlsx") => XLSX_MIME,
        Some("xls") => XLS_MIME,
        _ => OCTET_STREAM,
    }
}

/// Whether a file looks like a workbook, by extension or by MIME type.
pub fn is_spreadsheet(name: &str, content_type: &str) -> bool {
    matches!(extension(name).as_deref(), Some("xlsx" | "xls"))
        || content_type == XLSX_MIME
        || content_type == XLS_MIME
}

/// Checks a handle before it joins a selection.
///
/// Rejects:
/// - Files that are neither `.xls`/`.xlsx` nor carry a spreadsheet MIME type
/// - Empty files
pub fn check_selectable(handle: &FileHandle) -> Result<(), TransferError> {
    if !is_spreadsheet(&handle.name, &handle.content_type) {
        return Err(TransferError::Rejected {
            name: handle.name.clone(),
            reason: "only .xls and .xlsx files are accepted".into(),
        });
    }
    if handle.size == 0 {
        return Err(TransferError::Rejected {
            name: handle.name.clone(),
            reason: "file is empty".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for("a.xlsx"), XLSX_MIME);
        assert_eq!(content_type_for("A.XLS"), XLS_MIME);
        assert_eq!(content_type_for("notes.txt"), OCTET_STREAM);
        assert_eq!(content_type_for("noext"), OCTET_STREAM);
    }

    #[test]
    fn accepts_by_extension_or_mime() {
        assert!(is_spreadsheet("form.xlsx", OCTET_STREAM));
        assert!(is_spreadsheet("upload", XLS_MIME));
        assert!(!is_spreadsheet("form.csv", "text/csv"));
    }

    #[test]
    fn rejects_non_spreadsheet() {
        let handle = FileHandle::from_bytes("form.csv", "text/csv", vec![1u8]);
        assert!(matches!(
            check_selectable(&handle),
            Err(TransferError::Rejected { .. })
        ));
    }

    #[test]
    fn rejects_empty_file() {
        let handle = FileHandle::from_bytes("form.xlsx", XLSX_MIME, Vec::<u8>::new());
        let err = check_selectable(&handle).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn accepts_workbook() {
        let handle = FileHandle::from_bytes("form.xlsx", XLSX_MIME, vec![1u8]);
        assert!(check_selectable(&handle).is_ok());
    }
}
