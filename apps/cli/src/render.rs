//! Plain-text rendering of verdicts, events and status for the terminal.

use std::fmt::Write as _;
use std::time::Duration;

use formbatch_protocol::{FormPreview, ParseFailure, ValidationIssue, ValidationVerdict};
use formbatch_upload::{FileStatus, StatusView, UploadEvent};

pub fn preview(p: &FormPreview) -> String {
    let mut out = format!("\"{}\"", p.title);
    if let Some(id) = &p.id {
        let _ = write!(out, " [{id}]");
    }
    if !p.language.is_empty() {
        let _ = write!(out, " lang={}", p.language);
    }
    if !p.version.is_empty() {
        let _ = write!(out, " v{}", p.version);
    }
    let _ = write!(
        out,
        ", {} questions, {} options",
        p.questions_count, p.options_count
    );
    out
}

fn issue(prefix: &str, i: &ValidationIssue) -> String {
    let pos = i.position();
    let mut out = if pos.is_empty() {
        format!("  {prefix} {}", i.message)
    } else {
        format!("  {prefix} {pos}: {}", i.message)
    };
    for s in &i.suggestions {
        let _ = write!(out, "\n      hint: {s}");
    }
    out
}

/// One block per file: headline plus its errors and warnings.
pub fn verdict(name: &str, v: &ValidationVerdict) -> String {
    let mark = if v.valid { "ok" } else { "INVALID" };
    let mut out = format!("{name}: {mark}");
    if !v.message.is_empty() {
        let _ = write!(out, " ({})", v.message);
    }
    if let Some(meta) = &v.metadata {
        let _ = write!(
            out,
            "\n  form \"{}\" lang={} {} questions, {} options",
            meta.title, meta.language, meta.questions_count, meta.options_count
        );
    }
    for e in &v.errors {
        out.push('\n');
        out.push_str(&issue("error:", e));
    }
    for w in &v.warnings {
        out.push('\n');
        out.push_str(&issue("warning:", w));
    }
    out
}

pub fn parse_failure(f: &ParseFailure) -> String {
    let mut out = format!("{}\n  {}", f.message, f.detail);
    for s in &f.suggestions {
        let _ = write!(out, "\n  hint: {s}");
    }
    out
}

/// Terminal line for an event; `None` for events not worth a line.
pub fn event(e: &UploadEvent) -> Option<String> {
    Some(match e {
        UploadEvent::Started { total } => format!("uploading {total} file(s)"),
        UploadEvent::ChunkStarted { index, files } => {
            format!("chunk {} started ({} file(s))", index + 1, files.len())
        }
        UploadEvent::FileCommitted {
            name,
            form_id,
            previews,
            ..
        } => match (form_id, previews.first()) {
            (_, Some(p)) => format!("  committed {name}: {}", preview(p)),
            (Some(id), None) => format!("  committed {name} [{id}]"),
            (None, None) => format!("  committed {name}"),
        },
        UploadEvent::FileFailed { name, error, .. } => format!("  failed {name}: {error}"),
        UploadEvent::Progress { current, total } => format!("processed {current}/{total}"),
        UploadEvent::Paused { current, total } => {
            format!("paused at {current}/{total} (r to resume, c to cancel)")
        }
        UploadEvent::Resumed { current, total } => format!("resumed at {current}/{total}"),
        UploadEvent::Cancelled { current, total } => {
            format!("cancelled after {current}/{total}")
        }
        UploadEvent::Completed(summary) => {
            let mut out = format!(
                "done: {} succeeded, {} failed of {}",
                summary.succeeded, summary.failed, summary.total
            );
            for f in &summary.failures {
                let _ = write!(out, "\n  {}: {}", f.name, f.error);
            }
            out
        }
        UploadEvent::Recovered(notice) => {
            format!("recovered session: {notice} (saved {})", notice.saved_at)
        }
        UploadEvent::FormsReloaded(list) => format!("{} form(s) stored", list.count),
    })
}

/// `1m 05s`
pub fn duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

pub fn status(view: &StatusView) -> String {
    let mut out = format!(
        "{}: {} ({}%), {} succeeded, {} failed",
        view.state,
        view.progress_label(),
        view.percent(),
        view.succeeded,
        view.failed
    );
    if let Some(eta) = view.eta {
        let _ = write!(out, ", eta {}", duration(eta));
    }
    for row in &view.files {
        let state = match &row.status {
            FileStatus::Selected => "selected".to_string(),
            FileStatus::Valid => "valid".to_string(),
            FileStatus::Invalid => "invalid".to_string(),
            FileStatus::Pending => "pending".to_string(),
            FileStatus::InFlight => "uploading".to_string(),
            FileStatus::Committed { form_id: Some(id) } => format!("committed [{id}]"),
            FileStatus::Committed { form_id: None } => "committed".to_string(),
            FileStatus::Failed { error } => format!("failed: {error}"),
            FileStatus::Cancelled => "cancelled".to_string(),
        };
        let _ = write!(out, "\n  {:<32} {state}", row.name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use formbatch_protocol::IssueKind;
    use formbatch_upload::{Controls, UploadState, UploadSummary};

    #[test]
    fn verdict_lists_issues_with_position() {
        let mut missing = ValidationIssue::new(IssueKind::MissingColumn, "Missing column: type", "survey");
        missing.row = Some(1);
        missing.column = Some("type".into());
        let v = ValidationVerdict {
            valid: false,
            message: "1 error".into(),
            errors: vec![missing],
            warnings: vec![ValidationIssue::new(IssueKind::EmptySheet, "Sheet is empty", "choices")],
            metadata: None,
        };
        let text = verdict("a.xlsx", &v);
        assert!(text.starts_with("a.xlsx: INVALID (1 error)"));
        assert!(text.contains("error: survey:1/type: Missing column: type"));
        assert!(text.contains("warning: choices: Sheet is empty"));
    }

    #[test]
    fn completed_event_lists_failures() {
        let e = UploadEvent::Completed(UploadSummary {
            total: 3,
            succeeded: 2,
            failed: 1,
            failures: vec![formbatch_upload::FileFailure {
                file_id: formbatch_transfer::FileId::new(),
                name: "c.xlsx".into(),
                error: "boom".into(),
            }],
        });
        assert_eq!(
            event(&e).unwrap(),
            "done: 2 succeeded, 1 failed of 3\n  c.xlsx: boom"
        );
    }

    #[test]
    fn duration_format() {
        assert_eq!(duration(Duration::from_secs(9)), "9s");
        assert_eq!(duration(Duration::from_secs(65)), "1m 05s");
    }

    #[test]
    fn status_headline() {
        let view = StatusView {
            state: UploadState::Paused,
            current: 3,
            total: 6,
            succeeded: 3,
            failed: 0,
            eta: None,
            files: Vec::new(),
            controls: Controls::default(),
        };
        assert_eq!(status(&view), "paused: processed 3/6 (50%), 3 succeeded, 0 failed");
    }
}
