//! The user's current batch plus everything derived from it.

use std::collections::HashMap;

use formbatch_protocol::{FormPreview, ValidationVerdict};
use formbatch_transfer::{FileHandle, FileId, FileSet, TransferError, check_selectable};
use tracing::debug;

/// Selected files with their verdicts and previews.
///
/// Any change to the file list invalidates `all_valid` until the next full
/// validation pass.
#[derive(Debug, Default)]
pub struct Selection {
    files: FileSet,
    verdicts: HashMap<FileId, ValidationVerdict>,
    previews: HashMap<FileId, FormPreview>,
    all_valid: bool,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends files that pass the local spreadsheet check.
    ///
    /// Returns the rejections; accepted files keep their order.
    pub fn add(&mut self, files: impl IntoIterator<Item = FileHandle>) -> Vec<TransferError> {
        let mut rejected = Vec::new();
        let mut accepted = Vec::new();
        for file in files {
            match check_selectable(&file) {
                Ok(()) => accepted.push(file),
                Err(e) => {
                    debug!(file = %file.name, error = %e, "file rejected");
                    rejected.push(e);
                }
            }
        }
        if !accepted.is_empty() {
            self.files.add(accepted);
            self.all_valid = false;
        }
        rejected
    }

    /// Empties the selection and all derived state.
    pub fn clear(&mut self) {
        self.files.clear();
        self.verdicts.clear();
        self.previews.clear();
        self.all_valid = false;
    }

    pub fn files(&self) -> &FileSet {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn verdict(&self, id: FileId) -> Option<&ValidationVerdict> {
        self.verdicts.get(&id)
    }

    pub fn verdicts(&self) -> &HashMap<FileId, ValidationVerdict> {
        &self.verdicts
    }

    pub fn preview(&self, id: FileId) -> Option<&FormPreview> {
        self.previews.get(&id)
    }

    pub fn all_valid(&self) -> bool {
        self.all_valid
    }

    /// Stores a verdict for a selected file, replacing any earlier one.
    ///
    /// Ignored when the file is no longer selected.
    pub fn record(&mut self, id: FileId, verdict: ValidationVerdict) {
        if self.files.get(id).is_none() {
            return;
        }
        match &verdict.metadata {
            Some(meta) => {
                self.previews.insert(
                    id,
                    FormPreview {
                        id: None,
                        title: meta.title.clone(),
                        language: meta.language.clone(),
                        version: String::new(),
                        questions_count: meta.questions_count,
                        options_count: meta.options_count,
                    },
                );
            }
            None => {
                self.previews.remove(&id);
            }
        }
        self.verdicts.insert(id, verdict);
    }

    /// Recomputes `all_valid`: every selected file has a valid verdict.
    pub fn recompute_all_valid(&mut self) -> bool {
        let valid = self
            .files
            .iter()
            .filter(|f| self.verdicts.get(&f.id).is_some_and(|v| v.valid))
            .count();
        self.all_valid = !self.files.is_empty() && valid == self.files.len();
        self.all_valid
    }
}
