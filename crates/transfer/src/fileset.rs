use crate::types::{FileHandle, FileId};

/// Ordered user selection. Appending never merges entries.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    files: Vec<FileHandle>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends files in the given order.
    pub fn add(&mut self, files: impl IntoIterator<Item = FileHandle>) {
        self.files.extend(files);
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileHandle> {
        self.files.iter()
    }

    pub fn get(&self, id: FileId) -> Option<&FileHandle> {
        self.files.iter().find(|f| f.id == id)
    }

    /// Copy of the current selection, in selection order.
    pub fn snapshot(&self) -> Vec<FileHandle> {
        self.files.clone()
    }
}
