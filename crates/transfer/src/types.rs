use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use formbatch_protocol::FilePart;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TransferError;
use crate::validation::content_type_for;

/// Batch-local identifier of a selected file.
///
/// Two selections of the same file on disk get different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where the bytes of a handle come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Re-read from disk on every request.
    Path(PathBuf),
    /// Held in memory for the lifetime of the process.
    Memory(Arc<[u8]>),
    /// Restored from a snapshot without a way to get the bytes back.
    Unavailable,
}

/// A selected file. Immutable once created.
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub source: FileSource,
}

/// Serializable metadata of a [`FileHandle`]; never carries bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub id: FileId,
    pub name: String,
    pub size: u64,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl FileHandle {
    /// Builds a handle for a file on disk, reading its metadata.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, TransferError> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(TransferError::Rejected {
                name: path.display().to_string(),
                reason: "not a regular file".into(),
            });
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            id: FileId::new(),
            content_type: content_type_for(&name).to_string(),
            name,
            size: meta.len(),
            last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Builds a handle around bytes already in memory.
    pub fn from_bytes(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
    ) -> Self {
        let data = data.into();
        Self {
            id: FileId::new(),
            name: name.into(),
            size: data.len() as u64,
            content_type: content_type.into(),
            last_modified: None,
            source: FileSource::Memory(data),
        }
    }

    /// Rebuilds a handle from persisted metadata.
    ///
    /// Path-backed descriptors become readable again; anything else is
    /// [`FileSource::Unavailable`].
    pub fn from_descriptor(desc: FileDescriptor) -> Self {
        let source = match desc.path {
            Some(path) => FileSource::Path(path),
            None => FileSource::Unavailable,
        };
        Self {
            id: desc.id,
            name: desc.name,
            size: desc.size,
            content_type: desc.content_type,
            last_modified: desc.last_modified,
            source,
        }
    }

    pub fn descriptor(&self) -> FileDescriptor {
        FileDescriptor {
            id: self.id,
            name: self.name.clone(),
            size: self.size,
            content_type: self.content_type.clone(),
            last_modified: self.last_modified,
            path: match &self.source {
                FileSource::Path(p) => Some(p.clone()),
                _ => None,
            },
        }
    }

    /// Whether the bytes can still be produced.
    pub fn is_readable(&self) -> bool {
        !matches!(self.source, FileSource::Unavailable)
    }

    /// Loads the content as a multipart file part.
    pub async fn read(&self) -> Result<FilePart, TransferError> {
        let data = match &self.source {
            FileSource::Path(path) => tokio::fs::read(path).await?,
            FileSource::Memory(bytes) => bytes.to_vec(),
            FileSource::Unavailable => {
                return Err(TransferError::ContentUnavailable(self.name.clone()));
            }
        };
        Ok(FilePart {
            file_name: self.name.clone(),
            content_type: self.content_type.clone(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::XLSX_MIME;

    #[test]
    fn file_ids_are_unique() {
        assert_ne!(FileId::new(), FileId::new());
    }

    #[test]
    fn descriptor_serializes_camel_case() {
        let handle = FileHandle::from_bytes("a.xlsx", XLSX_MIME, vec![1u8, 2, 3]);
        let json = serde_json::to_string(&handle.descriptor()).unwrap();
        assert!(json.contains("\"contentType\""));
        assert!(!json.contains("path"));
        assert!(!json.contains("lastModified"));
    }

    #[tokio::test]
    async fn memory_handle_reads_back() {
        let handle = FileHandle::from_bytes("a.xlsx", XLSX_MIME, vec![7u8; 4]);
        assert_eq!(handle.size, 4);
        let part = handle.read().await.unwrap();
        assert_eq!(part.file_name, "a.xlsx");
        assert_eq!(part.data, vec![7u8; 4]);
    }

    #[tokio::test]
    async fn path_handle_survives_descriptor_round() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.xlsx");
        std::fs::write(&path, b"PK\x03\x04").unwrap();

        let handle = FileHandle::from_path(&path).await.unwrap();
        assert_eq!(handle.name, "survey.xlsx");
        assert_eq!(handle.content_type, XLSX_MIME);
        assert!(handle.last_modified.is_some());

        let restored = FileHandle::from_descriptor(handle.descriptor());
        assert_eq!(restored.id, handle.id);
        assert!(restored.is_readable());
        assert_eq!(restored.read().await.unwrap().data, b"PK\x03\x04");
    }

    #[tokio::test]
    async fn memory_handle_is_unavailable_after_restore() {
        let handle = FileHandle::from_bytes("a.xlsx", XLSX_MIME, vec![1u8]);
        let restored = FileHandle::from_descriptor(handle.descriptor());
        assert!(!restored.is_readable());
        assert!(matches!(
            restored.read().await,
            Err(TransferError::ContentUnavailable(name)) if name == "a.xlsx"
        ));
    }

    #[tokio::test]
    async fn directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FileHandle::from_path(dir.path()).await,
            Err(TransferError::Rejected { .. })
        ));
    }
}
