//! Client-side document intake.
//!
//! Files are read from disk, accepted only when they look like PDFs, held in
//! an in-memory queue under a locally generated id, and base64 encoded at
//! submission time.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{EncodedFile, DEFAULT_MIME_TYPE};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Only PDF files are supported right now.")]
    NotPdf { name: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A document queued for the next run.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Accept in-memory content, checking the name and declared type.
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, UploadError> {
        let name = name.into();
        let mime_type = mime_type.into();
        if !is_pdf(&name, &mime_type) {
            return Err(UploadError::NotPdf { name });
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            mime_type,
            bytes,
        })
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();

        if !is_pdf(&name, &mime_type) {
            return Err(UploadError::NotPdf { name });
        }

        let bytes = std::fs::read(path).map_err(|source| UploadError::Read {
            path: path.display().to_string(),
            source,
        })?;
        debug!("Read {} ({} bytes)", name, bytes.len());

        Self::new(name, mime_type, bytes)
    }

    /// Wire form with base64 content.
    pub fn encode(&self) -> EncodedFile {
        let mime_type = if self.mime_type.is_empty() {
            DEFAULT_MIME_TYPE.to_string()
        } else {
            self.mime_type.clone()
        };
        EncodedFile {
            name: self.name.clone(),
            mime_type,
            content: STANDARD.encode(&self.bytes),
        }
    }
}

fn is_pdf(name: &str, mime_type: &str) -> bool {
    mime_type == DEFAULT_MIME_TYPE || name.to_lowercase().ends_with(".pdf")
}

/// Files queued for submission, in the order they were added.
#[derive(Debug, Default)]
pub struct UploadQueue {
    files: Vec<UploadedFile>,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add files from disk. Rejected files are reported; the rest are queued.
    pub fn add_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Vec<UploadError> {
        let mut errors = Vec::new();
        for path in paths {
            match UploadedFile::from_path(path.as_ref()) {
                Ok(file) => self.push(file),
                Err(err) => errors.push(err),
            }
        }
        errors
    }

    pub fn push(&mut self, file: UploadedFile) {
        self.files.push(file);
    }

    /// Remove a queued file by id. Returns whether it was present.
    #[allow(dead_code)]
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|file| file.id != id);
        self.files.len() != before
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn encode_all(&self) -> Vec<EncodedFile> {
        self.files.iter().map(UploadedFile::encode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_pdf_detection() {
        assert!(is_pdf("report.PDF", ""));
        assert!(is_pdf("scan", "application/pdf"));
        assert!(!is_pdf("notes.txt", "text/plain"));
    }

    #[test]
    fn test_encode_uses_standard_base64() {
        let file = UploadedFile::new("a.pdf", "", b"%PDF-1.7".to_vec()).unwrap();
        let encoded = file.encode();
        assert_eq!(encoded.name, "a.pdf");
        assert_eq!(encoded.mime_type, "application/pdf");
        assert_eq!(encoded.content, "JVBERi0xLjc=");
    }

    #[test]
    fn test_queue_accepts_pdfs_and_reports_rejects() {
        let dir = TempDir::new().unwrap();
        let pdf = dir.path().join("filing.pdf");
        let txt = dir.path().join("notes.txt");
        fs::write(&pdf, b"%PDF-1.4").unwrap();
        fs::write(&txt, b"hello").unwrap();

        let mut queue = UploadQueue::new();
        let errors = queue.add_paths(&[&pdf, &txt]);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.files()[0].name, "filing.pdf");
        assert_eq!(queue.files()[0].mime_type, "application/pdf");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "Only PDF files are supported right now.");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let mut queue = UploadQueue::new();
        let errors = queue.add_paths(&[dir.path().join("gone.pdf")]);
        assert!(queue.is_empty());
        assert!(matches!(errors[0], UploadError::Read { .. }));
    }

    #[test]
    fn test_remove_by_id() {
        let mut queue = UploadQueue::new();
        queue.push(UploadedFile::new("a.pdf", "application/pdf", vec![1]).unwrap());
        queue.push(UploadedFile::new("b.pdf", "application/pdf", vec![2]).unwrap());
        let id = queue.files()[0].id.clone();

        assert!(queue.remove(&id));
        assert!(!queue.remove(&id));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.encode_all()[0].name, "b.pdf");
    }
}
