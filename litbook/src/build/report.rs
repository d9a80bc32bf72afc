use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Failure, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pass,
    Fail,
    /// Not compiled, or stopped early, because another document failed
    /// under fail-fast.
    Cancelled,
}

/// Outcome of one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    /// Path relative to the input root, with forward slashes.
    pub document_path: String,
    /// Path of the source file on disk.
    #[serde(skip)]
    pub source_path: PathBuf,
    pub status: DocumentStatus,
    /// True when the previous rendering was reused without executing.
    pub cached: bool,
    pub failures: Vec<Failure>,
}

impl DocumentReport {
    pub fn pass(document_path: String, source_path: PathBuf, cached: bool) -> Self {
        DocumentReport {
            document_path,
            source_path,
            status: DocumentStatus::Pass,
            cached,
            failures: Vec::new(),
        }
    }

    pub fn fail(document_path: String, source_path: PathBuf, failures: Vec<Failure>) -> Self {
        DocumentReport {
            document_path,
            source_path,
            status: DocumentStatus::Fail,
            cached: false,
            failures,
        }
    }

    pub fn cancelled(document_path: String, source_path: PathBuf) -> Self {
        DocumentReport {
            document_path,
            source_path,
            status: DocumentStatus::Cancelled,
            cached: false,
            failures: Vec::new(),
        }
    }
}

/// Machine-readable summary of a build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub documents: Vec<DocumentReport>,
    pub passed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl BuildReport {
    pub fn from_documents(documents: Vec<DocumentReport>) -> Self {
        let count = |status| documents.iter().filter(|d| d.status == status).count();
        let passed = count(DocumentStatus::Pass);
        let failed = count(DocumentStatus::Fail);
        let cancelled = count(DocumentStatus::Cancelled);
        BuildReport {
            documents,
            passed,
            failed,
            cancelled,
        }
    }

    pub fn is_success(&self) -> bool {
        self.documents
            .iter()
            .all(|d| d.status == DocumentStatus::Pass)
    }

    /// Process exit status: 0 iff every document passed.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn document(&self, document_path: &str) -> Option<&DocumentReport> {
        self.documents
            .iter()
            .find(|d| d.document_path == document_path)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        std::fs::write(path, self.to_json()?).map_err(|e| Error::io(path, e))
    }
}
