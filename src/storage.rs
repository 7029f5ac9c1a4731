//! Filesystem storage for invoice PDFs.
//!
//! Files live under a root upload directory and are addressed by paths
//! relative to it, which is also what the invoice rows store.

use crate::errors::{Error, Result};
use std::path::{Component, Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// Subdirectory holding invoice PDFs.
const INVOICE_DIR: &str = "invoices";

/// Reads and writes invoice files under a root directory.
#[derive(Debug, Clone)]
pub struct InvoiceFiles {
    root: PathBuf,
}

impl InvoiceFiles {
    /// Stores files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root upload directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A fresh `invoices/<uuid>.pdf` relative path.
    #[must_use]
    pub fn new_pdf_path() -> String {
        format!("{INVOICE_DIR}/{}.pdf", Uuid::new_v4())
    }

    /// Absolute location of `relative`; paths escaping the root are rejected.
    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        if !path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(Error::validation(format!("Invalid file path: {relative}")));
        }
        Ok(self.root.join(path))
    }

    /// Writes `bytes` to `relative`, creating parent directories.
    ///
    /// # Errors
    /// Returns a classified I/O error; a partially written file is removed.
    pub async fn write(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::from_io(e, parent))?;
        }

        if let Err(e) = tokio::fs::write(&path, bytes).await {
            self.remove_quietly(relative).await;
            return Err(Error::from_io(e, &path));
        }
        Ok(())
    }

    /// Reads the file at `relative`.
    ///
    /// # Errors
    /// Returns [`Error::FileNotFound`] or [`Error::PermissionDenied`] when
    /// applicable, otherwise [`Error::Io`].
    pub async fn read(&self, relative: &str) -> Result<Vec<u8>> {
        let path = self.resolve(relative)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::from_io(e, &path))
    }

    /// Removes the file at `relative`.
    ///
    /// # Errors
    /// Returns a classified I/O error, including when the file is missing.
    pub async fn remove(&self, relative: &str) -> Result<()> {
        let path = self.resolve(relative)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| Error::from_io(e, &path))
    }

    /// Removes the file at `relative`, logging instead of failing.
    pub async fn remove_quietly(&self, relative: &str) {
        if let Err(e) = self.remove(relative).await {
            warn!(path = relative, error = %e, "Failed to remove invoice file");
        }
    }
}
