//! Plain-text extraction for files in the upload directory.

use anyhow::Context;
use async_trait::async_trait;
use drafter_core::ReferenceReader;
use std::path::{Path, PathBuf};

/// Reads `.txt`, `.md` and `.csv` uploads; other formats are rejected.
pub struct FsReferenceReader {
    base_dir: PathBuf,
}

impl FsReferenceReader {
    #[must_use]
    pub const fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Resolve a reference id to a file directly under the upload directory.
    fn resolve(&self, reference_id: &str) -> anyhow::Result<PathBuf> {
        let name = Path::new(reference_id)
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Invalid reference id: {reference_id}"))?;
        Ok(self.base_dir.join(name))
    }
}

#[async_trait]
impl ReferenceReader for FsReferenceReader {
    async fn read_text(&self, reference_id: &str) -> anyhow::Result<String> {
        let path = self.resolve(reference_id)?;
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "txt" | "md" | "csv" => tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display())),
            other => anyhow::bail!("Text extraction from .{other} files is not supported"),
        }
    }
}
