//! Numbered JSON exports of query reports

use crate::report::QueryReport;
use dgrep_core::{Error, QueryResult, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// On-disk shape of one export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    /// Canonical query key
    pub query: String,
    pub outputs: Vec<QueryResult>,
}

/// Writes each report to `<dir>/query_<n>.json`, numbering from 1.
#[derive(Debug)]
pub struct JsonExporter {
    dir: PathBuf,
    next: AtomicUsize,
}

impl JsonExporter {
    /// Create the exporter, creating `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::file_system(&dir, "create export directory", e))?;
        Ok(Self {
            dir,
            next: AtomicUsize::new(1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one report and return the file it went to.
    pub async fn export(&self, report: &QueryReport) -> Result<PathBuf> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.join(format!("query_{n}.json"));

        let record = ExportRecord {
            query: report.key.clone(),
            outputs: report.results.clone(),
        };
        let json = serde_json::to_vec_pretty(&record)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| Error::file_system(&path, "write export", e))?;

        tracing::debug!(path = %path.display(), "Exported query results");
        Ok(path)
    }
}

/// Load an export written by [`JsonExporter::export`].
pub async fn read_export(path: &Path) -> Result<ExportRecord> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Error::file_system(path, "read export", e))?;
    Ok(serde_json::from_slice(&bytes)?)
}
