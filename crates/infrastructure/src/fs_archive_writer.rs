use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use flate2::Compression;
use flate2::write::GzEncoder;
use tokio::fs;

use trailkeeper_application::ArchiveWriter;
use trailkeeper_core::{AppError, AppResult, TenantId};
use trailkeeper_domain::AuditEvent;

#[cfg(test)]
mod tests;

/// Filesystem-backed archive writer producing JSON Lines files.
///
/// Archives land under `root/<tenant>/<year>/<month>/`, named by tenant and
/// cutoff date. One canonical-JSON event per line keeps a partially written
/// file parseable up to the last complete record. With compression enabled
/// the whole file is gzipped and the name gains a `.gz` suffix.
pub struct FsArchiveWriter {
    root: PathBuf,
    compress: bool,
}

impl FsArchiveWriter {
    /// Creates a writer rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, compress: bool) -> Self {
        Self {
            root: root.into(),
            compress,
        }
    }

    fn archive_path(&self, tenant_id: TenantId, cutoff_date: NaiveDate) -> PathBuf {
        let suffix = if self.compress { ".gz" } else { "" };
        self.root
            .join(tenant_id.to_string())
            .join(format!("{:04}", cutoff_date.year()))
            .join(format!("{:02}", cutoff_date.month()))
            .join(format!("audit-{tenant_id}-{cutoff_date}.jsonl{suffix}"))
    }

    fn encode(&self, events: &[AuditEvent]) -> AppResult<Vec<u8>> {
        let mut body = Vec::new();
        for event in events {
            body.extend_from_slice(&event.canonical_bytes()?);
            body.push(b'\n');
        }

        if !self.compress {
            return Ok(body);
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&body)
            .map_err(|error| AppError::Archive(format!("failed to compress archive: {error}")))?;
        encoder
            .finish()
            .map_err(|error| AppError::Archive(format!("failed to compress archive: {error}")))
    }
}

#[async_trait]
impl ArchiveWriter for FsArchiveWriter {
    async fn write_archive(
        &self,
        tenant_id: TenantId,
        cutoff_date: NaiveDate,
        events: &[AuditEvent],
    ) -> AppResult<String> {
        let path = self.archive_path(tenant_id, cutoff_date);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|error| {
                AppError::Archive(format!(
                    "failed to create archive directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }

        let body = self.encode(events)?;
        fs::write(&path, body).await.map_err(|error| {
            AppError::Archive(format!(
                "failed to write archive file '{}': {error}",
                path.display()
            ))
        })?;

        Ok(path.display().to_string())
    }
}
