use async_trait::async_trait;
use chrono::NaiveDate;
use trailkeeper_core::{AppResult, TenantId};
use trailkeeper_domain::AuditEvent;

/// Port for writing aged-out events to archive storage.
#[async_trait]
pub trait ArchiveWriter: Send + Sync {
    /// Writes one tenant's aged-out events as a single archive named by
    /// tenant and cutoff date; returns the written location for logging.
    async fn write_archive(
        &self,
        tenant_id: TenantId,
        cutoff_date: NaiveDate,
        events: &[AuditEvent],
    ) -> AppResult<String>;
}
