use trailkeeper_core::{AppError, AppResult, TenantId};
use trailkeeper_domain::{AuditEvent, AuditStats, QueryFilter, RetentionPolicy, TimeRange};
use uuid::Uuid;

use crate::audit_ports::EventPage;

use super::IngestionService;

impl IngestionService {
    /// Fetches one event by tenant and identifier.
    pub async fn event(&self, tenant_id: TenantId, event_id: Uuid) -> AppResult<AuditEvent> {
        self.store
            .find_event(tenant_id, event_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "audit event '{event_id}' not found for tenant '{tenant_id}'"
                ))
            })
    }

    /// Queries events with pagination bounds applied.
    pub async fn query_events(&self, filter: QueryFilter) -> AppResult<EventPage> {
        self.store.query_events(filter.normalized()).await
    }

    /// Returns aggregate counts for one tenant over a time range.
    pub async fn event_stats(
        &self,
        tenant_id: TenantId,
        range: TimeRange,
    ) -> AppResult<AuditStats> {
        self.store.event_stats(tenant_id, range).await
    }

    /// Fetches one tenant's retention policy.
    pub async fn retention_policy(&self, tenant_id: TenantId) -> AppResult<RetentionPolicy> {
        self.store
            .find_retention_policy(tenant_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "no retention policy configured for tenant '{tenant_id}'"
                ))
            })
    }

    /// Validates and persists a retention policy.
    ///
    /// This is the enforcement boundary for the tier ordering invariant; the
    /// retention scheduler trusts persisted policies.
    pub async fn update_retention_policy(&self, policy: RetentionPolicy) -> AppResult<()> {
        policy.validate()?;
        self.store.save_retention_policy(policy).await
    }
}
