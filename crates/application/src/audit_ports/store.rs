use async_trait::async_trait;
use chrono::{DateTime, Utc};
use trailkeeper_core::{AppResult, TenantId};
use trailkeeper_domain::{AuditEvent, AuditStats, QueryFilter, RetentionPolicy, TimeRange};
use uuid::Uuid;

/// One page of query results together with the total match count.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPage {
    /// Events on this page, in the requested sort order.
    pub events: Vec<AuditEvent>,
    /// Total events matching the filter across all pages.
    pub total_count: u64,
}

/// Port for the durable audit event store.
///
/// Implementations must be safe for concurrent use: the ingestion worker and
/// the retention and integrity services call the same store without any
/// in-process locking above it.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persists one event.
    async fn create_event(&self, event: AuditEvent) -> AppResult<()>;

    /// Persists a batch of events in one call, preserving slice order.
    async fn create_event_batch(&self, events: Vec<AuditEvent>) -> AppResult<()>;

    /// Finds one event by tenant and identifier.
    async fn find_event(&self, tenant_id: TenantId, event_id: Uuid)
    -> AppResult<Option<AuditEvent>>;

    /// Queries events matching a filter.
    async fn query_events(&self, filter: QueryFilter) -> AppResult<EventPage>;

    /// Returns aggregate counts for one tenant over a time range.
    async fn event_stats(&self, tenant_id: TenantId, range: TimeRange) -> AppResult<AuditStats>;

    /// Finds the retention policy for one tenant.
    async fn find_retention_policy(&self, tenant_id: TenantId)
    -> AppResult<Option<RetentionPolicy>>;

    /// Creates or replaces one tenant's retention policy.
    async fn save_retention_policy(&self, policy: RetentionPolicy) -> AppResult<()>;

    /// Deletes events created at or before the cutoff; returns the count removed.
    async fn delete_events_before(
        &self,
        tenant_id: TenantId,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Lists every tenant that currently has audit events.
    async fn list_tenants_with_events(&self) -> AppResult<Vec<TenantId>>;
}
