use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use trailkeeper_application::{AuditStore, EventPage};
use trailkeeper_core::{AppError, AppResult, TenantId};
use trailkeeper_domain::{
    AuditEvent, AuditStats, AuditStatus, QueryFilter, RetentionPolicy, SortDirection, SortField,
    TimeRange,
};


/// In-memory audit store implementation.
///
/// Backs the test suite and embedded deployments, and doubles as the
/// executable reference for the query, stats and deletion semantics an
/// external store implementation must match.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    events: RwLock<Vec<AuditEvent>>,
    policies: RwLock<HashMap<TenantId, RetentionPolicy>>,
}

impl InMemoryAuditStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            policies: RwLock::new(HashMap::new()),
        }
    }
}

fn matches_filter(event: &AuditEvent, filter: &QueryFilter) -> bool {
    event.tenant_id == filter.tenant_id
        && filter
            .user_id
            .as_ref()
            .is_none_or(|value| event.user_id.as_ref() == Some(value))
        && filter
            .user_email
            .as_ref()
            .is_none_or(|value| event.user_email.as_ref() == Some(value))
        && (filter.categories.is_empty() || filter.categories.contains(&event.category))
        && (filter.event_types.is_empty() || filter.event_types.contains(&event.event_type))
        && (filter.actions.is_empty()
            || filter
                .actions
                .iter()
                .any(|action| action == event.action.as_str()))
        && (filter.severities.is_empty() || filter.severities.contains(&event.severity))
        && (filter.statuses.is_empty() || filter.statuses.contains(&event.status))
        && filter
            .resource_type
            .as_ref()
            .is_none_or(|value| event.resource_type.as_ref() == Some(value))
        && filter
            .resource_id
            .as_ref()
            .is_none_or(|value| event.resource_id.as_ref() == Some(value))
        && filter
            .ip_address
            .as_ref()
            .is_none_or(|value| event.ip_address.as_ref() == Some(value))
        && filter
            .time_range
            .is_none_or(|range| range.contains(event.created_at))
}

fn compare_events(left: &AuditEvent, right: &AuditEvent, field: SortField) -> Ordering {
    let by_field = match field {
        SortField::CreatedAt => left.created_at.cmp(&right.created_at),
        SortField::Category => left.category.as_str().cmp(right.category.as_str()),
        SortField::EventType => left.event_type.as_str().cmp(right.event_type.as_str()),
        SortField::Severity => left.severity.as_str().cmp(right.severity.as_str()),
        SortField::Status => left.status.as_str().cmp(right.status.as_str()),
        SortField::Action => left.action.as_str().cmp(right.action.as_str()),
        SortField::ResourceType => left
            .resource_type
            .as_deref()
            .unwrap_or_default()
            .cmp(right.resource_type.as_deref().unwrap_or_default()),
    };

    // Stable tie-break so pagination never reorders between pages.
    by_field
        .then_with(|| left.created_at.cmp(&right.created_at))
        .then_with(|| left.id.cmp(&right.id))
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn create_event(&self, event: AuditEvent) -> AppResult<()> {
        let mut events = self.events.write().await;

        if events
            .iter()
            .any(|stored| stored.tenant_id == event.tenant_id && stored.id == event.id)
        {
            return Err(AppError::Conflict(format!(
                "audit event '{}' already exists for tenant '{}'",
                event.id, event.tenant_id
            )));
        }

        events.push(event);
        Ok(())
    }

    async fn create_event_batch(&self, batch: Vec<AuditEvent>) -> AppResult<()> {
        let mut events = self.events.write().await;

        for event in &batch {
            if events
                .iter()
                .any(|stored| stored.tenant_id == event.tenant_id && stored.id == event.id)
            {
                return Err(AppError::Conflict(format!(
                    "audit event '{}' already exists for tenant '{}'",
                    event.id, event.tenant_id
                )));
            }
        }

        events.extend(batch);
        Ok(())
    }

    async fn find_event(
        &self,
        tenant_id: TenantId,
        event_id: Uuid,
    ) -> AppResult<Option<AuditEvent>> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .find(|event| event.tenant_id == tenant_id && event.id == event_id)
            .cloned())
    }

    async fn query_events(&self, filter: QueryFilter) -> AppResult<EventPage> {
        let mut matching: Vec<AuditEvent> = self
            .events
            .read()
            .await
            .iter()
            .filter(|event| matches_filter(event, &filter))
            .cloned()
            .collect();

        matching.sort_by(|left, right| {
            let ordering = compare_events(left, right, filter.sort_field);
            match filter.sort_direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });

        let total_count = matching.len() as u64;
        let events = matching
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .collect();

        Ok(EventPage {
            events,
            total_count,
        })
    }

    async fn event_stats(&self, tenant_id: TenantId, range: TimeRange) -> AppResult<AuditStats> {
        let events = self.events.read().await;
        let mut stats = AuditStats::default();

        for event in events
            .iter()
            .filter(|event| event.tenant_id == tenant_id && range.contains(event.created_at))
        {
            stats.total_events += 1;
            *stats
                .events_by_category
                .entry(event.category.as_str().to_owned())
                .or_default() += 1;
            *stats
                .events_by_severity
                .entry(event.severity.as_str().to_owned())
                .or_default() += 1;
            *stats
                .events_by_status
                .entry(event.status.as_str().to_owned())
                .or_default() += 1;
            if event.status == AuditStatus::Failure {
                stats.failed_events += 1;
            }
        }

        Ok(stats)
    }

    async fn find_retention_policy(
        &self,
        tenant_id: TenantId,
    ) -> AppResult<Option<RetentionPolicy>> {
        Ok(self.policies.read().await.get(&tenant_id).cloned())
    }

    async fn save_retention_policy(&self, policy: RetentionPolicy) -> AppResult<()> {
        self.policies.write().await.insert(policy.tenant_id, policy);
        Ok(())
    }

    async fn delete_events_before(
        &self,
        tenant_id: TenantId,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|event| event.tenant_id != tenant_id || event.created_at > cutoff);

        Ok((before - events.len()) as u64)
    }

    async fn list_tenants_with_events(&self) -> AppResult<Vec<TenantId>> {
        let mut tenants: Vec<TenantId> = self
            .events
            .read()
            .await
            .iter()
            .map(|event| event.tenant_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        tenants.sort();

        Ok(tenants)
    }
}
