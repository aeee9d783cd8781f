use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use trailkeeper_core::{AppError, AppResult, TenantId};
use trailkeeper_domain::{
    AuditCategory, AuditEvent, AuditEventInput, AuditEventType, AuditSeverity, AuditStats,
    AuditStatus, QueryFilter, RetentionPolicy, TimeRange,
};

use crate::audit_ports::{ArchiveWriter, AuditStore, EventPage};

use super::{RetentionConfig, RetentionService};

#[derive(Default)]
struct FakeRetentionStore {
    events: Mutex<Vec<AuditEvent>>,
    policies: Mutex<HashMap<TenantId, RetentionPolicy>>,
    delete_calls: Mutex<Vec<(TenantId, DateTime<Utc>)>>,
    failing_policy_tenants: Vec<TenantId>,
}

impl FakeRetentionStore {
    async fn insert_event(&self, event: AuditEvent) {
        self.events.lock().await.push(event);
    }

    async fn insert_policy(&self, policy: RetentionPolicy) {
        self.policies.lock().await.insert(policy.tenant_id, policy);
    }
}

#[async_trait]
impl AuditStore for FakeRetentionStore {
    async fn create_event(&self, event: AuditEvent) -> AppResult<()> {
        self.insert_event(event).await;
        Ok(())
    }

    async fn create_event_batch(&self, events: Vec<AuditEvent>) -> AppResult<()> {
        self.events.lock().await.extend(events);
        Ok(())
    }

    async fn find_event(
        &self,
        _tenant_id: TenantId,
        _event_id: Uuid,
    ) -> AppResult<Option<AuditEvent>> {
        Ok(None)
    }

    async fn query_events(&self, filter: QueryFilter) -> AppResult<EventPage> {
        let mut events: Vec<AuditEvent> = self
            .events
            .lock()
            .await
            .iter()
            .filter(|event| {
                event.tenant_id == filter.tenant_id
                    && filter
                        .time_range
                        .is_none_or(|range| range.contains(event.created_at))
            })
            .cloned()
            .collect();
        events.sort_by_key(|event| event.created_at);
        let total_count = events.len() as u64;
        events.truncate(filter.limit);

        Ok(EventPage {
            events,
            total_count,
        })
    }

    async fn event_stats(&self, _tenant_id: TenantId, _range: TimeRange) -> AppResult<AuditStats> {
        Ok(AuditStats::default())
    }

    async fn find_retention_policy(
        &self,
        tenant_id: TenantId,
    ) -> AppResult<Option<RetentionPolicy>> {
        if self.failing_policy_tenants.contains(&tenant_id) {
            return Err(AppError::Storage(format!(
                "policy lookup failed for tenant '{tenant_id}'"
            )));
        }

        Ok(self.policies.lock().await.get(&tenant_id).cloned())
    }

    async fn save_retention_policy(&self, policy: RetentionPolicy) -> AppResult<()> {
        self.insert_policy(policy).await;
        Ok(())
    }

    async fn delete_events_before(
        &self,
        tenant_id: TenantId,
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        self.delete_calls.lock().await.push((tenant_id, cutoff));

        let mut events = self.events.lock().await;
        let before = events.len();
        events.retain(|event| event.tenant_id != tenant_id || event.created_at > cutoff);

        Ok((before - events.len()) as u64)
    }

    async fn list_tenants_with_events(&self) -> AppResult<Vec<TenantId>> {
        let mut tenants: Vec<TenantId> = self
            .events
            .lock()
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

#[derive(Default)]
struct RecordingArchiveWriter {
    writes: Mutex<Vec<(TenantId, NaiveDate, Vec<AuditEvent>)>>,
    fail: bool,
}

impl RecordingArchiveWriter {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ArchiveWriter for RecordingArchiveWriter {
    async fn write_archive(
        &self,
        tenant_id: TenantId,
        cutoff_date: NaiveDate,
        events: &[AuditEvent],
    ) -> AppResult<String> {
        if self.fail {
            return Err(AppError::Archive(
                "archive destination unavailable".to_owned(),
            ));
        }

        self.writes
            .lock()
            .await
            .push((tenant_id, cutoff_date, events.to_vec()));

        Ok(format!("memory://{tenant_id}/{cutoff_date}"))
    }
}

fn event_aged(tenant_id: TenantId, action: &str, age_days: i64) -> AuditEvent {
    let input = AuditEventInput {
        tenant_id: Some(tenant_id),
        category: Some(AuditCategory::DataAccess),
        event_type: Some(AuditEventType::Read),
        action: action.to_owned(),
        severity: Some(AuditSeverity::Info),
        status: Some(AuditStatus::Success),
        created_at: Some(Utc::now() - Duration::days(age_days)),
        ..AuditEventInput::default()
    };

    match AuditEvent::new(input) {
        Ok(event) => event,
        Err(error) => panic!("failed to build test event: {error}"),
    }
}

fn policy(
    tenant_id: TenantId,
    warm_days: u32,
    cold_days: u32,
    archive_enabled: bool,
    purge_enabled: bool,
) -> RetentionPolicy {
    RetentionPolicy {
        tenant_id,
        hot_retention_days: 7,
        warm_retention_days: warm_days,
        cold_retention_days: cold_days,
        archive_enabled,
        archive_bucket: None,
        archive_path: None,
        purge_enabled,
        last_archived_at: None,
        last_purged_at: None,
    }
}

fn service(
    store: Arc<FakeRetentionStore>,
    archive: Arc<RecordingArchiveWriter>,
) -> RetentionService {
    match RetentionService::new(store, archive, RetentionConfig::default()) {
        Ok(service) => service,
        Err(error) => panic!("valid retention config was rejected: {error}"),
    }
}

#[tokio::test]
async fn archives_events_past_warm_threshold() {
    let store = Arc::new(FakeRetentionStore::default());
    let archive = Arc::new(RecordingArchiveWriter::default());
    let tenant_id = TenantId::new();

    store.insert_event(event_aged(tenant_id, "aged", 31)).await;
    store.insert_event(event_aged(tenant_id, "fresh", 1)).await;
    store
        .insert_policy(policy(tenant_id, 30, 365, true, false))
        .await;

    let report = service(store.clone(), archive.clone())
        .run_cleanup_now()
        .await;
    let Ok(report) = report else {
        panic!("cleanup pass failed");
    };

    assert_eq!(report.tenants_processed, 1);
    assert_eq!(report.events_archived, 1);
    assert_eq!(report.events_deleted, 0);
    assert_eq!(report.tenant_failures, 0);

    let writes = archive.writes.lock().await;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, tenant_id);
    assert_eq!(writes[0].2.len(), 1);
    assert_eq!(writes[0].2[0].action.as_str(), "aged");
    drop(writes);

    let policies = store.policies.lock().await;
    let stamped = policies.get(&tenant_id).and_then(|p| p.last_archived_at);
    assert!(stamped.is_some());
}

#[tokio::test]
async fn purges_events_past_cold_threshold() {
    let store = Arc::new(FakeRetentionStore::default());
    let archive = Arc::new(RecordingArchiveWriter::default());
    let tenant_id = TenantId::new();

    store.insert_event(event_aged(tenant_id, "expired", 91)).await;
    store.insert_event(event_aged(tenant_id, "warm", 10)).await;
    store
        .insert_policy(policy(tenant_id, 30, 90, false, true))
        .await;

    let before = Utc::now();
    let report = service(store.clone(), archive.clone())
        .run_cleanup_now()
        .await;
    let Ok(report) = report else {
        panic!("cleanup pass failed");
    };

    assert_eq!(report.events_deleted, 1);
    assert_eq!(report.events_archived, 0);
    assert_eq!(store.events.lock().await.len(), 1);

    let delete_calls = store.delete_calls.lock().await;
    assert_eq!(delete_calls.len(), 1);
    let expected_cutoff = before - Duration::days(90);
    let drift = delete_calls[0].1 - expected_cutoff;
    assert!(drift >= Duration::zero() && drift < Duration::seconds(60));
    drop(delete_calls);

    let policies = store.policies.lock().await;
    let stamped = policies.get(&tenant_id).and_then(|p| p.last_purged_at);
    assert!(stamped.is_some());
}

#[tokio::test]
async fn recent_events_are_left_alone() {
    let store = Arc::new(FakeRetentionStore::default());
    let archive = Arc::new(RecordingArchiveWriter::default());
    let tenant_id = TenantId::new();

    store.insert_event(event_aged(tenant_id, "fresh", 5)).await;
    store
        .insert_policy(policy(tenant_id, 30, 90, true, true))
        .await;

    let report = service(store.clone(), archive.clone())
        .run_cleanup_now()
        .await;
    let Ok(report) = report else {
        panic!("cleanup pass failed");
    };

    assert_eq!(report.events_archived, 0);
    assert_eq!(report.events_deleted, 0);
    assert!(archive.writes.lock().await.is_empty());
    assert_eq!(store.events.lock().await.len(), 1);

    let policies = store.policies.lock().await;
    let Some(stored) = policies.get(&tenant_id) else {
        panic!("policy disappeared during cleanup");
    };
    assert!(stored.last_archived_at.is_none());
    assert!(stored.last_purged_at.is_none());
}

#[tokio::test]
async fn tenant_without_policy_is_skipped() {
    let store = Arc::new(FakeRetentionStore::default());
    let archive = Arc::new(RecordingArchiveWriter::default());
    let tenant_id = TenantId::new();

    store.insert_event(event_aged(tenant_id, "orphan", 400)).await;

    let report = service(store.clone(), archive.clone())
        .run_cleanup_now()
        .await;
    let Ok(report) = report else {
        panic!("cleanup pass failed");
    };

    assert_eq!(report.tenants_processed, 1);
    assert_eq!(report.events_archived, 0);
    assert_eq!(report.events_deleted, 0);
    assert_eq!(store.events.lock().await.len(), 1);
}

#[tokio::test]
async fn tenant_failure_does_not_abort_pass() {
    let failing_tenant = TenantId::new();
    let healthy_tenant = TenantId::new();
    let store = Arc::new(FakeRetentionStore {
        failing_policy_tenants: vec![failing_tenant],
        ..FakeRetentionStore::default()
    });
    let archive = Arc::new(RecordingArchiveWriter::default());

    store
        .insert_event(event_aged(failing_tenant, "unreachable", 100))
        .await;
    store
        .insert_event(event_aged(healthy_tenant, "aged", 100))
        .await;
    store
        .insert_policy(policy(healthy_tenant, 30, 365, true, false))
        .await;

    let report = service(store.clone(), archive.clone())
        .run_cleanup_now()
        .await;
    let Ok(report) = report else {
        panic!("cleanup pass failed");
    };

    assert_eq!(report.tenant_failures, 1);
    assert_eq!(report.events_archived, 1);
}

#[tokio::test]
async fn archive_failure_does_not_block_purge() {
    let store = Arc::new(FakeRetentionStore::default());
    let archive = Arc::new(RecordingArchiveWriter::failing());
    let tenant_id = TenantId::new();

    store.insert_event(event_aged(tenant_id, "cold", 100)).await;
    store
        .insert_policy(policy(tenant_id, 30, 90, true, true))
        .await;

    let report = service(store.clone(), archive.clone())
        .run_cleanup_now()
        .await;
    let Ok(report) = report else {
        panic!("cleanup pass failed");
    };

    assert_eq!(report.events_archived, 0);
    assert_eq!(report.events_deleted, 1);
    assert_eq!(report.tenant_failures, 1);
    assert!(store.events.lock().await.is_empty());
}

#[tokio::test]
async fn scheduler_start_is_exclusive_and_stop_is_idempotent() {
    let store = Arc::new(FakeRetentionStore::default());
    let archive = Arc::new(RecordingArchiveWriter::default());
    let service = service(store, archive);
    let shutdown = CancellationToken::new();

    assert!(service.start(shutdown.clone()).await.is_ok());
    let second = service.start(shutdown.clone()).await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    assert!(service.stop().await.is_ok());
    assert!(service.stop().await.is_ok());

    // Restart after stop is allowed.
    assert!(service.start(shutdown).await.is_ok());
    assert!(service.stop().await.is_ok());
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let store: Arc<dyn AuditStore> = Arc::new(FakeRetentionStore::default());
    let archive: Arc<dyn ArchiveWriter> = Arc::new(RecordingArchiveWriter::default());
    let result = RetentionService::new(
        store,
        archive,
        RetentionConfig {
            interval: StdDuration::ZERO,
            archive_batch_size: 100,
        },
    );
    assert!(matches!(result, Err(AppError::Validation(_))));
}
