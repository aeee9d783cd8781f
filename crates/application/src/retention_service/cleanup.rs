use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use trailkeeper_core::{AppResult, TenantId};
use trailkeeper_domain::{QueryFilter, RetentionPolicy, SortDirection, SortField, TimeRange};

use crate::audit_ports::{ArchiveWriter, AuditStore};

use super::{CleanupReport, RetentionConfig};

#[derive(Default)]
struct TenantOutcome {
    archived: u64,
    deleted: u64,
    failed_steps: u32,
}

/// Executes one full cleanup pass over every tenant with audit data.
///
/// Per-tenant failures are logged and never abort the pass for the
/// remaining tenants.
pub(super) async fn run_pass(
    store: &dyn AuditStore,
    archive: &dyn ArchiveWriter,
    config: &RetentionConfig,
) -> AppResult<CleanupReport> {
    let started = Instant::now();
    let now = Utc::now();
    let tenants = store.list_tenants_with_events().await?;

    let mut report = CleanupReport::default();
    for tenant_id in tenants {
        match cleanup_tenant(store, archive, config, tenant_id, now).await {
            Ok(outcome) => {
                report.tenants_processed += 1;
                report.events_archived += outcome.archived;
                report.events_deleted += outcome.deleted;
                if outcome.failed_steps > 0 {
                    report.tenant_failures += 1;
                }
            }
            Err(error) => {
                report.tenant_failures += 1;
                warn!(
                    tenant_id = %tenant_id,
                    error = %error,
                    "retention cleanup failed for tenant"
                );
            }
        }
    }

    info!(
        tenants = report.tenants_processed,
        archived = report.events_archived,
        deleted = report.events_deleted,
        failures = report.tenant_failures,
        duration_ms = started.elapsed().as_millis() as u64,
        "retention cleanup pass completed"
    );

    Ok(report)
}

/// Ages one tenant's events. Archive and purge are independent sub-steps:
/// a failed archive is logged and the purge check still runs.
async fn cleanup_tenant(
    store: &dyn AuditStore,
    archive: &dyn ArchiveWriter,
    config: &RetentionConfig,
    tenant_id: TenantId,
    now: DateTime<Utc>,
) -> AppResult<TenantOutcome> {
    let Some(mut policy) = store.find_retention_policy(tenant_id).await? else {
        debug!(tenant_id = %tenant_id, "no retention policy configured; skipping tenant");
        return Ok(TenantOutcome::default());
    };

    let mut outcome = TenantOutcome::default();

    if policy.archive_enabled {
        match archive_aged_events(store, archive, config, &mut policy, now).await {
            Ok(count) => outcome.archived = count,
            Err(error) => {
                outcome.failed_steps += 1;
                warn!(
                    tenant_id = %tenant_id,
                    error = %error,
                    "archive step failed for tenant"
                );
            }
        }
    }

    if policy.purge_enabled {
        match purge_expired_events(store, &mut policy, now).await {
            Ok(count) => outcome.deleted = count,
            Err(error) => {
                outcome.failed_steps += 1;
                warn!(
                    tenant_id = %tenant_id,
                    error = %error,
                    "purge step failed for tenant"
                );
            }
        }
    }

    Ok(outcome)
}

/// Writes events past the warm threshold to archive storage, bounded by the
/// per-pass batch size, and stamps the policy on success.
async fn archive_aged_events(
    store: &dyn AuditStore,
    archive: &dyn ArchiveWriter,
    config: &RetentionConfig,
    policy: &mut RetentionPolicy,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    let cutoff = policy.warm_cutoff(now);

    let mut filter = QueryFilter::new(policy.tenant_id);
    filter.time_range = Some(TimeRange::new(DateTime::<Utc>::UNIX_EPOCH, cutoff)?);
    filter.limit = config.archive_batch_size;
    filter.sort_field = SortField::CreatedAt;
    filter.sort_direction = SortDirection::Ascending;

    let page = store.query_events(filter).await?;
    if page.events.is_empty() {
        return Ok(0);
    }

    let count = page.events.len() as u64;
    let location = archive
        .write_archive(policy.tenant_id, cutoff.date_naive(), &page.events)
        .await?;
    info!(
        tenant_id = %policy.tenant_id,
        events = count,
        location = %location,
        "archived aged audit events"
    );

    policy.last_archived_at = Some(now);
    store.save_retention_policy(policy.clone()).await?;

    Ok(count)
}

/// Permanently deletes events past the cold threshold and stamps the policy
/// when anything was removed.
async fn purge_expired_events(
    store: &dyn AuditStore,
    policy: &mut RetentionPolicy,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    let cutoff = policy.cold_cutoff(now);
    let deleted = store
        .delete_events_before(policy.tenant_id, cutoff)
        .await?;

    if deleted > 0 {
        info!(
            tenant_id = %policy.tenant_id,
            deleted,
            "purged expired audit events"
        );
        policy.last_purged_at = Some(now);
        store.save_retention_policy(policy.clone()).await?;
    }

    Ok(deleted)
}
