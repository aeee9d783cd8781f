use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sha2::{Digest, Sha256};

use trailkeeper_core::{AppResult, TenantId};
use trailkeeper_domain::{
    AuditEvent, IntegrityRecord, MAX_QUERY_LIMIT, QueryFilter, SortDirection, SortField, TimeRange,
};

use crate::audit_ports::AuditStore;


/// Computes reproducible tamper-evidence digests over per-day event sets.
///
/// The digest is recomputed on demand rather than maintained as a running
/// chain: that keeps hashing off the ingestion hot path, at the cost that
/// verification requires the day's events to still be queryable. Verify
/// before a day crosses into the purged tier.
pub struct IntegrityService {
    store: Arc<dyn AuditStore>,
}

impl IntegrityService {
    /// Creates an integrity service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Computes the SHA-256 digest over one tenant's events for one UTC
    /// calendar day, ordered by creation time then id.
    ///
    /// An empty day is not an error; it hashes to the fixed digest of zero
    /// bytes.
    pub async fn daily_hash(
        &self,
        tenant_id: TenantId,
        date: NaiveDate,
    ) -> AppResult<IntegrityRecord> {
        let events = self.day_events(tenant_id, date).await?;

        let mut hasher = Sha256::new();
        for event in &events {
            hasher.update(event.canonical_bytes()?);
            hasher.update(b"\n");
        }

        Ok(IntegrityRecord {
            tenant_id,
            date,
            event_count: events.len() as u64,
            hash: hex::encode(hasher.finalize()),
            computed_at: Utc::now(),
        })
    }

    /// Recomputes the daily digest and compares it with an expected value.
    ///
    /// A mismatch is a result, not an error: it may reflect a lawful purge
    /// as well as tampering, and the caller decides which.
    pub async fn verify(
        &self,
        tenant_id: TenantId,
        date: NaiveDate,
        expected_hash: &str,
    ) -> AppResult<bool> {
        let record = self.daily_hash(tenant_id, date).await?;
        Ok(record.hash == expected_hash)
    }

    /// Collects the full day's events and applies the deterministic sort
    /// key, independent of whatever order the store iterates in.
    async fn day_events(&self, tenant_id: TenantId, date: NaiveDate) -> AppResult<Vec<AuditEvent>> {
        let range = TimeRange::day(date);
        let mut events = Vec::new();
        let mut offset = 0;

        loop {
            let mut filter = QueryFilter::new(tenant_id);
            filter.time_range = Some(range);
            filter.limit = MAX_QUERY_LIMIT;
            filter.offset = offset;
            filter.sort_field = SortField::CreatedAt;
            filter.sort_direction = SortDirection::Ascending;

            let page = self.store.query_events(filter).await?;
            let fetched = page.events.len();
            events.extend(page.events);
            offset += fetched;

            if fetched == 0 || events.len() as u64 >= page.total_count {
                break;
            }
        }

        events.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });

        Ok(events)
    }
}
