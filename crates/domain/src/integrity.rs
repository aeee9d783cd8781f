use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use trailkeeper_core::TenantId;

/// Tamper-evidence digest over one tenant's events for one UTC calendar day.
///
/// A derived, recomputable value: the pipeline never persists it, callers
/// decide whether and where to retain it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityRecord {
    /// Tenant the digest covers.
    pub tenant_id: TenantId,
    /// UTC calendar day the digest covers.
    pub date: NaiveDate,
    /// Number of events included in the digest.
    pub event_count: u64,
    /// Lowercase hex SHA-256 over the ordered canonical event bytes.
    pub hash: String,
    /// Time the digest was computed.
    pub computed_at: DateTime<Utc>,
}
