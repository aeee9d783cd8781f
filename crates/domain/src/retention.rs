use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use trailkeeper_core::{AppError, AppResult, TenantId};

/// Per-tenant configuration for aging audit events through storage tiers.
///
/// Hot events are fully queryable, warm events are archived but still
/// counted, cold events are eligible for permanent deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Tenant the policy applies to.
    pub tenant_id: TenantId,
    /// Days an event stays fully queryable.
    pub hot_retention_days: u32,
    /// Days until an event is archived.
    pub warm_retention_days: u32,
    /// Days until an event may be purged.
    pub cold_retention_days: u32,
    /// Whether aged events are written to archive storage.
    pub archive_enabled: bool,
    /// Archive destination bucket.
    pub archive_bucket: Option<String>,
    /// Archive destination path prefix.
    pub archive_path: Option<String>,
    /// Whether cold events are permanently deleted.
    pub purge_enabled: bool,
    /// Completion time of the last successful archive step.
    pub last_archived_at: Option<DateTime<Utc>>,
    /// Completion time of the last successful purge step.
    pub last_purged_at: Option<DateTime<Utc>>,
}

impl RetentionPolicy {
    /// Validates the tier ordering invariant.
    ///
    /// Purging against a policy where the windows are not monotonically
    /// non-decreasing would delete events still expected in the hot tier,
    /// so violations are rejected before the policy can be persisted.
    pub fn validate(&self) -> AppResult<()> {
        if self.hot_retention_days == 0 {
            return Err(AppError::Validation(
                "hot_retention_days must be greater than zero".to_owned(),
            ));
        }

        if self.warm_retention_days < self.hot_retention_days {
            return Err(AppError::Validation(format!(
                "warm_retention_days ({}) must not be less than hot_retention_days ({})",
                self.warm_retention_days, self.hot_retention_days
            )));
        }

        if self.cold_retention_days < self.warm_retention_days {
            return Err(AppError::Validation(format!(
                "cold_retention_days ({}) must not be less than warm_retention_days ({})",
                self.cold_retention_days, self.warm_retention_days
            )));
        }

        Ok(())
    }

    /// Returns the cutoff before which events are due for archival.
    #[must_use]
    pub fn warm_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.warm_retention_days))
    }

    /// Returns the cutoff before which events are due for deletion.
    #[must_use]
    pub fn cold_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.cold_retention_days))
    }
}
