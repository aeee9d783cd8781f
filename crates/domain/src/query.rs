use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use trailkeeper_core::{AppError, AppResult, TenantId};

use crate::event::{AuditCategory, AuditEventType, AuditSeverity, AuditStatus};

/// Page size applied when a query does not specify a limit.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Hard upper bound on the page size of a single query.
pub const MAX_QUERY_LIMIT: usize = 1_000;

/// Inclusive time window over event creation timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a validated time range; both bounds are required and the end
    /// must not precede the start.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Self> {
        if end < start {
            return Err(AppError::Validation(format!(
                "time range end '{end}' precedes start '{start}'"
            )));
        }

        Ok(Self { start, end })
    }

    /// Returns the range covering one UTC calendar day.
    #[must_use]
    pub fn day(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        let end = start + Duration::days(1) - Duration::nanoseconds(1);
        Self { start, end }
    }

    /// Returns the inclusive lower bound.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Returns the inclusive upper bound.
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns whether a timestamp falls inside the range.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

/// Event fields a query may sort on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Sort by creation timestamp.
    #[default]
    CreatedAt,
    /// Sort by category.
    Category,
    /// Sort by event type.
    EventType,
    /// Sort by severity.
    Severity,
    /// Sort by status.
    Status,
    /// Sort by action label.
    Action,
    /// Sort by resource type.
    ResourceType,
}

impl SortField {
    /// Returns a stable storage value for this sort field.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Category => "category",
            Self::EventType => "event_type",
            Self::Severity => "severity",
            Self::Status => "status",
            Self::Action => "action",
            Self::ResourceType => "resource_type",
        }
    }
}

impl FromStr for SortField {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created_at" => Ok(Self::CreatedAt),
            "category" => Ok(Self::Category),
            "event_type" => Ok(Self::EventType),
            "severity" => Ok(Self::Severity),
            "status" => Ok(Self::Status),
            "action" => Ok(Self::Action),
            "resource_type" => Ok(Self::ResourceType),
            _ => Err(AppError::Validation(format!(
                "unsupported sort field '{value}'"
            ))),
        }
    }
}

/// Direction applied to the sort field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Oldest or lowest values first.
    Ascending,
    /// Newest or highest values first.
    #[default]
    Descending,
}

impl SortDirection {
    /// Returns a stable storage value for this direction.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// Filter describing one tenant-scoped audit query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    /// Tenant scope; every query is partitioned by tenant.
    pub tenant_id: TenantId,
    /// Restrict to one acting user identifier.
    pub user_id: Option<String>,
    /// Restrict to one acting user email.
    pub user_email: Option<String>,
    /// Restrict to any of these categories; empty means all.
    pub categories: Vec<AuditCategory>,
    /// Restrict to any of these event types; empty means all.
    pub event_types: Vec<AuditEventType>,
    /// Restrict to any of these action labels; empty means all.
    pub actions: Vec<String>,
    /// Restrict to any of these severities; empty means all.
    pub severities: Vec<AuditSeverity>,
    /// Restrict to any of these statuses; empty means all.
    pub statuses: Vec<AuditStatus>,
    /// Restrict to one resource type.
    pub resource_type: Option<String>,
    /// Restrict to one resource identifier.
    pub resource_id: Option<String>,
    /// Restrict to one client network address.
    pub ip_address: Option<String>,
    /// Restrict to a creation-time window.
    pub time_range: Option<TimeRange>,
    /// Maximum rows returned; see [`QueryFilter::normalized`].
    pub limit: usize,
    /// Rows skipped before the first returned row.
    pub offset: usize,
    /// Field the results are ordered by.
    pub sort_field: SortField,
    /// Direction the results are ordered in.
    pub sort_direction: SortDirection,
}

impl QueryFilter {
    /// Creates a filter matching all events of one tenant.
    #[must_use]
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            user_id: None,
            user_email: None,
            categories: Vec::new(),
            event_types: Vec::new(),
            actions: Vec::new(),
            severities: Vec::new(),
            statuses: Vec::new(),
            resource_type: None,
            resource_id: None,
            ip_address: None,
            time_range: None,
            limit: DEFAULT_QUERY_LIMIT,
            offset: 0,
            sort_field: SortField::default(),
            sort_direction: SortDirection::default(),
        }
    }

    /// Applies the default and maximum page size bounds.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.limit == 0 {
            self.limit = DEFAULT_QUERY_LIMIT;
        }
        self.limit = self.limit.min(MAX_QUERY_LIMIT);
        self
    }
}

/// Aggregate counts over one tenant's events in a time range.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditStats {
    /// Total events in the range.
    pub total_events: u64,
    /// Event counts keyed by category storage value.
    pub events_by_category: HashMap<String, u64>,
    /// Event counts keyed by severity storage value.
    pub events_by_severity: HashMap<String, u64>,
    /// Event counts keyed by status storage value.
    pub events_by_status: HashMap<String, u64>,
    /// Events whose status is failure.
    pub failed_events: u64,
}
