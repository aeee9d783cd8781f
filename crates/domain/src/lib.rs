//! Domain entities and invariants for the audit-event pipeline.

#![forbid(unsafe_code)]

mod event;
mod integrity;
mod query;
mod retention;

pub use event::{
    AuditCategory, AuditEvent, AuditEventInput, AuditEventType, AuditSeverity, AuditStatus,
    UserContext,
};
pub use integrity::IntegrityRecord;
pub use query::{
    AuditStats, DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT, QueryFilter, SortDirection, SortField,
    TimeRange,
};
pub use retention::RetentionPolicy;
