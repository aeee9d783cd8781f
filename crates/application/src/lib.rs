//! Audit pipeline services and ports.

#![forbid(unsafe_code)]

mod audit_ports;
mod ingestion_service;
mod integrity_service;
mod retention_service;

pub use audit_ports::{ArchiveWriter, AuditStore, EventPage};
pub use ingestion_service::{IngestionConfig, IngestionService};
pub use integrity_service::IntegrityService;
pub use retention_service::{CleanupReport, RetentionConfig, RetentionService};
