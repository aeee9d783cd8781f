//! Adapters for the audit pipeline ports.

#![forbid(unsafe_code)]

mod fs_archive_writer;
mod in_memory_audit_store;

pub use fs_archive_writer::FsArchiveWriter;
pub use in_memory_audit_store::InMemoryAuditStore;
