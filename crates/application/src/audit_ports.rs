//! Ports consumed by the audit pipeline services.

mod archive;
mod store;

pub use archive::ArchiveWriter;
pub use store::{AuditStore, EventPage};
