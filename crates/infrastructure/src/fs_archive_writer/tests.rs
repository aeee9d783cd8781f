use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, TimeZone, Utc};
use flate2::read::GzDecoder;

use trailkeeper_application::ArchiveWriter;
use trailkeeper_core::TenantId;
use trailkeeper_domain::{
    AuditCategory, AuditEvent, AuditEventInput, AuditEventType, AuditSeverity, AuditStatus,
};

use super::FsArchiveWriter;

fn cutoff_date() -> NaiveDate {
    let Some(date) = NaiveDate::from_ymd_opt(2026, 8, 20) else {
        panic!("valid calendar date was rejected");
    };
    date
}

fn event(tenant_id: TenantId, action: &str) -> AuditEvent {
    let input = AuditEventInput {
        tenant_id: Some(tenant_id),
        category: Some(AuditCategory::Workflow),
        event_type: Some(AuditEventType::Execute),
        action: action.to_owned(),
        severity: Some(AuditSeverity::Info),
        status: Some(AuditStatus::Success),
        created_at: Utc.with_ymd_and_hms(2026, 8, 20, 9, 30, 0).single(),
        ..AuditEventInput::default()
    };
    let Ok(event) = AuditEvent::new(input) else {
        panic!("valid input was rejected");
    };
    event
}

fn parse_lines(body: &str) -> Vec<AuditEvent> {
    body.lines()
        .map(|line| {
            let Ok(event) = serde_json::from_str(line) else {
                panic!("archive line is not a valid audit event: {line}");
            };
            event
        })
        .collect()
}

#[tokio::test]
async fn writes_one_canonical_json_line_per_event() {
    let Ok(dir) = tempfile::tempdir() else {
        panic!("failed to create temp dir");
    };
    let writer = FsArchiveWriter::new(dir.path(), false);
    let tenant_id = TenantId::new();
    let events = vec![event(tenant_id, "workflow.run"), event(tenant_id, "workflow.pause")];

    let Ok(path) = writer.write_archive(tenant_id, cutoff_date(), &events).await else {
        panic!("archive write failed");
    };

    let Ok(body) = std::fs::read_to_string(&path) else {
        panic!("archive file is missing");
    };
    assert_eq!(parse_lines(&body), events);
}

#[tokio::test]
async fn compressed_archive_roundtrips_through_gzip() {
    let Ok(dir) = tempfile::tempdir() else {
        panic!("failed to create temp dir");
    };
    let writer = FsArchiveWriter::new(dir.path(), true);
    let tenant_id = TenantId::new();
    let events = vec![event(tenant_id, "workflow.run")];

    let Ok(path) = writer.write_archive(tenant_id, cutoff_date(), &events).await else {
        panic!("archive write failed");
    };
    assert!(path.ends_with(".jsonl.gz"));

    let Ok(compressed) = std::fs::read(&path) else {
        panic!("archive file is missing");
    };
    let mut body = String::new();
    let Ok(_) = GzDecoder::new(compressed.as_slice()).read_to_string(&mut body) else {
        panic!("archive is not valid gzip");
    };
    assert_eq!(parse_lines(&body), events);
}

#[tokio::test]
async fn archive_path_partitions_by_tenant_and_month() {
    let Ok(dir) = tempfile::tempdir() else {
        panic!("failed to create temp dir");
    };
    let writer = FsArchiveWriter::new(dir.path(), false);
    let tenant_id = TenantId::new();

    let Ok(path) = writer
        .write_archive(tenant_id, cutoff_date(), &[event(tenant_id, "workflow.run")])
        .await
    else {
        panic!("archive write failed");
    };

    let expected = dir
        .path()
        .join(tenant_id.to_string())
        .join("2026")
        .join("08")
        .join(format!("audit-{tenant_id}-2026-08-20.jsonl"));
    assert_eq!(Path::new(&path), expected);
}

#[tokio::test]
async fn empty_event_slice_produces_an_empty_file() {
    let Ok(dir) = tempfile::tempdir() else {
        panic!("failed to create temp dir");
    };
    let writer = FsArchiveWriter::new(dir.path(), false);
    let tenant_id = TenantId::new();

    let Ok(path) = writer.write_archive(tenant_id, cutoff_date(), &[]).await else {
        panic!("archive write failed");
    };
    let Ok(body) = std::fs::read(&path) else {
        panic!("archive file is missing");
    };
    assert!(body.is_empty());
}
