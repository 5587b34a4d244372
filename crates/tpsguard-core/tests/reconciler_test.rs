#![allow(clippy::unwrap_used)]
// Reconciler behavior against a mocked appliance.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{RecordingSink, ZONES, appliance, client_for, write_template, zone_page, zone_row};
use tpsguard_core::{
    CoreError, EventType, FileTemplateStore, Level, MitigationOutcome, NotifyFlags, Reconciler,
    RemovalStatus,
};

const IP: &str = "203.0.113.5";

fn reconciler(server_uri: &str, templates: &std::path::Path, sink: &Arc<RecordingSink>) -> Reconciler {
    Reconciler::new(
        client_for(server_uri),
        Arc::new(FileTemplateStore::new(templates)),
        sink.clone(),
        NotifyFlags::default(),
    )
}

async fn mount_listing(server: &MockServer, rows: &[serde_json::Value], times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(ZONES))
        .and(query_param("items", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_page(rows)));
    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

// ── ensure_mitigation ───────────────────────────────────────────────

#[tokio::test]
async fn second_call_takes_the_existing_zone_branch() {
    let server = appliance().await;
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "default");

    // Empty before the create, populated after.
    mount_listing(&server, &[], Some(1)).await;
    mount_listing(&server, &[zone_row("z-1", IP, "monitor")], None).await;

    Mock::given(method("POST"))
        .and(path(format!("{ZONES}create/")))
        .and(body_partial_json(json!({
            "zone_name": IP,
            "ip_list": [IP],
            "input_ips": [IP],
            "profile_name": "web-default"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "z-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{ZONES}z-1/monitor/")))
        .and(body_json(json!({"protection_values": [{"level": 1}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{ZONES}z-1/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "z-1",
            "zone_name": IP,
            "operational_mode": "monitor",
            "profile_name": "web-default",
            "zone_service_list": [{}, {}]
        })))
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let reconciler = reconciler(&server.uri(), dir.path(), &sink);

    let first = reconciler.ensure_mitigation(IP, Some("default")).await;
    assert_eq!(
        first,
        MitigationOutcome::Success {
            zone_id: "z-1".into(),
            message: format!(
                "Started mitigation for {IP}. Created from template 'default' and deployed to TPS."
            ),
        }
    );

    let second = reconciler.ensure_mitigation(IP, Some("default")).await;
    assert!(second.is_success());
    assert!(second.message().contains("already exists (mode: monitor)"));

    let sent = sink.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].title, "Mitigation Started");
    assert_eq!(sent[0].level, Level::Warning);
    assert_eq!(sent[0].fields["Services"], "2");
    assert_eq!(sent[1].title, "Mitigation Re-deployed");
    assert_eq!(sent[1].level, Level::Info);
    assert_eq!(sent[1].fields["Mode"], "monitor");
    assert!(sent.iter().all(|n| n.event_type == EventType::MitigationStart));
}

#[tokio::test]
async fn single_template_is_selected_automatically() {
    let server = appliance().await;
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "default");

    mount_listing(&server, &[], None).await;
    Mock::given(method("POST"))
        .and(path(format!("{ZONES}create/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "z-9"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{ZONES}z-9/monitor/")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let outcome = reconciler(&server.uri(), dir.path(), &sink)
        .ensure_mitigation(IP, None)
        .await;

    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(sink.sent()[0].fields["Template"], "default");
}

#[tokio::test]
async fn several_templates_require_a_name() {
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "web");
    write_template(dir.path(), "dns");

    let sink = Arc::new(RecordingSink::default());
    let outcome = reconciler("http://127.0.0.1:9", dir.path(), &sink)
        .ensure_mitigation(IP, None)
        .await;

    let MitigationOutcome::Failure { message } = outcome else {
        panic!("expected failure, got {outcome:?}");
    };
    assert!(message.contains("Please specify one: dns, web"), "{message}");
    assert!(sink.sent().is_empty());
}

#[tokio::test]
async fn no_templates_is_an_error_result() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let outcome = reconciler("http://127.0.0.1:9", dir.path(), &sink)
        .ensure_mitigation(IP, None)
        .await;

    assert!(!outcome.is_success());
    assert!(outcome.message().contains("No templates configured"));
}

#[tokio::test]
async fn create_response_without_id_fails() {
    let server = appliance().await;
    let dir = tempfile::tempdir().unwrap();
    write_template(dir.path(), "default");

    mount_listing(&server, &[], None).await;
    Mock::given(method("POST"))
        .and(path(format!("{ZONES}create/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "queued"})))
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let outcome = reconciler(&server.uri(), dir.path(), &sink)
        .ensure_mitigation(IP, Some("default"))
        .await;

    assert!(!outcome.is_success());
    assert!(outcome.message().starts_with(&format!("Error ensuring mitigation for {IP}:")));
    assert!(sink.sent().is_empty());
}

// ── remove_zone ─────────────────────────────────────────────────────

#[tokio::test]
async fn removing_an_unknown_ip_is_not_found() {
    let server = appliance().await;
    let dir = tempfile::tempdir().unwrap();
    mount_listing(&server, &[zone_row("z-1", "198.51.100.1", "monitor")], None).await;

    let sink = Arc::new(RecordingSink::default());
    let err = reconciler(&server.uri(), dir.path(), &sink)
        .remove_zone("9.9.9.9")
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::ZoneNotFound { ref ip } if ip == "9.9.9.9"));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn removing_a_zone_deletes_by_id_and_name() {
    let server = appliance().await;
    let dir = tempfile::tempdir().unwrap();
    mount_listing(&server, &[zone_row("z-1", IP, "protection")], None).await;
    Mock::given(method("DELETE"))
        .and(path(ZONES))
        .and(query_param("force_delete", "false"))
        .and(body_json(json!({
            "object_ids": [{"detector_id": null, "id": "z-1", "zone_name": IP}]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let removal = reconciler(&server.uri(), dir.path(), &sink)
        .remove_zone(IP)
        .await
        .unwrap();

    assert_eq!(removal.status, RemovalStatus::Deleted);
    assert_eq!(removal.zone_id, "z-1");
    let sent = sink.sent();
    assert_eq!(sent[0].event_type, EventType::MitigationStop);
    assert_eq!(sent[0].level, Level::Error);
    assert_eq!(sent[0].fields["Mode"], "protection");
}

// ── Listing and status ──────────────────────────────────────────────

#[tokio::test]
async fn zone_status_counts_device_services() {
    let server = appliance().await;
    let dir = tempfile::tempdir().unwrap();
    mount_listing(&server, &[zone_row("z-1", IP, "protection")], None).await;
    Mock::given(method("GET"))
        .and(path(format!("{ZONES}z-1/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "operational_mode": "protection",
            "ip_list": [IP, "203.0.113.6"],
            "uuid_dict": {"dev": {"service": {"a": {}, "b": {}, "c": {}}}}
        })))
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let status = reconciler(&server.uri(), dir.path(), &sink)
        .zone_status(IP)
        .await
        .unwrap();

    assert_eq!(status.zone_id, "z-1");
    assert_eq!(status.operational_mode, "protection");
    assert_eq!(status.services_count, 3);
    assert_eq!(status.ip_list, [IP, "203.0.113.6"]);
}

#[tokio::test]
async fn list_zones_reports_requested_page() {
    let server = appliance().await;
    let dir = tempfile::tempdir().unwrap();
    Mock::given(method("GET"))
        .and(path(ZONES))
        .and(query_param("page", "2"))
        .and(query_param("items", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 7,
            "object_list": [zone_row("z-6", "10.0.0.6", "monitor"), zone_row("z-7", "10.0.0.7", "idle")]
        })))
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let listing = reconciler(&server.uri(), dir.path(), &sink)
        .list_zones(2, 5)
        .await
        .unwrap();

    assert_eq!(listing.total, 7);
    assert_eq!(listing.page, 2);
    let names: Vec<_> = listing.zones.iter().map(|z| z.zone_name.as_str()).collect();
    assert_eq!(names, ["10.0.0.6", "10.0.0.7"]);
}
