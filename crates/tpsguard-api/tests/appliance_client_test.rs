#![allow(clippy::unwrap_used)]
// Integration tests for `ApplianceClient` and the session layer using wiremock.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{
    body_json, body_string_contains, header, header_regex, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tpsguard_api::{
    ApplianceClient, Credentials, Error, RetryConfig, SessionCache, TlsMode, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

const LOGIN: &str = "/auth/login/";
const HOME: &str = "/tps/home/";

fn login_page(token: &str) -> String {
    format!(
        r#"<form method="post">
<input type="hidden" name="csrfmiddlewaretoken" value="{token}">
<input type="text" name="username" id="id_username">
<input type="hidden" name="region" value="http://10.1.1.1:5000/v3">
</form>"#
    )
}

fn transport() -> TransportConfig {
    TransportConfig {
        tls: TlsMode::System,
        timeout: Duration::from_secs(5),
        retry: RetryConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            ..RetryConfig::default()
        },
    }
}

fn client_for(server: &MockServer, cache: SessionCache) -> ApplianceClient {
    let base_url = Url::parse(&server.uri()).unwrap();
    let credentials = Credentials::new("guardian", SecretString::from("s3cret".to_owned()));
    ApplianceClient::new(base_url, credentials, transport(), cache)
}

/// Login page that sets `csrftoken=<csrf>` and a form post that succeeds
/// by redirecting to the home page.
async fn mount_login(server: &MockServer, csrf: &str, session: &str, times: Option<u64>) {
    let page = Mock::given(method("GET")).and(path(LOGIN)).respond_with(
        ResponseTemplate::new(200)
            .insert_header("Set-Cookie", format!("csrftoken={csrf}; Path=/").as_str())
            .set_body_string(login_page("form-token")),
    );
    let submit = Mock::given(method("POST")).and(path(LOGIN)).respond_with(
        ResponseTemplate::new(302)
            .insert_header("Set-Cookie", format!("sessionid={session}; Path=/").as_str())
            .insert_header("Location", HOME),
    );
    match times {
        Some(n) => {
            page.up_to_n_times(n).mount(server).await;
            submit.up_to_n_times(n).mount(server).await;
        }
        None => {
            page.mount(server).await;
            submit.mount(server).await;
        }
    }
}

async fn mount_home(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(HOME))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Zones</h1>"))
        .mount(server)
        .await;
}

async fn setup() -> (MockServer, ApplianceClient) {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", "s1", None).await;
    mount_home(&server).await;
    let client = client_for(&server, SessionCache::disabled());
    (server, client)
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn login_submits_form_token_and_region() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page("form-token")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .and(body_string_contains("csrfmiddlewaretoken=form-token"))
        .and(body_string_contains("username=guardian"))
        .and(body_string_contains("region=http%3A%2F%2F10.1.1.1%3A5000%2Fv3"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", HOME))
        .expect(1)
        .mount(&server)
        .await;
    mount_home(&server).await;

    let client = client_for(&server, SessionCache::disabled());
    client.connect().await.unwrap();
}

#[tokio::test]
async fn login_rejected_when_form_is_rendered_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page("form-token")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page("form-token")))
        .mount(&server)
        .await;

    let client = client_for(&server, SessionCache::disabled());
    let result = client.connect().await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn login_fails_without_anti_forgery_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_string("<form></form>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", HOME))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, SessionCache::disabled());
    let err = client.connect().await.unwrap_err();

    assert!(err.is_auth_failure());
    assert!(err.to_string().contains("anti-forgery token"));
}

#[tokio::test]
async fn unreachable_appliance_is_an_authentication_failure() {
    let base_url = Url::parse("http://127.0.0.1:9").unwrap();
    let credentials = Credentials::new("guardian", SecretString::from("s3cret".to_owned()));
    let mut transport = transport();
    transport.timeout = Duration::from_millis(500);
    let client = ApplianceClient::new(base_url, credentials, transport, SessionCache::disabled());

    let result = client.connect().await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
}

// ── Session cache ───────────────────────────────────────────────────

#[tokio::test]
async fn valid_cached_session_skips_login() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("session.json");
    std::fs::write(&cache_path, r#"{"sessionid":"cached"}"#).unwrap();

    Mock::given(method("GET"))
        .and(path("/dashboard/"))
        .and(header("cookie", "sessionid=cached"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Dashboard</h1>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page("x")))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboard/info/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hostname": "tps-01"})))
        .mount(&server)
        .await;

    let client = client_for(&server, SessionCache::file(&cache_path));
    let info = client.system_info().await.unwrap();

    assert_eq!(info.hostname.as_deref(), Some("tps-01"));
}

#[tokio::test]
async fn stale_cached_session_triggers_login_and_rewrites_cache() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("session.json");
    std::fs::write(&cache_path, r#"{"sessionid":"stale"}"#).unwrap();

    Mock::given(method("GET"))
        .and(path("/dashboard/"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/auth/login/?next=/dashboard/"),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_login(&server, "tok-1", "fresh", None).await;
    mount_home(&server).await;

    let client = client_for(&server, SessionCache::file(&cache_path));
    client.connect().await.unwrap();

    let cached: Value = serde_json::from_str(&std::fs::read_to_string(&cache_path).unwrap()).unwrap();
    assert_eq!(cached["sessionid"], "fresh");
    assert_eq!(cached["csrftoken"], "tok-1");
}

// ── Session expiry recovery ─────────────────────────────────────────

#[tokio::test]
async fn expired_session_is_recovered_with_fresh_token() {
    let server = MockServer::start().await;
    mount_login(&server, "tok-1", "s1", Some(1)).await;
    mount_login(&server, "tok-2", "s2", None).await;
    mount_home(&server).await;

    let monitor = "/tps/protected_objects/zones/api/z1/monitor/";
    Mock::given(method("POST"))
        .and(path(monitor))
        .and(header("X-CSRFToken", "tok-1"))
        .respond_with(ResponseTemplate::new(403).set_body_string("CSRF verification failed"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(monitor))
        .and(header("X-CSRFToken", "tok-2"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deployed": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, SessionCache::disabled());
    let result = client
        .enable_monitor("z1", &json!({"protection_values": []}))
        .await
        .unwrap();

    assert_eq!(result, json!({"deployed": true}));
}

#[tokio::test]
async fn second_forbidden_after_replay_is_a_request_failure() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/dashboard/info/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
        .expect(2)
        .mount(&server)
        .await;

    let result = client.system_info().await;
    assert!(
        matches!(result, Err(Error::Request { status: 403, ref body }) if body == "denied"),
        "expected 403 request failure, got: {result:?}"
    );
}

#[tokio::test]
async fn login_redirect_after_replay_is_session_expired() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/tps/zone/incident/ongoing/json/"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", LOGIN))
        .expect(2)
        .mount(&server)
        .await;

    let result = client.ongoing_incidents(1, 100).await;
    assert!(
        matches!(result, Err(Error::SessionExpired)),
        "expected SessionExpired, got: {result:?}"
    );
}

#[tokio::test]
async fn concurrent_expiry_shares_one_relogin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "csrftoken=tok-1; Path=/")
                .set_body_string(login_page("form-token")),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Set-Cookie", "sessionid=s1; Path=/")
                .insert_header("Location", HOME),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Set-Cookie", "sessionid=s2; Path=/")
                .insert_header("Location", HOME),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_home(&server).await;

    Mock::given(method("GET"))
        .and(path("/dashboard/info/"))
        .and(header_regex("cookie", "sessionid=s1"))
        .respond_with(ResponseTemplate::new(403).set_body_string("session expired"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboard/info/"))
        .and(header_regex("cookie", "sessionid=s2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hostname": "tps-01"})))
        .mount(&server)
        .await;

    let client = Arc::new(client_for(&server, SessionCache::disabled()));
    let (a, b) = tokio::join!(client.system_info(), client.system_info());

    assert_eq!(a.unwrap().hostname.as_deref(), Some("tps-01"));
    assert_eq!(b.unwrap().hostname.as_deref(), Some("tps-01"));
}

// ── Transport retry and bodies ──────────────────────────────────────

#[tokio::test]
async fn transient_errors_are_retried() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/dashboard/info/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboard/info/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uptime": "2 days"})))
        .expect(1)
        .mount(&server)
        .await;

    let info = client.system_info().await.unwrap();
    assert_eq!(info.uptime.as_deref(), Some("2 days"));
}

#[tokio::test]
async fn retries_exhaust_into_request_failure() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/dashboard/info/"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .expect(4)
        .mount(&server)
        .await;

    let err = client.system_info().await.unwrap_err();
    assert_eq!(err.status(), Some(502));
    assert!(err.is_transient());
}

#[tokio::test]
async fn zone_create_is_never_replayed_after_transient_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/tps/protected_objects/zones/api/create/"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tps/protected_objects/zones/api/create/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "z-new"})))
        .expect(0)
        .mount(&server)
        .await;

    let result = client.create_zone(&json!({"zone_name": "203.0.113.5"})).await;
    assert!(
        matches!(result, Err(Error::Request { status: 502, .. })),
        "expected 502 request failure, got: {result:?}"
    );
}

#[tokio::test]
async fn no_content_is_an_empty_object() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/tps/protected_objects/zones/api/"))
        .and(query_param("force_delete", "false"))
        .and(body_json(json!({
            "object_ids": [{"detector_id": null, "id": "z9", "zone_name": "9.9.9.9"}]
        })))
        .and(header("X-CSRFToken", "tok-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.delete_zone("z9", "9.9.9.9").await.unwrap();
    assert_eq!(result, json!({}));
}

#[tokio::test]
async fn not_found_keeps_status_and_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/tps/protected_objects/zones/api/missing/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such zone"))
        .mount(&server)
        .await;

    let err = client.get_zone("missing").await.unwrap_err();
    assert!(err.is_not_found());
}

// ── Endpoints ───────────────────────────────────────────────────────

#[tokio::test]
async fn zone_lookup_is_exact_match_over_large_page() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/tps/protected_objects/zones/api/"))
        .and(query_param("page", "1"))
        .and(query_param("items", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2,
            "object_list": [
                {"id": "z1", "zone_name": "203.0.113.50", "operational_mode": "monitor"},
                {"id": "z2", "zone_name": "203.0.113.5", "operational_mode": "protect"}
            ]
        })))
        .mount(&server)
        .await;

    let zone = client.find_zone_by_ip("203.0.113.5").await.unwrap().unwrap();
    assert_eq!(zone.id, "z2");
    assert_eq!(zone.operational_mode.as_deref(), Some("protect"));

    assert!(client.find_zone_by_ip("203.0.113.").await.unwrap().is_none());
}

#[tokio::test]
async fn ongoing_incidents_are_parsed() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/tps/zone/incident/ongoing/json/"))
        .and(query_param("tps_incident_active", "Ongoing"))
        .and(query_param("sort_ordering", "DESC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_items": 1,
            "incident_list": [{
                "incident_id": "a1b2c3d4-e5f6",
                "zone_name": "203.0.113.50",
                "severity": "High",
                "start_time": "2026-02-13T10:15:30Z"
            }]
        })))
        .mount(&server)
        .await;

    let page = client.ongoing_incidents(1, 100).await.unwrap();
    assert_eq!(page.total_items, 1);
    assert_eq!(page.incident_list[0].severity.as_deref(), Some("High"));
}

#[tokio::test]
async fn device_inventory_requests_every_device() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/inventory/device_list/json/"))
        .and(query_param("get_all", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2,
            "page": 1,
            "object_list": [
                {"id": "d1", "dns_name": "TPS-BOX1", "mgmt_ip_address": "10.128.1.191",
                 "model": "TH6435 TPS", "oper_status_label": "CONNECTED"},
                {"id": "d2", "dns_name": "TPS-BOX2", "oper_status_label": "DISCONNECTED"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let devices = client.devices().await.unwrap();
    assert_eq!(devices.total, 2);
    assert_eq!(devices.object_list[0].model.as_deref(), Some("TH6435 TPS"));
    assert_eq!(devices.object_list[1].mgmt_ip_address, None);
}

#[tokio::test]
async fn license_is_unwrapped_from_envelope() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/system/license/get_license/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "license": {
                "license_type": "Subscription",
                "max_devices": 2,
                "max_objects": "1000",
                "remaining": "2 out of 2",
                "expires_at": "2027-01-31"
            }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/system/license/get_license/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let license = client.license().await.unwrap();
    assert_eq!(license.license_type.as_deref(), Some("Subscription"));
    assert_eq!(license.max_devices, Some(2));
    assert_eq!(license.max_objects, Some(1000));

    let empty = client.license().await.unwrap();
    assert_eq!(empty, tpsguard_api::appliance::LicenseInfo::default());
}
