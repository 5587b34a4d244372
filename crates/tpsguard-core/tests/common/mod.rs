// Shared fixtures for the tpsguard-core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tpsguard_api::{ApplianceClient, Credentials, RetryConfig, SessionCache, TlsMode, TransportConfig};
use tpsguard_core::{EventType, Notification, NotificationSink};

pub const ZONES: &str = "/tps/protected_objects/zones/api/";
pub const SERVICE_ACCOUNT: &str = "guardian";

/// Sink that keeps every notification for inspection.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<EventType> {
        self.sent().iter().map(|n| n.event_type).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

pub fn transport() -> TransportConfig {
    TransportConfig {
        tls: TlsMode::System,
        timeout: Duration::from_secs(5),
        retry: RetryConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..RetryConfig::default()
        },
    }
}

pub fn client_for(uri: &str) -> Arc<ApplianceClient> {
    Arc::new(ApplianceClient::new(
        Url::parse(uri).unwrap(),
        Credentials::new(SERVICE_ACCOUNT, SecretString::from("s3cret".to_owned())),
        transport(),
        SessionCache::disabled(),
    ))
}

/// A server that accepts any login.
pub async fn appliance() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/login/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "csrftoken=tok-1; Path=/")
                .set_body_string(
                    r#"<input type='hidden' name='csrfmiddlewaretoken' value='form-token'>
<input id="id_username" name="username">"#,
                ),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Set-Cookie", "sessionid=s1; Path=/")
                .insert_header("Location", "/tps/home/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tps/home/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Home</h1>"))
        .mount(&server)
        .await;
    server
}

pub fn zone_row(id: &str, name: &str, mode: &str) -> Value {
    json!({"id": id, "zone_name": name, "operational_mode": mode})
}

pub fn zone_page(rows: &[Value]) -> Value {
    json!({"total": rows.len(), "object_list": rows})
}

pub fn write_template(dir: &Path, name: &str) {
    let body = json!({
        "zone_payload": {
            "zone_name": "placeholder",
            "ip_list": [],
            "profile_name": "web-default",
            "device_group": "dg-1",
            "port": {"zone_service_list": [{"port": 80}, {"port": 443}]}
        },
        "monitor_payload": {"protection_values": [{"level": 1}]}
    });
    std::fs::write(dir.join(format!("{name}.json")), body.to_string()).unwrap();
}
