//! Shared wiremock fixtures for the Transact portal.

#![allow(dead_code)]

use std::time::Duration;

use pantry_transact::{ReportRequest, SessionManager, SessionSettings};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "kitchen";
pub const USERNAME: &str = "pantry-bot";
pub const TOKEN: &str = "tok-123";
pub const REPORT_NAME: &str = "Inventory Export";
pub const REPORT_ID: i64 = 42;
pub const REPORT_TYPE: &str = "HistoryReport:#QuadPoint.Domain";

pub const LOGGED_IN_PATH: &str = "/QPWebOffice-Web-AuthenticationService.svc/JSON/LoggedIn";
pub const AUTHENTICATE_PATH: &str = "/QPWebOffice-Web-AuthenticationService.svc/JSON/Authenticate";
pub const FAVORITES_PATH: &str = "/QPWebOffice-Web-QuadPointDomain.svc/JSON/GetFavorites";
pub const SUBMIT_PATH: &str = "/QPWebOffice-Web-QuadPointDomain.svc/JSON/SubmitChanges";
pub const IS_READY_PATH: &str = "/QPWebOffice-Web-BusinessService.svc/JSON/IsReportReady";

pub fn settings(base_url: &str) -> SessionSettings {
    SessionSettings {
        base_url: base_url.to_string(),
        tenant: TENANT.to_string(),
        username: USERNAME.to_string(),
        password: "hunter2".to_string(),
        title_prefixes: vec!["QuadPoint Cloud".to_string(), "Transact Cloud POS".to_string()],
        request_timeout: Duration::from_secs(5),
        user_agent: "pantry-test/0.1".to_string(),
    }
}

pub fn session(server: &MockServer) -> SessionManager {
    SessionManager::new(settings(&server.uri())).expect("session construction should not fail")
}

pub fn report_request() -> ReportRequest {
    ReportRequest {
        report_name: REPORT_NAME.to_string(),
        report_type: REPORT_TYPE.to_string(),
        poll_period: Duration::from_millis(20),
        poll_timeout: Duration::from_secs(5),
        finalize: true,
    }
}

pub fn finalize_path() -> String {
    format!("/api/v2/tenants/{TENANT}/reportjobs/{REPORT_ID}/finalize")
}

pub fn download_path(file: &str) -> String {
    format!(
        "/BinaryDataService.svc/HistoryReport/QuadPoint%20POS/{}/CSV",
        file.replace(' ', "%20")
    )
}

pub async fn mount_title(server: &MockServer, title: &str) {
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("tenant", TENANT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("<html><head><title>{title}</title></head><body></body></html>")),
        )
        .mount(server)
        .await;
}

pub async fn mount_cookie(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(LOGGED_IN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "ASP.NET_SessionId=abc123; path=/; HttpOnly"),
        )
        .mount(server)
        .await;
}

pub async fn mount_authenticate(server: &MockServer, authorization: &str) {
    Mock::given(method("POST"))
        .and(path(AUTHENTICATE_PATH))
        .respond_with(ResponseTemplate::new(200).insert_header("authorization", authorization))
        .mount(server)
        .await;
}

/// Mounts a complete, successful login sequence.
pub async fn mount_login(server: &MockServer) {
    mount_title(server, "QuadPoint Cloud 5.2.1").await;
    mount_cookie(server).await;
    mount_authenticate(server, &format!("Bearer {TOKEN}")).await;
}

pub async fn mount_favorites(server: &MockServer, names: &[&str]) {
    let items: Vec<_> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let id = if *name == REPORT_NAME { REPORT_ID } else { i as i64 + 1 };
            json!({
                "name": name,
                "id": id,
                "report_name": "Stock On Hand",
                "queue_time": "2024-05-01T00:00:00",
                "enabled": false
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path(FAVORITES_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"GetFavoritesResult": {"RootResults": items}})),
        )
        .mount(server)
        .await;
}

/// How many requests the mock server has seen for `request_path`.
pub async fn request_count(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}

pub fn ready_body(file: Option<&str>) -> serde_json::Value {
    json!({
        "IsReportReadyResult": {
            "success": true,
            "reportReady": file.is_some(),
            "reportFile": file
        }
    })
}

/// Mounts submit, finalize, an immediately-ready poll and the download.
pub async fn mount_report_cycle(server: &MockServer, file: &str, csv: &str) {
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(finalize_path()))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(IS_READY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(ready_body(Some(file))))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(download_path(file)))
        .and(query_param("jwthidden", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_string(csv))
        .mount(server)
        .await;
}

pub const INVENTORY_CSV: &str = "\
Inventory Report,,,,
x,Profit Center - North,Apple,A1,10
x,Profit Center - North,Bread,B2,-3
x,Profit Center - South,Pear,P1,5
x,Profit Center - South,,P2,5
Totals,,,,18
";
