//! Integration tests for the report submit/poll/download cycle.

mod common;

use std::time::Duration;

use common::*;
use pantry_transact::{
    ColumnOffsets, RecordExtractor, RowExtractor, SnapshotCache, TransactError,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn logged_in_session(server: &MockServer) -> pantry_transact::SessionManager {
    mount_login(server).await;
    let session = session(server);
    session.reload_session().await.expect("login should succeed");
    session
}

// ---------------------------------------------------------------------------
// Full cycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_report_rows_runs_full_cycle_and_feeds_cache() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;
    mount_favorites(&server, &["Daily Sales", REPORT_NAME]).await;

    // First poll: not ready yet. Later polls: ready.
    Mock::given(method("POST"))
        .and(path(IS_READY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(ready_body(None)))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_report_cycle(&server, "Inventory 2024.csv", INVENTORY_CSV).await;

    let rows = session
        .fetch_report_rows(&report_request())
        .await
        .expect("report cycle should succeed");
    assert_eq!(rows.len(), 6);

    let extractor = RowExtractor::new(
        "Profit Center - ",
        ColumnOffsets {
            name: 1,
            id: 2,
            quantity: 3,
        },
    );
    let outcome = extractor.extract(&rows);
    assert_eq!(outcome.accepted, 3);

    let cache = SnapshotCache::new();
    cache.load(outcome.products);
    assert_eq!(cache.list_locations().unwrap(), vec!["North", "South"]);
    assert_eq!(cache.get_product("North", "A1").unwrap().quantity, 10);
    assert_eq!(cache.get_product("North", "B2").unwrap().quantity, 0);
    assert_eq!(cache.list_products("South").unwrap().len(), 1);

    // The submitted entity is the matched favorite with protocol fields rewritten.
    let requests = server.received_requests().await.expect("recording enabled");
    let submit = requests
        .iter()
        .find(|r| r.url.path() == SUBMIT_PATH)
        .expect("submit request sent");
    let body: Value = serde_json::from_slice(&submit.body).expect("submit body is JSON");
    let change = &body["changeSet"][0];
    assert_eq!(change["Id"], 0);
    assert_eq!(change["Operation"], 3);
    assert_eq!(change["OriginalEntity"], json!({"__type": REPORT_TYPE}));
    let entity = &change["Entity"];
    assert_eq!(entity["id"], REPORT_ID);
    assert_eq!(entity["__type"], REPORT_TYPE);
    assert_eq!(entity["enabled"], true);
    assert_eq!(entity["last_run"], Value::Null);
    assert_eq!(
        entity["all_fields"],
        format!("{REPORT_NAME} Stock On Hand {USERNAME}")
    );
    assert!(entity.get("queue_time").is_none());

    let polls = requests
        .iter()
        .filter(|r| r.url.path() == IS_READY_PATH)
        .collect::<Vec<_>>();
    assert_eq!(polls.len(), 2);
    let poll_body: Value = serde_json::from_slice(&polls[0].body).expect("poll body is JSON");
    assert_eq!(poll_body, json!({"scheduleId": REPORT_ID}));
}

#[tokio::test]
async fn authenticated_calls_carry_bearer_token() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;

    Mock::given(method("GET"))
        .and(path(FAVORITES_PATH))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"GetFavoritesResult": {"RootResults": [{"name": "A", "id": 1}]}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let favorites = session.list_favorite_reports().await.expect("favorites");
    assert_eq!(pantry_transact::report_names(&favorites), vec!["A"]);
}

#[tokio::test]
async fn finalize_is_skipped_when_disabled() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;
    mount_favorites(&server, &[REPORT_NAME]).await;

    Mock::given(method("POST"))
        .and(path(finalize_path()))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_report_cycle(&server, "inv.csv", INVENTORY_CSV).await;

    let mut request = report_request();
    request.finalize = false;
    session
        .fetch_report_rows(&request)
        .await
        .expect("report cycle should succeed");
}

// ---------------------------------------------------------------------------
// Protocol failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_favorite_fails_without_submit_poll_or_download() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;
    mount_favorites(&server, &["Daily Sales", "Labor"]).await;

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(IS_READY_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(download_path("inv.csv")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = session.fetch_report_rows(&report_request()).await.unwrap_err();

    assert!(
        matches!(err, TransactError::ReportNotFound { ref name } if name == REPORT_NAME),
        "expected ReportNotFound, got: {err:?}"
    );
    assert!(err.to_string().contains(REPORT_NAME));
}

#[tokio::test]
async fn polling_times_out_naming_report_and_duration() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;
    mount_favorites(&server, &[REPORT_NAME]).await;

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(finalize_path()))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(IS_READY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(ready_body(None)))
        .mount(&server)
        .await;

    let mut request = report_request();
    request.poll_period = Duration::from_millis(20);
    request.poll_timeout = Duration::from_millis(200);

    let err = session.fetch_report_rows(&request).await.unwrap_err();

    match err {
        TransactError::PollTimedOut { ref name, ref timeout } => {
            assert_eq!(name, REPORT_NAME);
            assert_eq!(timeout, "200 milliseconds");
        }
        other => panic!("expected PollTimedOut, got: {other:?}"),
    }
}

#[tokio::test]
async fn non_200_submit_is_a_submission_failure() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;
    mount_favorites(&server, &[REPORT_NAME]).await;

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(IS_READY_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = session.fetch_report_rows(&report_request()).await.unwrap_err();
    assert!(
        matches!(err, TransactError::SubmissionFailed { status: 500, .. }),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn non_200_finalize_is_a_finalize_failure() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;
    mount_favorites(&server, &[REPORT_NAME]).await;

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(finalize_path()))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = session.fetch_report_rows(&report_request()).await.unwrap_err();
    assert!(
        matches!(err, TransactError::FinalizeFailed { status: 404, .. }),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn unsuccessful_poll_is_a_report_creation_failure() {
    let server = MockServer::start().await;
    let session = logged_in_session(&server).await;
    mount_favorites(&server, &[REPORT_NAME]).await;

    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(finalize_path()))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(IS_READY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "IsReportReadyResult": {"success": false, "reportReady": false, "reportFile": null}
        })))
        .mount(&server)
        .await;

    let err = session.fetch_report_rows(&report_request()).await.unwrap_err();
    assert!(
        matches!(err, TransactError::ReportCreationFailed { ref name } if name == REPORT_NAME),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn fetch_before_login_is_not_ready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = session(&server)
        .fetch_report_rows(&report_request())
        .await
        .unwrap_err();
    assert!(matches!(err, TransactError::NotReady), "got: {err:?}");
}
