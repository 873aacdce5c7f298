//! End-to-end account tests against a mock vendor API

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::credential_aged;
use tuya_monitor::app::account::{Account, AccountOptions};
use tuya_monitor::app::state::{AccountSlot, AppState};
use tuya_monitor::authn::signer::sign_device_request;
use tuya_monitor::authn::token_client::ApiKeys;
use tuya_monitor::cache::readings::ReadingsCache;
use tuya_monitor::errors::FetchError;
use tuya_monitor::models::device::{DeviceQuery, PropertyReading};
use tuya_monitor::models::region::Region;
use tuya_monitor::storage::layout::StorageLayout;
use tuya_monitor::storage::settings::AccountSettings;
use tuya_monitor::workers::poller;

const CLIENT_ID: &str = "cid";
const CLIENT_SECRET: &str = "secret";

fn options_for(server: &MockServer, devices: Vec<DeviceQuery>) -> AccountOptions {
    let keys = ApiKeys::new(CLIENT_ID, CLIENT_SECRET);
    let mut options = AccountOptions::new("home", keys, Region::Us);
    options.base_url = Some(server.uri());
    options.devices = devices;
    options
}

fn settings_for(server: &MockServer, device_id: &str) -> AccountSettings {
    serde_json::from_value(serde_json::json!({
        "name": "home",
        "client_id": CLIENT_ID,
        "client_secret": CLIENT_SECRET,
        "base_url": server.uri(),
        "devices": [{"device_id": device_id}]
    }))
    .unwrap()
}

fn token_body(access_token: &str, refresh_token: &str, expire_time: i64) -> String {
    format!(
        r#"{{"success":true,"t":1588925778000,"result":{{"access_token":"{}","refresh_token":"{}","expire_time":{},"uid":"u1"}}}}"#,
        access_token, refresh_token, expire_time
    )
}

async fn mount_status(server: &MockServer, device_id: &str, access_token: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v1.0/devices/{}/status", device_id)))
        .and(header("access_token", access_token))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_expired_credential_is_refreshed_before_polling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token/R1"))
        .and(header("client_id", CLIENT_ID))
        .and(header("sign_method", "HMAC-SHA256"))
        .respond_with(ResponseTemplate::new(200).set_body_string(token_body("A2", "R2", 7200)))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_status(
        &mock_server,
        "dev1",
        "A2",
        r#"{"success":true,"result":[{"code":"temp","value":215},{"code":"battery","value":80}]}"#,
    )
    .await;

    let now = Utc::now();
    let expired = credential_aged("A1", Some("R1"), now, 7300, 7200);
    let account = Account::initialize(
        options_for(&mock_server, vec![DeviceQuery::with_codes("dev1", ["temp"])]),
        Some(expired),
    )
    .await
    .unwrap();

    let stored = account.store().read();
    assert_eq!(stored.access_token(), "A2");
    assert_eq!(stored.refresh_token(), Some("R2"));
    let lifetime = stored.seconds_until_expiry(Utc::now());
    assert!((7190..=7200).contains(&lifetime), "lifetime {}", lifetime);

    let readings = account.poll("dev1").await.unwrap();
    assert_eq!(readings, vec![PropertyReading::new("temp", 215)]);

    // The device request is signed over the refreshed access token
    let requests = mock_server.received_requests().await.unwrap();
    let device_request = requests
        .iter()
        .find(|r| r.url.path() == "/v1.0/devices/dev1/status")
        .unwrap();
    let t = device_request.headers.get("t").unwrap().to_str().unwrap();
    let sign = device_request.headers.get("sign").unwrap().to_str().unwrap();
    assert_eq!(sign, sign_device_request(CLIENT_ID, "A2", CLIENT_SECRET, t));
}

#[tokio::test]
async fn test_initialize_without_credential_obtains_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(token_body("A1", "R1", 7200)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let account = Account::initialize(options_for(&mock_server, vec![]), None)
        .await
        .unwrap();
    assert_eq!(account.store().read().access_token(), "A1");
    assert_eq!(account.name(), "home");
}

#[tokio::test]
async fn test_initialize_with_valid_credential_stays_offline() {
    let mock_server = MockServer::start().await;

    let account = Account::initialize(
        options_for(&mock_server, vec![]),
        Some(credential_aged("A1", Some("R1"), Utc::now(), 0, 7200)),
    )
    .await
    .unwrap();

    assert_eq!(account.store().read().access_token(), "A1");
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_initialize_fails_when_vendor_rejects_keys() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"success":false,"code":1004,"msg":"sign invalid"}"#,
        ))
        .mount(&mock_server)
        .await;

    let err = Account::initialize(options_for(&mock_server, vec![]), None)
        .await
        .err()
        .unwrap();
    assert_eq!(err.reason(), "rejected");
}

#[tokio::test]
async fn test_unknown_device_is_rejected_without_network() {
    let mock_server = MockServer::start().await;

    let account = Account::initialize(
        options_for(&mock_server, vec![DeviceQuery::all("dev1")]),
        Some(credential_aged("A1", Some("R1"), Utc::now(), 0, 7200)),
    )
    .await
    .unwrap();

    assert_eq!(account.device_ids().collect::<Vec<_>>(), vec!["dev1"]);
    let err = account.poll("dev2").await.unwrap_err();
    assert!(matches!(err, FetchError::UnknownDevice(id) if id == "dev2"));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

/// Run a poller against `slot` until the returned sender fires
fn spawn_poller(
    slot: Arc<AccountSlot>,
    device_id: &str,
    readings: Arc<ReadingsCache>,
) -> (oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let device_id = device_id.to_string();
    let handle = tokio::spawn(async move {
        poller::run(
            &poller::Options::default(),
            slot.as_ref(),
            &device_id,
            readings.as_ref(),
            |_| tokio::time::sleep(Duration::from_millis(10)),
            Box::pin(async move {
                let _ = shutdown_rx.await;
            }),
        )
        .await;
    });
    (shutdown_tx, handle)
}

async fn wait_for_value(
    readings: &ReadingsCache,
    device_id: &str,
    code: &str,
) -> Option<serde_json::Value> {
    for _ in 0..300 {
        if let Some(value) = readings.value("home", device_id, code) {
            return Some(value);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

#[tokio::test]
async fn test_poller_records_readings_until_shutdown() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(token_body("A1", "R1", 7200)))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_status(
        &mock_server,
        "dev1",
        "A1",
        r#"{"success":true,"result":[{"code":"temp","value":19},{"code":"switch","value":true}]}"#,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    let state = AppState::init(&layout, vec![settings_for(&mock_server, "dev1")]).await;
    let slot = state.accounts[0].clone();
    assert!(slot.initialized().is_some());

    let (shutdown_tx, handle) = spawn_poller(slot, "dev1", state.readings.clone());

    assert_eq!(
        wait_for_value(&state.readings, "dev1", "temp").await,
        Some(serde_json::json!(19))
    );
    assert_eq!(
        state.readings.value("home", "dev1", "switch"),
        Some(serde_json::json!(true))
    );

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_account_unreachable_at_startup_recovers() {
    let mock_server = MockServer::start().await;
    // The first two token requests hit an unavailable vendor
    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .with_priority(1)
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(token_body("A1", "R1", 7200)))
        .mount(&mock_server)
        .await;
    mount_status(
        &mock_server,
        "dev1",
        "A1",
        r#"{"success":true,"result":[{"code":"temp","value":23}]}"#,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    let state = AppState::init(&layout, vec![settings_for(&mock_server, "dev1")]).await;

    // The account is kept even though it could not be initialized
    assert_eq!(state.accounts.len(), 1);
    let slot = state.accounts[0].clone();
    assert_eq!(slot.name(), "home");
    assert!(slot.initialized().is_none());

    let (shutdown_tx, handle) = spawn_poller(slot.clone(), "dev1", state.readings.clone());

    assert_eq!(
        wait_for_value(&state.readings, "dev1", "temp").await,
        Some(serde_json::json!(23))
    );
    let device = state.readings.get("home", "dev1").unwrap();
    assert!(device.last_error.is_none());
    assert!(slot.initialized().is_some());

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();

    // Two failed attempts, then one success that is reused afterwards
    let token_requests = mock_server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/v1.0/token")
        .count();
    assert_eq!(token_requests, 3);
}

#[tokio::test]
async fn test_failed_initialization_is_recorded_for_each_device() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/token"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path());
    let state = AppState::init(&layout, vec![settings_for(&mock_server, "dev1")]).await;
    let (shutdown_tx, handle) = spawn_poller(
        state.accounts[0].clone(),
        "dev1",
        state.readings.clone(),
    );

    let mut recorded = None;
    for _ in 0..300 {
        recorded = state.readings.get("home", "dev1");
        if recorded.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let device = recorded.unwrap();
    assert!(device.readings.is_empty());
    assert!(device.last_error.is_some());
    assert!(state.accounts[0].initialized().is_none());

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}
