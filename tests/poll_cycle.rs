//! End-to-end poll cycles against a mocked nextbike feed

use chrono::{Local, Timelike};
use nextbike_tracker::config::Config;
use nextbike_tracker::store;
use nextbike_tracker::sync::{SyncError, Tracker};
use serde_json::json;
use sqlx::SqlitePool;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED_PATH: &str = "/maps/nextbike-live.json";

async fn setup(server: &MockServer) -> (TempDir, SqlitePool, Tracker) {
    setup_with_interval(server, Config::default().poll_interval_secs).await
}

async fn setup_with_interval(
    server: &MockServer,
    poll_interval_secs: u64,
) -> (TempDir, SqlitePool, Tracker) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        endpoint: format!("{}{}", server.uri(), FEED_PATH),
        database_path: dir.path().join("nextbike.db").display().to_string(),
        request_timeout_secs: 1,
        poll_interval_secs,
        ..Config::default()
    };

    let pool = store::connect(&config.database_path).await.unwrap();
    store::ensure_schema(&pool).await.unwrap();
    let tracker = Tracker::new(pool.clone(), &config).unwrap();
    (dir, pool, tracker)
}

fn leipzig_feed(bike_numbers: &[&str], lat: f64, lng: f64) -> serde_json::Value {
    json!({
        "countries": [
            {
                "country_name": "Germany",
                "cities": [
                    {
                        "name": "Leipzig",
                        "places": [
                            { "number": 4011, "bike_numbers": bike_numbers, "lat": lat, "lng": lng }
                        ]
                    },
                    {
                        "name": "Halle",
                        "places": [
                            { "number": 5001, "bike_numbers": ["20091"], "lat": 51.48, "lng": 11.97 }
                        ]
                    }
                ]
            }
        ]
    })
}

async fn mount_feed(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(FEED_PATH))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn tracked_bike_is_recorded_after_one_cycle() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        ResponseTemplate::new(200).set_body_json(leipzig_feed(&["20095", "10001"], 51.34, 12.37)),
    )
    .await;
    let (_dir, pool, tracker) = setup(&server).await;
    let started = Local::now().naive_local().with_nanosecond(0).unwrap();

    let stored = tracker.run_cycle().await.unwrap();

    assert_eq!(stored, 1);
    assert_eq!(store::count_sightings(&pool).await.unwrap(), 1);
    let rows = store::sightings_for_bike(&pool, "20095").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].bike_id, "20095");
    assert_eq!(rows[0].latitude, Some(51.34));
    assert_eq!(rows[0].longitude, Some(12.37));
    assert!(rows[0].seen_at >= started);
}

#[tokio::test]
async fn repeated_cycles_append_rows() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        ResponseTemplate::new(200).set_body_json(leipzig_feed(&["20091", "20091"], 51.3, 12.3)),
    )
    .await;
    let (_dir, pool, tracker) = setup(&server).await;

    tracker.run_cycle().await.unwrap();
    tracker.run_cycle().await.unwrap();

    assert_eq!(store::count_sightings(&pool).await.unwrap(), 4);
}

#[tokio::test]
async fn feed_without_tracked_bikes_commits_nothing() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "countries": [] })),
    )
    .await;
    let (_dir, pool, tracker) = setup(&server).await;

    assert_eq!(tracker.run_cycle().await.unwrap(), 0);
    assert_eq!(store::count_sightings(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn truncated_feed_skips_the_cycle() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        ResponseTemplate::new(200).set_body_string(r#"{"countries": [{"country_name": "Germ"#),
    )
    .await;
    let (_dir, pool, tracker) = setup(&server).await;

    assert!(matches!(tracker.poll().await, Err(SyncError::DecodeError(_))));
    assert_eq!(tracker.run_cycle().await.unwrap(), 0);
    assert_eq!(store::count_sightings(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn timeout_skips_the_cycle() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(leipzig_feed(&["20095"], 51.34, 12.37))
            .set_delay(Duration::from_secs(3)),
    )
    .await;
    let (_dir, pool, tracker) = setup(&server).await;

    assert!(matches!(tracker.poll().await, Err(SyncError::NetworkError(_))));
    assert_eq!(tracker.run_cycle().await.unwrap(), 0);
    assert_eq!(store::count_sightings(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn start_keeps_polling_after_recoverable_failures() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"),
    )
    .await;
    let (_dir, pool, tracker) = setup_with_interval(&server, 1).await;

    // Ticks fire at 0s, 1s and 2s; the loop must still be running afterwards
    let result = tokio::time::timeout(Duration::from_millis(2500), tracker.start()).await;
    assert!(result.is_err(), "start returned early: {:?}", result);

    let requests = server.received_requests().await.unwrap();
    assert!(requests.len() >= 2, "only {} polls", requests.len());
    assert_eq!(store::count_sightings(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn storage_failure_is_fatal() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        ResponseTemplate::new(200).set_body_json(leipzig_feed(&["20095"], 51.34, 12.37)),
    )
    .await;
    let (_dir, pool, tracker) = setup(&server).await;
    pool.close().await;

    let err = tracker.run_cycle().await.unwrap_err();
    assert!(matches!(err, SyncError::PersistenceError(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn start_stops_on_storage_failure() {
    let server = MockServer::start().await;
    mount_feed(
        &server,
        ResponseTemplate::new(200).set_body_json(leipzig_feed(&["20095"], 51.34, 12.37)),
    )
    .await;
    let (_dir, pool, tracker) = setup(&server).await;
    pool.close().await;

    let result = tokio::time::timeout(Duration::from_secs(5), tracker.start())
        .await
        .expect("first cycle runs immediately");
    assert!(matches!(result, Err(SyncError::PersistenceError(_))));
}
