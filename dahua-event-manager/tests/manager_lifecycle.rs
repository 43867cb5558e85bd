//! End-to-end tests: a manager running against a mock device over HTTP

use std::time::Duration;

use mockito::{Matcher, Server, ServerGuard};

use dahua_event_manager::prelude::*;

const EVENT_PATH: &str = "/cgi-bin/eventManager.cgi";

fn mock_device(server: &mut ServerGuard) {
    server
        .mock("GET", EVENT_PATH)
        .match_query(Matcher::Any)
        .match_header("authorization", Matcher::Missing)
        .with_status(401)
        .with_header(
            "www-authenticate",
            r#"Digest realm="Login to NVR", qop="auth", nonce="3821004821", opaque="a1b2c3""#,
        )
        .create();

    server
        .mock("GET", EVENT_PATH)
        .match_query(Matcher::Any)
        .match_header("authorization", Matcher::Regex("^Digest ".to_string()))
        .with_status(200)
        .with_header("content-type", "multipart/x-mixed-replace; boundary=myboundary")
        .with_body("--myboundary\r\nContent-Type: text/plain\r\n\r\nCode=VideoMotion;action=Start;index=1\r\n")
        .create();
}

fn config_for(server: &ServerGuard, reconnect_delay: Duration) -> WatcherConfig {
    let addr = server.socket_address();
    let device = DeviceConfig::new(addr.ip().to_string())
        .with_port(addr.port())
        .with_name("Driveway")
        .with_channel(1, "Front Door");

    let settings = WatcherSettings::new()
        .with_reconnect_delay(reconnect_delay)
        .with_idle_sleep(Duration::from_millis(10))
        .with_poll_timeout(Duration::from_millis(100))
        .with_connect_timeout(Duration::from_secs(2));

    WatcherConfig::new(vec![device]).with_settings(settings)
}

#[test]
fn test_manager_delivers_events_from_device() {
    let mut server = Server::new();
    mock_device(&mut server);

    let mut manager = DahuaEventManager::new(config_for(&server, Duration::from_secs(5))).unwrap();
    manager.start().unwrap();

    let event = manager
        .iter()
        .recv_timeout(Duration::from_secs(10))
        .expect("no event delivered");

    assert_eq!(event.event_type, "dahua_event_received");
    let payload = event.record.payload();
    assert_eq!(payload.get("name").map(String::as_str), Some("Driveway"));
    assert_eq!(payload.get("Code").map(String::as_str), Some("VideoMotion"));
    assert_eq!(payload.get("action").map(String::as_str), Some("Start"));
    assert_eq!(payload.get("index").map(String::as_str), Some("1"));
    assert_eq!(payload.get("channel").map(String::as_str), Some("Front Door"));

    manager.stop();
    manager.join().unwrap();
    assert!(!manager.is_running());
}

#[test]
fn test_manager_reconnects_after_stream_ends() {
    let mut server = Server::new();
    mock_device(&mut server);

    // Each connection yields one event, then the mock closes the stream
    let mut manager = DahuaEventManager::new(config_for(&server, Duration::from_millis(200))).unwrap();
    manager.start().unwrap();

    let events: Vec<_> = manager
        .iter()
        .timeout_iter(Duration::from_secs(10))
        .take(2)
        .collect();
    assert_eq!(events.len(), 2);

    manager.stop();
    manager.join().unwrap();
}

#[test]
fn test_cancellation_token_stops_worker_from_another_thread() {
    let mut server = Server::new();
    mock_device(&mut server);

    let mut manager = DahuaEventManager::new(config_for(&server, Duration::from_secs(5))).unwrap();
    manager.start().unwrap();

    let token = manager.cancellation_token();
    std::thread::spawn(move || token.cancel()).join().unwrap();

    manager.join().unwrap();
    assert!(!manager.is_running());

    // Whatever was published before the cancel is still delivered, then
    // iteration ends
    let mut events = manager.iter();
    events.by_ref().for_each(drop);
    assert!(events.worker_exited());
}
