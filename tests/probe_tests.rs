mod common;

use common::{info_reply, FakeTransport, Reply, Stats};
use q3scan_rs::probe::{probe_proxy, probe_server};
use q3scan_rs::types::{ProbeOutcome, Target};
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_millis(150);

fn target(port: u16) -> Target {
    Target::new("test.local", port)
}

#[tokio::test]
async fn silent_server_resolves_to_none_within_timeout() {
    let transport = FakeTransport::new().with(27960, Reply::Silent);
    let start = Instant::now();
    let outcome = probe_server(&transport, &target(27960), TIMEOUT).await;
    assert_eq!(outcome, ProbeOutcome::None);
    assert!(start.elapsed() < TIMEOUT + Duration::from_secs(1));
    // The abandoned session is still released.
    assert_eq!(Stats::get(&transport.stats.terminated), 1);
}

#[tokio::test]
async fn info_fields_copied_verbatim() {
    let transport = FakeTransport::new().with(
        27960,
        info_reply(&[("game", "baseq3"), ("sv_maxclients", "16"), ("hostname", "^3Test")]),
    );
    match probe_server(&transport, &target(27960), TIMEOUT).await {
        ProbeOutcome::ServerInfo(info) => {
            assert_eq!(info.0.len(), 3);
            assert_eq!(info.field("sv_maxclients"), "16");
            assert_eq!(info.field("hostname"), "^3Test");
            assert_eq!(info.field("protocol"), "N\\A");
        }
        other => panic!("expected server info, got {other:?}"),
    }
    assert_eq!(Stats::get(&transport.stats.opened), 1);
    assert_eq!(Stats::get(&transport.stats.terminated), 1);
}

#[tokio::test]
async fn server_errors_and_garbage_are_none() {
    let transport = FakeTransport::new()
        .with(1, Reply::Error)
        .with(2, Reply::Data(b"print\nhello".to_vec()))
        .with(3, Reply::Data(Vec::new()));
    for port in 1..=3 {
        assert_eq!(
            probe_server(&transport, &target(port), TIMEOUT).await,
            ProbeOutcome::None
        );
    }
    assert_eq!(Stats::get(&transport.stats.terminated), 3);
}

#[tokio::test]
async fn proxy_alive_only_on_sentinel_byte() {
    let transport = FakeTransport::new()
        .with(30000, Reply::Data(b"n\\qwfwd".to_vec()))
        .with(30001, Reply::Data(b"infoResponse\n".to_vec()))
        .with(30002, Reply::Data(Vec::new()))
        .with(30003, Reply::Silent)
        .with(30004, Reply::Error);

    assert_eq!(
        probe_proxy(&transport, &target(30000), TIMEOUT).await,
        ProbeOutcome::ProxyAlive
    );
    for port in 30001..=30004 {
        assert_eq!(
            probe_proxy(&transport, &target(port), TIMEOUT).await,
            ProbeOutcome::None,
            "port {port}"
        );
    }
    assert_eq!(Stats::get(&transport.stats.proxy_requests), 5);
    assert_eq!(Stats::get(&transport.stats.info_requests), 0);
    assert_eq!(Stats::get(&transport.stats.terminated), 5);
}

#[tokio::test]
async fn each_probe_gets_a_fresh_session() {
    let transport = FakeTransport::new().with(5, Reply::Data(b"n".to_vec()));
    for _ in 0..3 {
        probe_proxy(&transport, &target(5), TIMEOUT).await;
    }
    assert_eq!(Stats::get(&transport.stats.opened), 3);
    assert_eq!(Stats::get(&transport.stats.terminated), 3);
}

#[tokio::test]
async fn high_ascii_hostname_survives_server_query() {
    let transport = FakeTransport::new().with(
        27960,
        Reply::Data(b"infoResponse\n\\game\\baseq3\\hostname\\Caf\xE9".to_vec()),
    );
    match probe_server(&transport, &target(27960), TIMEOUT).await {
        ProbeOutcome::ServerInfo(info) => assert_eq!(info.field("hostname"), "Caf\u{e9}"),
        other => panic!("expected server info, got {other:?}"),
    }
}

#[tokio::test]
async fn trailing_info_separator_still_reports_server() {
    let transport = FakeTransport::new().with(
        27961,
        Reply::Data(b"infoResponse\n\\game\\baseq3\\hostname\\X\\".to_vec()),
    );
    match probe_server(&transport, &target(27961), TIMEOUT).await {
        ProbeOutcome::ServerInfo(info) => {
            assert_eq!(info.field("game"), "baseq3");
            assert_eq!(info.field("hostname"), "X");
        }
        other => panic!("expected server info, got {other:?}"),
    }
}
