//! Tests for the daemon status client and its wire format.

use std::time::Duration;

use chainward::watcher::{DaemonInfo, StatusClient};

#[test]
fn daemon_info_parses_a_getinfo_payload() {
    // Representative `/getinfo` response; unknown fields are ignored.
    let payload = r#"{
        "alt_blocks_count": 10,
        "difficulty": 120000,
        "grey_peerlist_size": 4135,
        "height": 812000,
        "incoming_connections_count": 12,
        "last_known_block_index": 812100,
        "network_height": 812100,
        "outgoing_connections_count": 8,
        "status": "OK",
        "synced": false,
        "tx_count": 262687,
        "tx_pool_size": 0,
        "white_peerlist_size": 500
    }"#;

    let info: DaemonInfo = serde_json::from_str(payload).expect("parse getinfo");
    assert_eq!(info.height, 812_000);
    assert_eq!(info.network_height, 812_100);
    assert_eq!(info.difficulty, 120_000);
    assert!(!info.synced);
}

#[test]
fn daemon_info_defaults_missing_fields() {
    let info: DaemonInfo = serde_json::from_str(r#"{"height": 10}"#).expect("parse");
    assert_eq!(info.height, 10);
    assert_eq!(info.network_height, 0);
    assert_eq!(info.difficulty, 0);
    assert!(!info.synced);
}

#[tokio::test]
async fn fetch_info_errors_when_the_daemon_is_unreachable() {
    let client = StatusClient::new("http://127.0.0.1:9", Duration::from_secs(1));
    let result = client.fetch_info().await;
    assert!(result.is_err());
}
