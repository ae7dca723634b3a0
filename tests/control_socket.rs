//! Admin commands sent over the control socket reach the running proxy.

use std::sync::atomic::Ordering;

use forward_proxy::admin::{ControlClient, ControlError, ControlRequest};

mod common;

use common::{get_request, memory_config, send_raw, start_control, start_origin, start_proxy};

const HELLO: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello";

#[tokio::test]
async fn test_block_from_client_applies_to_next_request() {
    let (origin, accepted) = start_origin(HELLO).await;
    let proxy = start_proxy(memory_config()).await;
    let control = start_control(&proxy).await;

    let mut client = ControlClient::connect(&control).await.unwrap();
    let blocked = client
        .send(&ControlRequest::Block { domain: "127.0.0.1".into() })
        .await
        .unwrap();
    assert_eq!(blocked, serde_json::json!(["127.0.0.1"]));

    let response = send_raw(proxy.addr, &get_request(origin, "/")).await;
    assert!(response.starts_with(b"HTTP/1.1 403 Forbidden\r\n"));
    assert_eq!(accepted.load(Ordering::SeqCst), 0);

    client
        .send(&ControlRequest::Unblock { domain: "127.0.0.1".into() })
        .await
        .unwrap();
    let response = send_raw(proxy.addr, &get_request(origin, "/")).await;
    assert_eq!(response, HELLO);
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_clear_cache_from_client_forces_refetch() {
    let (origin, accepted) = start_origin(HELLO).await;
    let proxy = start_proxy(memory_config()).await;
    let control = start_control(&proxy).await;
    let request = get_request(origin, "/cached");

    send_raw(proxy.addr, &request).await;
    send_raw(proxy.addr, &request).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1);

    let mut client = ControlClient::connect(&control).await.unwrap();
    let stats = client.send(&ControlRequest::ClearCache).await.unwrap();
    assert_eq!(stats["total_cached"], 0);

    send_raw(proxy.addr, &request).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cache_toggle_and_stats_reflect_running_proxy() {
    let (origin, accepted) = start_origin(HELLO).await;
    let proxy = start_proxy(memory_config()).await;
    let control = start_control(&proxy).await;
    let request = get_request(origin, "/toggle");
    send_raw(proxy.addr, &request).await;

    let mut client = ControlClient::connect(&control).await.unwrap();
    let toggled = client
        .send(&ControlRequest::SetCacheEnabled { enabled: false })
        .await
        .unwrap();
    assert_eq!(toggled["cache_enabled"], false);

    send_raw(proxy.addr, &request).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 2);

    let stats = client.send(&ControlRequest::Stats).await.unwrap();
    assert_eq!(stats["is_running"], true);
    assert_eq!(stats["total_requests"], 2);
    assert_eq!(stats["cached_items"], 1);
    assert_eq!(stats["server_address"], proxy.addr.to_string());
}

#[tokio::test]
async fn test_store_errors_are_reported_to_client() {
    let proxy = start_proxy(memory_config()).await;
    let control = start_control(&proxy).await;
    let mut client = ControlClient::connect(&control).await.unwrap();

    proxy.ctx.close().await;
    let err = client.send(&ControlRequest::Stats).await.unwrap_err();
    assert!(matches!(err, ControlError::Rejected(ref m) if m.contains("database")));
}
