//! End-to-end tests for the plain HTTP relay path.

use obfs_forward_proxy::crypto::SecretKey;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

mod common;

async fn send_raw(proxy: std::net::SocketAddr, request: &str) -> (String, Vec<u8>) {
    let mut client = TcpStream::connect(proxy).await.unwrap();
    client.write_all(request.as_bytes()).await.unwrap();
    let raw = common::read_to_close(&mut client).await;
    common::split_response(&raw)
}

#[tokio::test]
async fn test_obfuscated_get_strips_proxy_headers() {
    let key = common::test_key();
    let (origin, mut heads) = common::start_http_origin("hello").await;
    let (proxy, _shutdown) = common::start_proxy(Some(key.clone())).await;

    let request = format!(
        "GET http://{origin}/ HTTP/1.1\r\nHost: {origin}\r\nProxy-Connection: keep-alive\r\nProxy-Authorization: Basic Zm9vOmJhcg==\r\nX-Keep: 1\r\n\r\n"
    );
    let (head, body) = send_raw(proxy, &request).await;

    assert!(head.starts_with("HTTP/1.1 200"), "unexpected head: {head}");
    assert_ne!(body, b"hello", "body should be transformed on the client leg");
    assert_eq!(common::transform(&key, &body), b"hello");

    let origin_head = heads.recv().await.unwrap().to_ascii_lowercase();
    assert!(origin_head.starts_with("get / http/1.1\r\n"), "origin saw: {origin_head}");
    assert!(!origin_head.contains("proxy-connection"));
    assert!(!origin_head.contains("proxy-authorization"));
    assert!(origin_head.contains("x-keep: 1"));
}

#[tokio::test]
async fn test_response_headers_are_copied_with_duplicates() {
    let (origin, _heads) = common::start_http_origin("hello").await;
    let (proxy, _shutdown) = common::start_proxy(None).await;

    let request = format!("GET http://{origin}/dup HTTP/1.1\r\nHost: {origin}\r\n\r\n");
    let (head, body) = send_raw(proxy, &request).await;

    let head = head.to_ascii_lowercase();
    let a = head.find("x-origin: a").expect("first value missing");
    let b = head.find("x-origin: b").expect("second value missing");
    assert!(a < b);
    assert!(head.contains("content-length: 5"));
    assert_eq!(body, b"hello");
}

#[tokio::test]
async fn test_plain_relay_with_reqwest() {
    let (origin, _heads) = common::start_http_origin("plain body").await;
    let (proxy, _shutdown) = common::start_proxy(None).await;

    let client = reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{proxy}")).unwrap())
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();

    let res = client
        .get(format!("http://{origin}/"))
        .send()
        .await
        .expect("Proxy unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "plain body");
}

#[tokio::test]
async fn test_origin_form_uses_host_header() {
    let (origin, mut heads) = common::start_http_origin("ok").await;
    let (proxy, _shutdown) = common::start_proxy(None).await;

    let request = format!("GET /origin-form?x=1 HTTP/1.1\r\nHost: {origin}\r\n\r\n");
    let (head, body) = send_raw(proxy, &request).await;

    assert!(head.starts_with("HTTP/1.1 200"), "unexpected head: {head}");
    assert_eq!(body, b"ok");
    let origin_head = heads.recv().await.unwrap();
    assert!(origin_head.starts_with("GET /origin-form?x=1 HTTP/1.1\r\n"));
}

#[tokio::test]
async fn test_unreachable_origin_is_bad_gateway() {
    let dead = common::unused_addr();
    let (proxy, _shutdown) = common::start_proxy(Some(common::test_key())).await;

    let request = format!("GET http://{dead}/ HTTP/1.1\r\nHost: {dead}\r\n\r\n");
    let (head, body) = send_raw(proxy, &request).await;

    assert!(head.starts_with("HTTP/1.1 502"), "unexpected head: {head}");
    assert!(String::from_utf8_lossy(&body).starts_with("Target server error"));
}

#[tokio::test]
async fn test_malformed_head_is_bad_request() {
    let (proxy, _shutdown) = common::start_proxy(None).await;
    let (head, _) = send_raw(proxy, "GET\x01 / HTTP/1.1\r\n\r\n").await;
    assert!(head.starts_with("HTTP/1.1 400"), "unexpected head: {head}");
}

#[tokio::test]
async fn test_distinct_keys_produce_distinct_bodies() {
    let key_a = common::test_key();
    let key_b = std::sync::Arc::new(SecretKey::generate().unwrap());
    let (origin, _heads) = common::start_http_origin("same payload").await;
    let (proxy_a, _shutdown_a) = common::start_proxy(Some(key_a.clone())).await;
    let (proxy_b, _shutdown_b) = common::start_proxy(Some(key_b.clone())).await;

    let request = format!("GET http://{origin}/ HTTP/1.1\r\nHost: {origin}\r\n\r\n");
    let (_, body_a) = send_raw(proxy_a, &request).await;
    let (_, body_b) = send_raw(proxy_b, &request).await;

    assert_ne!(body_a, body_b);
    assert_eq!(common::transform(&key_a, &body_a), b"same payload");
    assert_eq!(common::transform(&key_b, &body_b), b"same payload");
}
