//! End-to-end handshake tests over real TCP connections.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use wsgate::ServerConfig;

mod common;

use common::{
    raw_request, read_to_close, send_request, start_server, upgrade_headers, SAMPLE_ACCEPT,
};

#[tokio::test]
async fn test_upgrade_then_echo() {
    let server = start_server(ServerConfig::default()).await;

    let request = raw_request("GET", "/", &upgrade_headers("13"));
    let (mut stream, response) = send_request(server.addr, &request).await;

    assert_eq!(response.status_line, "HTTP/1.1 101 Switching Protocols");
    assert_eq!(response.header("sec-websocket-accept"), Some(SAMPLE_ACCEPT));
    assert!(response.header("upgrade").unwrap().eq_ignore_ascii_case("websocket"));
    assert!(response.header("connection").unwrap().eq_ignore_ascii_case("upgrade"));
    assert!(response.body_prefix.is_empty());

    // The connection stays open and every byte comes back.
    for message in [&b"hello"[..], &b"\x81\x85\x37\xfa\x21\x3d\x7f\x9f\x4d\x51\x58"[..]] {
        stream.write_all(message).await.unwrap();
        let mut echoed = vec![0u8; message.len()];
        tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut echoed))
            .await
            .expect("no echo")
            .unwrap();
        assert_eq!(echoed, message);
    }

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_version_mismatch_aborts() {
    let server = start_server(ServerConfig::default()).await;

    let request = raw_request("GET", "/", &upgrade_headers("8"));
    let (mut stream, response) = send_request(server.addr, &request).await;

    assert_eq!(response.status, 400);
    assert_eq!(response.header("sec-websocket-version"), Some("13"));
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert_eq!(response.header("content-length"), Some("11"));
    assert!(response.header("connection").unwrap().eq_ignore_ascii_case("close"));
    assert!(response.header("sec-websocket-accept").is_none());

    let mut body = response.body_prefix.clone();
    body.extend(read_to_close(&mut stream).await);
    assert_eq!(body, b"Bad Request");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_missing_headers_and_wrong_method() {
    let server = start_server(ServerConfig::default()).await;

    for missing in ["Host", "Upgrade", "Connection", "Sec-WebSocket-Key"] {
        let headers: Vec<_> = upgrade_headers("13")
            .into_iter()
            .filter(|(name, _)| *name != missing)
            .collect();
        let request = raw_request("GET", "/", &headers);
        let (mut stream, response) = send_request(server.addr, &request).await;
        assert_eq!(response.status, 400, "without {}", missing);
        assert!(response.header("sec-websocket-version").is_none());
        read_to_close(&mut stream).await;
    }

    let request = raw_request("POST", "/", &upgrade_headers("13"));
    let (mut stream, response) = send_request(server.addr, &request).await;
    assert_eq!(response.status, 400);
    read_to_close(&mut stream).await;

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_path_gate() {
    let mut config = ServerConfig::default();
    config.handshake.path = "/chat".into();
    let server = start_server(config).await;

    let request = raw_request("GET", "/other", &upgrade_headers("13"));
    let (mut stream, response) = send_request(server.addr, &request).await;
    assert_eq!(response.status, 400);
    assert!(response.header("sec-websocket-version").is_none());
    read_to_close(&mut stream).await;

    // The query string is not part of the path.
    let request = raw_request("GET", "/chat?room=1", &upgrade_headers("13"));
    let (_stream, response) = send_request(server.addr, &request).await;
    assert_eq!(response.status, 101);
    assert_eq!(response.header("sec-websocket-accept"), Some(SAMPLE_ACCEPT));

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_accept_headers_from_config() {
    let mut config = ServerConfig::default();
    config
        .handshake
        .accept_headers
        .insert("X-Served-By".into(), "wsgate-test".into());
    let server = start_server(config).await;

    let request = raw_request("GET", "/", &upgrade_headers("13"));
    let (_stream, response) = send_request(server.addr, &request).await;
    assert_eq!(response.status, 101);
    assert_eq!(response.header("x-served-by"), Some("wsgate-test"));

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_tungstenite_client_completes_handshake() {
    let server = start_server(ServerConfig::default()).await;

    let tcp = TcpStream::connect(server.addr).await.unwrap();
    let url = format!("ws://{}/", server.addr);
    let (mut ws, response) = tokio_tungstenite::client_async(url, tcp).await.unwrap();
    assert_eq!(response.status(), 101);

    // Frames are echoed as raw bytes, so read them back below the client.
    let raw = ws.get_mut();
    raw.write_all(b"raw").await.unwrap();
    let mut echoed = [0u8; 3];
    raw.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"raw");

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_closes_upgraded_connections() {
    let mut config = ServerConfig::default();
    config.timeouts.shutdown_grace_secs = 5;
    let server = start_server(config).await;

    let request = raw_request("GET", "/", &upgrade_headers("13"));
    let (mut stream, response) = send_request(server.addr, &request).await;
    assert_eq!(response.status, 101);

    server.shutdown.trigger();
    assert!(read_to_close(&mut stream).await.is_empty());

    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_idle_timeout_closes_upgraded_connection() {
    let mut config = ServerConfig::default();
    config.timeouts.idle_secs = 1;
    let server = start_server(config).await;

    let request = raw_request("GET", "/", &upgrade_headers("13"));
    let (mut stream, response) = send_request(server.addr, &request).await;
    assert_eq!(response.status, 101);

    assert!(read_to_close(&mut stream).await.is_empty());

    server.shutdown.trigger();
}

#[tokio::test]
async fn test_non_ascii_header_values_accepted() {
    let server = start_server(ServerConfig::default()).await;

    let headers: Vec<_> = upgrade_headers("13")
        .into_iter()
        .map(|(name, value)| if name == "Host" { (name, "hé") } else { (name, value) })
        .collect();
    let request = raw_request("GET", "/", &headers);
    let (_stream, response) = send_request(server.addr, &request).await;
    assert_eq!(response.status, 101);
    assert_eq!(response.header("sec-websocket-accept"), Some(SAMPLE_ACCEPT));

    server.shutdown.trigger();
}
