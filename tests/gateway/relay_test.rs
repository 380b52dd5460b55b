//! Relay passthrough: redirect status, body, and `Location` are not
//! reinterpreted on the way through.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use scoutgate::config::GateConfig;
use scoutgate::gateway::EngineGateway;

async fn serve_raw(raw_response: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener should expose addr");

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut read_buf = [0_u8; 2048];
            let _ = socket.read(&mut read_buf).await;
            let _ = socket.write_all(raw_response.as_bytes()).await;
        }
    });

    format!("http://{addr}")
}

fn config_for(base_url: &str) -> GateConfig {
    GateConfig {
        backend_base_url: base_url.to_owned(),
        probe_key: Some("test-probe-key".to_owned()),
        request_timeout_secs: 5,
        ..GateConfig::default()
    }
}

#[tokio::test]
async fn redirect_status_and_location_pass_through_unmodified() {
    let location = "/settings?tab=integrations&connected=outlook&email=ops%40example.com";
    let body = "Redirecting...";
    let base_url = serve_raw(format!(
        "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ))
    .await;

    let gateway = EngineGateway::new(&config_for(&base_url)).expect("gateway should build");
    let relay = gateway
        .relay("api/outlook/callback", &[("code".to_owned(), "abc123".to_owned())])
        .await
        .expect("relay should complete");

    // The redirect must not be followed, rewritten, or reinterpreted.
    assert_eq!(relay.status, 302);
    assert_eq!(relay.location.as_deref(), Some(location));
    assert_eq!(relay.body, body);
}

#[tokio::test]
async fn relay_without_redirect_keeps_plain_status() {
    let base_url = serve_raw(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 15\r\nConnection: close\r\n\r\n{\"ok\":\"stored\"}"
            .to_owned(),
    )
    .await;

    let gateway = EngineGateway::new(&config_for(&base_url)).expect("gateway should build");
    let relay = gateway
        .relay("api/gmail/callback", &[("code".to_owned(), "xyz".to_owned())])
        .await
        .expect("relay should complete");

    assert_eq!(relay.status, 200);
    assert!(relay.location.is_none());
    assert_eq!(relay.body, "{\"ok\":\"stored\"}");
}
