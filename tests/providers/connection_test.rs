//! Connection lifecycle: authorization, idempotent disconnect, read-only
//! probing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use scoutgate::config::GateConfig;
use scoutgate::gateway::{EngineGateway, GatewayError};
use scoutgate::providers::{ConnectionManager, ConnectionState, Provider};

struct Script {
    base_url: String,
    hits: Arc<AtomicUsize>,
}

fn json_response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn redirect_response(location: &str) -> String {
    format!("HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
}

async fn serve(responses: Vec<String>) -> Script {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener should expose addr");
    let hits = Arc::new(AtomicUsize::new(0));

    let task_hits = Arc::clone(&hits);
    tokio::spawn(async move {
        for body in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut read_buf = [0_u8; 4096];
            let _ = socket.read(&mut read_buf).await;
            task_hits.fetch_add(1, Ordering::SeqCst);
            let _ = socket.write_all(body.as_bytes()).await;
        }
    });

    Script {
        base_url: format!("http://{addr}"),
        hits,
    }
}

fn manager(provider: Provider, base_url: &str) -> ConnectionManager {
    let config = GateConfig {
        backend_base_url: base_url.to_owned(),
        probe_key: Some("test-probe-key".to_owned()),
        request_timeout_secs: 5,
        ..GateConfig::default()
    };
    let gateway = Arc::new(EngineGateway::new(&config).expect("gateway should build"));
    ConnectionManager::new(provider, gateway)
}

#[tokio::test]
async fn authorization_url_moves_to_pending() {
    let script = serve(vec![json_response(
        "200 OK",
        "{\"url\":\"https://login.microsoftonline.com/authorize?client_id=x\"}",
    )])
    .await;
    let manager = manager(Provider::Outlook, &script.base_url);

    let url = manager
        .authorization_url()
        .await
        .expect("auth url should be issued");
    assert!(url.starts_with("https://login.microsoftonline.com/"));
    assert_eq!(manager.snapshot().state, ConnectionState::AuthorizationPending);
}

#[tokio::test]
async fn authorization_url_failure_keeps_state_and_detail() {
    let script = serve(vec![json_response(
        "500 Internal Server Error",
        "{\"error\":\"oauth client not configured\"}",
    )])
    .await;
    let manager = manager(Provider::Gmail, &script.base_url);

    let err = match manager.authorization_url().await {
        Ok(_) => panic!("upstream failure must surface"),
        Err(err) => err,
    };
    match err {
        GatewayError::Upstream { status, detail } => {
            assert_eq!(status, 500);
            assert_eq!(detail["error"], "oauth client not configured");
        }
        other => panic!("expected upstream error, got: {other}"),
    }
    assert_eq!(manager.snapshot().state, ConnectionState::Disconnected);
}

#[tokio::test]
async fn disconnect_twice_succeeds_both_times() {
    let script = serve(vec![
        json_response("200 OK", "{\"success\":true}"),
        json_response("200 OK", "{\"success\":true}"),
    ])
    .await;
    let manager = manager(Provider::Gmail, &script.base_url);

    assert!(manager.disconnect().await.is_ok());
    assert!(manager.disconnect().await.is_ok());
    assert_eq!(script.hits.load(Ordering::SeqCst), 2);
    assert_eq!(manager.snapshot().state, ConnectionState::Disconnected);
}

#[tokio::test]
async fn disconnect_failure_leaves_connection_untouched() {
    let script = serve(vec![
        redirect_response("/settings?connected=outlook&email=ops%40example.com"),
        json_response("502 Bad Gateway", "{\"error\":\"token store unavailable\"}"),
    ])
    .await;
    let manager = manager(Provider::Outlook, &script.base_url);

    let relay = manager
        .complete_authorization("auth-code-1")
        .await
        .expect("callback relay should complete");
    assert_eq!(relay.status, 302);
    let before = manager.snapshot();
    assert_eq!(before.state, ConnectionState::Connected);
    assert_eq!(before.account.as_deref(), Some("ops@example.com"));

    let err = manager.disconnect().await;
    assert!(matches!(err, Err(GatewayError::Upstream { status: 502, .. })));

    let after = manager.snapshot();
    assert_eq!(after.state, ConnectionState::Connected);
    assert_eq!(after.account.as_deref(), Some("ops@example.com"));
}

#[tokio::test]
async fn test_connection_is_read_only() {
    let script = serve(vec![json_response(
        "200 OK",
        "{\"status\":\"connected\",\"email\":\"ops@example.com\"}",
    )])
    .await;
    let manager = manager(Provider::Outlook, &script.base_url);

    let result = manager
        .test_connection("ops@example.com")
        .await
        .expect("probe should complete");
    assert_eq!(result.status(), 200);
    assert_eq!(result.body()["status"], "connected");

    // The probe reports; it never transitions.
    assert_eq!(manager.snapshot().state, ConnectionState::Disconnected);
}

#[tokio::test]
async fn expired_verdict_passes_through_with_status() {
    let script = serve(vec![json_response(
        "401 Unauthorized",
        "{\"status\":\"expired\",\"error\":\"refresh token revoked\"}",
    )])
    .await;
    let manager = manager(Provider::Outlook, &script.base_url);

    let result = manager
        .test_connection("ops@example.com")
        .await
        .expect("non-2xx verdict is still a completed probe");
    assert_eq!(result.status(), 401);
    assert_eq!(result.body()["status"], "expired");
    assert_eq!(manager.snapshot().state, ConnectionState::Disconnected);
}
