use std::net::SocketAddr;
use std::time::Duration;

use asel_select::{FetchError, FetchRequest, HttpFetcher, OptionFetcher};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;

async fn start_test_server(
    status_line: &'static str,
    body: &'static str,
    delay: Option<Duration>,
) -> (SocketAddr, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (head_tx, head_rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await.unwrap_or(0);
            let _ = head_tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
        }
    });
    (addr, head_rx)
}

async fn loopback_available() -> bool {
    TcpListener::bind("127.0.0.1:0").await.is_ok()
}

fn request(addr: SocketAddr, path: &str) -> FetchRequest {
    FetchRequest {
        url: Url::parse(&format!("http://{addr}{path}")).unwrap(),
        query: Vec::new(),
        headers: Vec::new(),
    }
}

#[tokio::test]
async fn sends_query_and_headers_and_parses_json() {
    if !loopback_available().await {
        eprintln!("skipping sends_query_and_headers_and_parses_json: loopback bind not permitted");
        return;
    }
    let (addr, head) = start_test_server("200 OK", r#"{"data":[{"id":1,"name":"Alice"}]}"#, None).await;
    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();

    let mut req = request(addr, "/api/users?active=1");
    req.query = vec![
        ("search".into(), "al".into()),
        ("page".into(), "1".into()),
    ];
    req.headers = vec![("X-Tenant".into(), "acme".into())];
    let response = fetcher.get(req).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, json!({"data": [{"id": 1, "name": "Alice"}]}));

    let head = head.await.unwrap().to_ascii_lowercase();
    assert!(
        head.starts_with("get /api/users?active=1&search=al&page=1 http/1.1"),
        "{head}"
    );
    assert!(head.contains("x-tenant: acme"));
    assert!(head.contains("accept: application/json"));
}

#[tokio::test]
async fn error_status_is_returned_without_body() {
    if !loopback_available().await {
        eprintln!("skipping error_status_is_returned_without_body: loopback bind not permitted");
        return;
    }
    let (addr, _head) = start_test_server("500 Internal Server Error", r#"{"message":"boom"}"#, None).await;
    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();

    let response = fetcher.get(request(addr, "/api/users")).await.unwrap();
    assert_eq!(response.status, 500);
    assert!(!response.is_success());
    assert!(response.body.is_null());
}

#[tokio::test]
async fn non_json_success_body_becomes_null() {
    if !loopback_available().await {
        eprintln!("skipping non_json_success_body_becomes_null: loopback bind not permitted");
        return;
    }
    let (addr, _head) = start_test_server("200 OK", "<html>oops</html>", None).await;
    let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();

    let response = fetcher.get(request(addr, "/")).await.unwrap();
    assert!(response.is_success());
    assert!(response.body.is_null());
}

#[tokio::test]
async fn slow_server_times_out() {
    if !loopback_available().await {
        eprintln!("skipping slow_server_times_out: loopback bind not permitted");
        return;
    }
    let (addr, _head) = start_test_server("200 OK", "[]", Some(Duration::from_millis(500))).await;
    let fetcher = HttpFetcher::new(Duration::from_millis(50)).unwrap();

    let err = fetcher.get(request(addr, "/")).await.unwrap_err();
    assert_eq!(err, FetchError::Timeout);
}

#[tokio::test]
async fn invalid_header_is_rejected_before_sending() {
    let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();
    let mut req = request("127.0.0.1:9".parse().unwrap(), "/");
    req.headers = vec![("Bad Header".into(), "x".into())];

    let err = fetcher.get(req).await.unwrap_err();
    assert!(matches!(err, FetchError::InvalidHeader(_)));
}
