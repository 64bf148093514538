//! Request counting against a local server that always answers 503.

use bridge_desktop::ReqwestHttpClient;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const UNAVAILABLE: &[u8] =
    b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Read one request: headers, then as many body bytes as Content-Length says.
async fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

async fn unavailable_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let counter = counter.clone();
            tokio::spawn(async move {
                read_request(&mut stream).await;
                counter.fetch_add(1, Ordering::SeqCst);
                stream.write_all(UNAVAILABLE).await.ok();
                stream.shutdown().await.ok();
            });
        }
    });

    (format!("http://{}/youtube/v3/playlists", addr), hits)
}

fn insert_request(url: &str) -> HttpRequest {
    HttpRequest::new(HttpMethod::Post, url.to_string())
        .header("Content-Type", "application/json")
        .body(Bytes::from_static(br#"{"snippet":{"title":"trip"}}"#))
}

#[tokio::test]
async fn execute_sends_a_single_request_on_server_error() {
    let (url, hits) = unavailable_server().await;
    let client = ReqwestHttpClient::new().unwrap();

    let response = client.execute(insert_request(&url)).await.unwrap();

    assert_eq!(response.status, 503);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn execute_with_retry_repeats_up_to_the_policy_limit() {
    let (url, hits) = unavailable_server().await;
    let client = ReqwestHttpClient::new().unwrap();
    let policy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        use_exponential_backoff: true,
    };

    let response = client
        .execute_with_retry(insert_request(&url), policy)
        .await
        .unwrap();

    assert_eq!(response.status, 503);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}
