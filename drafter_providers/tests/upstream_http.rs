//! Integration tests for the upstream adapter against a canned HTTP server.
//!
//! These tests verify that:
//! - data frames are streamed in order and the body is read to the end
//! - non-success statuses and refused connections surface as `UpstreamUnavailable`
//! - the request carries the engine's auth and accept headers
//! - cancellation aborts a call that is still waiting on the engine

use drafter_core::protocol::{ChatParameters, ChatRequest, ResumeRequest};
use drafter_core::{GenerationBackend, ImageUploader, TurnError};
use drafter_providers::XingchenClient;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Read one HTTP request (headers plus `Content-Length` body) as text.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buf = [0_u8; 4096];
    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&raw).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let lower = line.to_ascii_lowercase();
                    lower
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);
            if raw.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&raw).to_string()
}

/// Serve a single connection with `status` and `body`, reporting the request text.
async fn serve_once(status: &'static str, body: String) -> (SocketAddr, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let _ = tx.send(request);
        let head = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n"
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(body.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    (addr, rx)
}

fn client(addr: SocketAddr) -> XingchenClient {
    XingchenClient::new(
        "key".to_string(),
        "secret".to_string(),
        Duration::from_secs(30),
    )
    .unwrap()
    .with_api_url(format!("http://{addr}/chat"))
    .with_resume_url(format!("http://{addr}/resume"))
    .with_upload_url(format!("http://{addr}/upload"))
}

fn chat_request() -> ChatRequest {
    ChatRequest {
        flow_id: "flow-1".to_string(),
        uid: "7".to_string(),
        parameters: ChatParameters {
            input: "draft a notice".to_string(),
            image: None,
        },
        stream: true,
        chat_id: Some("c1".to_string()),
        history: Vec::new(),
    }
}

#[tokio::test]
async fn test_chat_stream_yields_frames_in_order() {
    let body = concat!(
        "data: {\"code\":0,\"choices\":[{\"delta\":{\"content\":\"Notice\"}}]}\n\n",
        ": ping\n",
        "data: {\"code\":0,\"choices\":[{\"delta\":{\"content\":\" of meeting\"},\"finish_reason\":\"stop\"}]}\n\n",
    );
    let (addr, request) = serve_once("200 OK", body.to_string()).await;

    let mut frames = client(addr)
        .open_chat(&chat_request(), CancellationToken::new())
        .await
        .unwrap();

    let first = frames.next_frame().await.unwrap().unwrap();
    assert!(first.contains("\"Notice\""));
    let second = frames.next_frame().await.unwrap().unwrap();
    assert!(second.contains("finish_reason"));
    assert_eq!(frames.next_frame().await.unwrap(), None);

    let request = request.await.unwrap().to_ascii_lowercase();
    assert!(request.starts_with("post /chat "));
    assert!(request.contains("authorization: bearer key:secret"));
    assert!(request.contains("accept: text/event-stream"));
    assert!(request.contains("\"agent_user_input\":\"draft a notice\""));
}

#[tokio::test]
async fn test_resume_uses_resume_endpoint() {
    let body = "data: {\"code\":0,\"choices\":[{\"delta\":{\"content\":\"Done\"},\"finish_reason\":\"stop\"}]}\n";
    let (addr, request) = serve_once("200 OK", body.to_string()).await;

    let mut frames = client(addr)
        .open_resume(
            &ResumeRequest::resume("tok-1".to_string(), "looks good".to_string()),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(frames.next_frame().await.unwrap().is_some());

    let request = request.await.unwrap();
    assert!(request.starts_with("POST /resume "));
    assert!(request.contains("\"event_id\":\"tok-1\""));
    assert!(request.contains("\"event_type\":\"resume\""));
}

#[tokio::test]
async fn test_non_success_status_is_unavailable_with_body() {
    let (addr, _request) =
        serve_once("503 Service Unavailable", "flow is offline".to_string()).await;

    let result = client(addr)
        .open_chat(&chat_request(), CancellationToken::new())
        .await;

    match result {
        Err(TurnError::UpstreamUnavailable(msg)) => {
            assert!(msg.contains("503"));
            assert!(msg.contains("flow is offline"));
        }
        Err(other) => panic!("Expected UpstreamUnavailable, got {other}"),
        Ok(_) => panic!("Expected UpstreamUnavailable, got a stream"),
    }
}

#[tokio::test]
async fn test_refused_connection_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = client(addr)
        .open_chat(&chat_request(), CancellationToken::new())
        .await;
    assert!(matches!(result, Err(TurnError::UpstreamUnavailable(_))));
}

#[tokio::test]
async fn test_cancel_while_waiting_for_headers() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = read_request(&mut socket).await;
        // Never answer; wait for the client to hang up.
        let mut buf = [0_u8; 64];
        let n = socket.read(&mut buf).await.unwrap_or(0);
        let _ = closed_tx.send(n);
    });

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = client(addr).open_chat(&chat_request(), cancel).await;
    assert!(matches!(result, Err(TurnError::Cancelled)));

    let read = tokio::time::timeout(Duration::from_secs(5), closed_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read, 0, "connection should be closed after cancellation");
}

#[tokio::test]
async fn test_upload_image_returns_hosted_url() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("chart.png"), b"\x89PNG fake").unwrap();

    let (addr, request) = serve_once(
        "200 OK",
        r#"{"code":0,"message":"ok","data":{"url":"https://cdn.example/chart.png"}}"#.to_string(),
    )
    .await;

    let uploader = client(addr).with_upload_dir(dir.path().to_path_buf());
    let url = uploader.upload_image("chart.png").await.unwrap();
    assert_eq!(url, "https://cdn.example/chart.png");

    let request = request.await.unwrap();
    assert!(request.starts_with("POST /upload "));
    assert!(request.contains("filename=\"chart.png\""));
}

#[tokio::test]
async fn test_upload_failure_code_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("chart.jpg"), b"jpeg").unwrap();

    let (addr, _request) = serve_once(
        "200 OK",
        r#"{"code":10404,"message":"bad file"}"#.to_string(),
    )
    .await;

    let uploader = client(addr).with_upload_dir(dir.path().to_path_buf());
    let err = uploader.upload_image("chart.jpg").await.unwrap_err();
    assert!(err.to_string().contains("bad file"));
}
