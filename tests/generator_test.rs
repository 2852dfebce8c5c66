//! HTTP generator against a one-shot local listener.

use genq::error::Error;
use genq::generator::{HttpImageGenerator, ImageGenerator};
use genq::model::GenerationRequest;
use secrecy::SecretString;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accept one connection, answer with `status` and `body`, and hand back
/// the raw request text.
async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let len = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&buf).to_string()
    });

    (format!("http://{addr}/generate"), handle)
}

fn request() -> GenerationRequest {
    GenerationRequest {
        subject_id: "q-42".to_string(),
        text_content: "Name the largest moon of Saturn.".to_string(),
        area_label: "astronomy".to_string(),
        topic_label: "moons".to_string(),
        dataset_name: "questions".to_string(),
    }
}

#[tokio::test]
async fn success_returns_artifact_url() {
    let (url, server) = serve_once("200 OK", r#"{"imageUrl":"https://cdn.test/q-42.png"}"#).await;
    let generator = HttpImageGenerator::new(
        url,
        Some(SecretString::from("sk-test")),
        Some(Duration::from_secs(5)),
    )
    .unwrap();

    let artifact = generator.generate(&request()).await.unwrap();
    assert_eq!(artifact.0, "https://cdn.test/q-42.png");

    let raw = server.await.unwrap();
    assert!(raw.starts_with("POST /generate"));
    assert!(raw.to_lowercase().contains("authorization: bearer sk-test"));
    assert!(raw.contains(r#""subjectId":"q-42""#));
    assert!(raw.contains(r#""datasetName":"questions""#));
}

#[tokio::test]
async fn error_body_is_a_generation_failure() {
    let (url, server) = serve_once("200 OK", r#"{"error":"quota exhausted"}"#).await;
    let generator = HttpImageGenerator::new(url, None, None).unwrap();

    let result = generator.generate(&request()).await;
    assert!(matches!(result, Err(Error::Generation(ref m)) if m == "quota exhausted"));

    let raw = server.await.unwrap();
    assert!(!raw.to_lowercase().contains("authorization:"));
}

#[tokio::test]
async fn non_success_status_is_a_generation_failure() {
    let (url, server) = serve_once("429 Too Many Requests", r#"{"error":"slow down"}"#).await;
    let generator = HttpImageGenerator::new(url, None, None).unwrap();

    match generator.generate(&request()).await {
        Err(Error::Generation(message)) => {
            assert!(message.contains("429"));
            assert!(message.contains("slow down"));
        }
        other => panic!("expected generation failure, got {other:?}"),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn missing_fields_are_a_generation_failure() {
    let (url, server) = serve_once("200 OK", "{}").await;
    let generator = HttpImageGenerator::new(url, None, None).unwrap();

    assert!(matches!(
        generator.generate(&request()).await,
        Err(Error::Generation(_))
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn malformed_success_body_is_a_json_error() {
    let (url, server) = serve_once("200 OK", "<html>gateway</html>").await;
    let generator = HttpImageGenerator::new(url, None, None).unwrap();

    assert!(matches!(
        generator.generate(&request()).await,
        Err(Error::Json(_))
    ));
    server.await.unwrap();
}
