use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use vidrust::config::{Settings, Source};
use vidrust::error::{ErrorKind, FetchFailure};
use vidrust::{CatalogExtractor, HttpFetcher, PageFetcher, PageRequest, StreamResolver};

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serves one connection with a canned response and hands back the raw request.
async fn serve_once(response: String) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        let _ = tx.send(request);
    });

    (origin, rx)
}

/// Accepts one connection and never answers it.
async fn serve_silence() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _ = read_request(&mut stream).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(stream);
    });

    origin
}

// Loopback traffic must not be routed through a proxy from the environment.
fn local_fetcher(timeout: Duration) -> HttpFetcher {
    HttpFetcher::from_builder(HttpFetcher::client_builder(timeout).no_proxy(), timeout).unwrap()
}

fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\ncontent-type: text/html\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

fn settings_for(origin: &str) -> Arc<Settings> {
    Arc::new(Settings {
        origin: origin.to_string(),
        sources: vec![Source::new("video1", "Latest Videos", &format!("{origin}/page/{{page}}/"))],
        ..Settings::default()
    })
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let (origin, _) = serve_once(http_response("503 Service Unavailable", "")).await;
    let fetcher = local_fetcher(Duration::from_secs(5));

    let result = fetcher
        .fetch(&PageRequest::listing(format!("{origin}/page/1/"), format!("{origin}/page/1/")))
        .await;
    assert_eq!(result, Err(FetchFailure::Status(503)));
}

#[tokio::test]
async fn success_returns_body_and_sends_browser_headers() {
    let (origin, request) = serve_once(http_response("200 OK", "<html>ok</html>")).await;
    let fetcher = local_fetcher(Duration::from_secs(5));

    let body = fetcher
        .fetch(&PageRequest::listing(format!("{origin}/page/2/"), format!("{origin}/page/1/")))
        .await
        .unwrap();
    assert_eq!(body, "<html>ok</html>");

    let request = request.await.unwrap().to_ascii_lowercase();
    assert!(request.starts_with("get /page/2/ "), "{request}");
    assert!(request.contains(&format!("referer: {origin}/page/1/")), "{request}");
    assert!(request.contains("user-agent: mozilla/5.0 (linux; android 10"), "{request}");
    assert!(request.contains("accept-language: en-us,en;q=0.9"), "{request}");
}

#[tokio::test]
async fn silent_upstream_times_out() {
    let origin = serve_silence().await;
    let fetcher = local_fetcher(Duration::from_millis(300));

    let result = fetcher
        .fetch(&PageRequest::document(format!("{origin}/slow/"), format!("{origin}/")))
        .await;
    assert_eq!(result, Err(FetchFailure::Timeout));
}

#[tokio::test]
async fn catalog_surfaces_upstream_status() {
    let (origin, _) = serve_once(http_response("403 Forbidden", "blocked")).await;
    let settings = settings_for(&origin);
    let fetcher = Arc::new(local_fetcher(Duration::from_secs(5)));
    let catalog = CatalogExtractor::new(fetcher, settings).unwrap();

    let err = catalog.list_videos("video1", 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamFetchError);
    assert_eq!(err.status_code(), Some(403));
}

#[tokio::test]
async fn resolver_surfaces_timeout() {
    let origin = serve_silence().await;
    let settings = settings_for(&origin);
    let fetcher = Arc::new(local_fetcher(Duration::from_millis(300)));
    let resolver = StreamResolver::new(fetcher, settings);

    let err = resolver
        .resolve_stream(&format!("{origin}/some-video/"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamFetchError);
    assert!(err.is_timeout());
    assert_eq!(err.status_code(), None);
}
