use std::net::SocketAddr;
use std::time::Duration;

use techdetective::{ConfigManager, FetchError, HttpFetcher, PageFetcher, TechDetector};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const LANDING: &str = r#"<html><head><script src="https://code.jquery.com/jquery-3.6.0.min.js"></script></head></html>"#;

fn response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut raw = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n", status, body.len());
    for (name, value) in headers {
        raw.push_str(&format!("{}: {}\r\n", name, value));
    }
    raw.push_str("\r\n");
    raw.push_str(body);
    raw
}

/// 进程内 HTTP/1.1 服务，按路径返回预置响应
async fn spawn_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

                let reply = match path.as_str() {
                    "/loop" => response("302 Found", &[("Location", "/loop")], ""),
                    "/start" => response("301 Moved Permanently", &[("Location", "landing")], ""),
                    "/absolute" => {
                        let location = format!("http://{}/landing", addr);
                        response("302 Found", &[("Location", location.as_str())], "")
                    }
                    "/landing" => response(
                        "200 OK",
                        &[("Server", "nginx/1.18.0"), ("Content-Type", "text/html")],
                        LANDING,
                    ),
                    "/stall" => {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        response("200 OK", &[], "late")
                    }
                    _ => response("404 Not Found", &[], "missing"),
                };
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

fn config(timeout: u64) -> techdetective::ScanConfig {
    ConfigManager::custom()
        .http_timeout(timeout)
        .system_proxy(false)
        .build()
}

fn fetcher(timeout: u64) -> HttpFetcher {
    HttpFetcher::new(&config(timeout)).unwrap()
}

#[tokio::test]
async fn follows_relative_redirect() {
    let addr = spawn_server().await;
    let page = fetcher(5)
        .fetch(&format!("http://{}/start", addr), 5)
        .await
        .unwrap();

    assert_eq!(page.final_url, format!("http://{}/landing", addr));
    assert_eq!(page.body, LANDING);
    assert_eq!(page.headers.get("server").map(String::as_str), Some("nginx/1.18.0"));
}

#[tokio::test]
async fn follows_absolute_redirect() {
    let addr = spawn_server().await;
    let page = fetcher(5)
        .fetch(&format!("http://{}/absolute", addr), 1)
        .await
        .unwrap();
    assert_eq!(page.final_url, format!("http://{}/landing", addr));
}

#[tokio::test]
async fn redirect_loop_hits_limit() {
    let addr = spawn_server().await;
    let err = fetcher(5)
        .fetch(&format!("http://{}/loop", addr), 3)
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::TooManyRedirects { limit: 3 });

    // 上限为 0 时任何重定向都失败
    let err = fetcher(5)
        .fetch(&format!("http://{}/start", addr), 0)
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::TooManyRedirects { limit: 0 });
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let addr = spawn_server().await;
    let err = fetcher(5)
        .fetch(&format!("http://{}/missing", addr), 5)
        .await
        .unwrap_err();
    match err {
        FetchError::Status { status, url } => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/missing"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn stalled_server_times_out() {
    let addr = spawn_server().await;
    let err = fetcher(1)
        .fetch(&format!("http://{}/stall", addr), 5)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout(_)), "{:?}", err);
}

#[tokio::test]
async fn refused_connection_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = fetcher(5)
        .fetch(&format!("http://{}/", addr), 5)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)), "{:?}", err);
}

#[tokio::test]
async fn scan_end_to_end() {
    let addr = spawn_server().await;
    let detector = TechDetector::new(config(5))
        .await
        .unwrap();
    let url = format!("http://{}/start", addr);
    let report = detector.scan(&url).await.unwrap();

    assert!(report.success);
    assert_eq!(report.url, url);
    let (category, nginx) = report.technologies.find("Nginx").unwrap();
    assert_eq!(category, "server");
    assert_eq!(nginx.confidence, 90);
    let (_, jquery) = report.technologies.find("jQuery").unwrap();
    assert_eq!(jquery.version.as_deref(), Some("jQuery 3.x"));
    assert_eq!(jquery.confidence, 72);
}
