//! Local HTTP server capturing webhook posts.
//!
//! Accepts any number of connections, answers every request with the
//! configured status and forwards the parsed JSON body to the test.

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Running capture server.
pub struct WebhookCapture {
    url: String,
    rx: mpsc::UnboundedReceiver<Value>,
    handle: JoinHandle<()>,
}

#[allow(dead_code)]
impl WebhookCapture {
    /// Start a server answering `200 OK`.
    pub async fn start() -> Self {
        Self::with_status(200).await
    }

    /// Start a server answering with `status`.
    pub async fn with_status(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind webhook listener");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(body) = serve(stream, status).await {
                        let _ = tx.send(body);
                    }
                });
            }
        });

        Self {
            url: format!("http://{addr}/services/T000/B000/SECRET"),
            rx,
            handle,
        }
    }

    /// Webhook URL pointing at this server.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait up to `timeout` for the next posted body.
    pub async fn next(&mut self, timeout: Duration) -> Option<Value> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Drain every body received so far.
    pub fn drain(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(body) = self.rx.try_recv() {
            out.push(body);
        }
        out
    }
}

impl Drop for WebhookCapture {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, status: u16) -> Option<Value> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let response = format!("HTTP/1.1 {status} TEST\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok");
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;

    let end = (header_end + content_length).min(buf.len());
    serde_json::from_slice(&buf[header_end..end]).ok()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
