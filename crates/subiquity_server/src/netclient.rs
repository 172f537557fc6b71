//! The generated client running in reverse (spec.md §4.3 "Subscription
//! fan-out"). A subscriber hands the server a Unix-domain socket path at
//! `PUT /network/subscription`; the server dials that same socket back to
//! deliver each `NetEventApi` callback, the same wire shape a normal client
//! would use to call the server.

use std::time::Duration;

use log::warn;
use subiquity_core::events::{
    ApplyErrorEvent, ApplyStartingEvent, ApplyStoppingEvent, NetEventApi, RouteWatchEvent,
    UpdateLinkEvent,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

pub struct HttpNetEventClient {
    socket_path: String,
}

impl HttpNetEventClient {
    pub fn new(socket_path: String) -> Self {
        Self { socket_path }
    }

    async fn post(&self, path: &str, body: &serde_json::Value) {
        let body = serde_json::to_vec(body).expect("event payloads always serialize");
        let request = format!(
            "POST {path} HTTP/1.1\r\n\
             Host: localhost\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {len}\r\n\
             Connection: close\r\n\r\n",
            len = body.len()
        );

        let attempt = async {
            let mut stream = UnixStream::connect(&self.socket_path).await?;
            stream.write_all(request.as_bytes()).await?;
            stream.write_all(&body).await?;
            let mut discard = Vec::new();
            let _ = stream.read_to_end(&mut discard).await;
            Ok::<(), std::io::Error>(())
        };

        // A slow or dead subscriber must never block the event producer
        // (spec.md §5), so delivery is bounded and its failure is logged,
        // not propagated.
        if let Err(e) = timeout(Duration::from_secs(2), attempt)
            .await
            .unwrap_or_else(|_| Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out")))
        {
            warn!(
                "subscriber at {} failed to receive {path}: {e}",
                self.socket_path
            );
        }
    }
}

#[async_trait::async_trait]
impl NetEventApi for HttpNetEventClient {
    async fn update_link(&self, event: UpdateLinkEvent) {
        self.post(
            "/update_link",
            &serde_json::to_value(&event).expect("UpdateLinkEvent always serializes"),
        )
        .await;
    }

    async fn route_watch(&self, event: RouteWatchEvent) {
        self.post(
            "/route_watch",
            &serde_json::to_value(&event).expect("RouteWatchEvent always serializes"),
        )
        .await;
    }

    async fn apply_starting(&self, event: ApplyStartingEvent) {
        self.post(
            "/apply_starting",
            &serde_json::to_value(&event).expect("ApplyStartingEvent always serializes"),
        )
        .await;
    }

    async fn apply_stopping(&self, event: ApplyStoppingEvent) {
        self.post(
            "/apply_stopping",
            &serde_json::to_value(&event).expect("ApplyStoppingEvent always serializes"),
        )
        .await;
    }

    async fn apply_error(&self, event: ApplyErrorEvent) {
        self.post(
            "/apply_error",
            &serde_json::to_value(&event).expect("ApplyErrorEvent always serializes"),
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    #[tokio::test]
    async fn update_link_posts_to_the_subscriber_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("subscriber.socket");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
                .await
                .unwrap();
            request
        });

        let client = HttpNetEventClient::new(socket_path.display().to_string());
        client
            .update_link(UpdateLinkEvent {
                act: subiquity_core::types::LinkAction::NEW,
                info: subiquity_core::types::NetDevInfo {
                    name: "eth0".to_string(),
                    typ: "ethernet".to_string(),
                    is_connected: true,
                    addresses: vec![],
                },
            })
            .await;

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /update_link HTTP/1.1"));
        assert!(request.contains("\"eth0\""));
    }

    #[tokio::test]
    async fn delivery_to_a_dead_subscriber_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("nobody-listening.socket");

        let client = HttpNetEventClient::new(socket_path.display().to_string());
        client.apply_starting(ApplyStartingEvent::default()).await;
    }
}
