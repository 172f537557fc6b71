//! Client-side half of the API-definition binder (spec.md §4.2 "client
//! binding"): a `Transport` that dials the server's Unix-domain socket
//! directly with a hand-rolled HTTP/1.1 request, shared by every process
//! that calls the server rather than being served by it.

use crate::WireError;
use crate::api::{Transport, Verb};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

pub struct UnixSocketTransport {
    socket_path: String,
}

impl UnixSocketTransport {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }
}

fn verb_str(verb: Verb) -> &'static str {
    match verb {
        Verb::Get => "GET",
        Verb::Post => "POST",
        Verb::Put => "PUT",
        Verb::Delete => "DELETE",
    }
}

fn build_query_string(query: &[(String, String)]) -> String {
    if query.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = query
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencode(v)))
        .collect();
    format!("?{}", parts.join("&"))
}

fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Splits a raw HTTP/1.1 response into its status line, headers and body,
/// reading exactly as many bytes as `Content-Length` names.
async fn read_response(stream: &mut UnixStream) -> std::io::Result<serde_json::Value> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break Some(pos + 4);
        }
    };
    let Some(header_end) = header_end else {
        return Ok(serde_json::Value::Null);
    };

    let header_text = String::from_utf8_lossy(&buf[..header_end]);
    let content_length: usize = header_text
        .lines()
        .find_map(|line| {
            line.strip_prefix("Content-Length:")
                .or_else(|| line.strip_prefix("content-length:"))
        })
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);

    while buf.len() - header_end < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = &buf[header_end..(header_end + content_length).min(buf.len())];
    if body.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[async_trait::async_trait]
impl Transport for UnixSocketTransport {
    async fn call(
        &self,
        verb: Verb,
        path: &str,
        query: &[(String, String)],
        body: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, WireError> {
        let body_bytes = match &body {
            Some(v) => serde_json::to_vec(v)?,
            None => Vec::new(),
        };
        let request = format!(
            "{method} {path}{query} HTTP/1.1\r\n\
             Host: localhost\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {len}\r\n\
             Connection: close\r\n\r\n",
            method = verb_str(verb),
            query = build_query_string(query),
            len = body_bytes.len(),
        );

        let mut stream = UnixStream::connect(&self.socket_path).await?;
        stream.write_all(request.as_bytes()).await?;
        if !body_bytes.is_empty() {
            stream.write_all(&body_bytes).await?;
        }
        let value = read_response(&mut stream).await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_string_encodes_reserved_bytes() {
        let q = build_query_string(&[("socket_path".to_string(), "/run/a b.socket".to_string())]);
        assert_eq!(q, "?socket_path=%2Frun%2Fa%20b.socket");
    }

    #[test]
    fn query_string_empty_when_no_params() {
        assert_eq!(build_query_string(&[]), "");
    }

    #[tokio::test]
    async fn call_round_trips_over_a_real_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("t.socket");
        let listener = tokio::net::UnixListener::bind(&socket_path).unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await.unwrap();
            let body = b"{\"ok\":true}";
            let response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len());
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.write_all(body).await.unwrap();
        });

        let transport = UnixSocketTransport::new(socket_path.display().to_string());
        let result = transport.call(Verb::Get, "/x", &[], None).await.unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
    }
}
