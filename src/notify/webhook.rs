//! HTTP mail relay notifier.
//!
//! Posts a JSON document `{from, to, subject, body}` to the configured relay
//! endpoint. Any 2xx response counts as delivered.

use super::{MessageTemplate, Notifier, NotifyError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Notifier that hands messages to an HTTP mail relay.
pub struct WebhookNotifier {
    url: String,
    auth_token: Option<String>,
    template: MessageTemplate,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(
        url: String,
        auth_token: Option<String>,
        template: MessageTemplate,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("admitd/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            url,
            auth_token,
            template,
            http_client,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, to: &str, token: &str, username: &str) -> Result<(), NotifyError> {
        let message = self.template.render(username, token);
        let payload = RelayRequest {
            from: &message.from,
            to,
            subject: &message.subject,
            body: &message.body,
        };

        let mut request = self.http_client.post(&self.url).json(&payload);
        if let Some(ref auth_token) = self.auth_token {
            request = request.bearer_auth(auth_token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        debug!(to = %to, username = %username, status = %status, "Relay accepted message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// One-shot HTTP server answering with `status` and returning the raw request.
    async fn relay(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let mut request = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}/send"), handle)
    }

    fn notifier(url: String, auth_token: Option<String>) -> WebhookNotifier {
        WebhookNotifier::new(
            url,
            auth_token,
            MessageTemplate::new("Verifier <v@x.com>", "Verify", "!"),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn posts_message_to_relay() {
        let (url, server) = relay("200 OK").await;
        notifier(url, Some("secret".to_string()))
            .deliver("a@x.com", "abc123", "ann")
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /send"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["to"], "a@x.com");
        assert_eq!(json["subject"], "Verify");
        assert!(json["body"].as_str().unwrap().contains("!verify ann abc123"));
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let (url, server) = relay("503 Service Unavailable").await;
        let err = notifier(url, None)
            .deliver("a@x.com", "abc123", "ann")
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(503)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_relay_is_http_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = notifier(format!("http://{addr}/send"), None)
            .deliver("a@x.com", "abc123", "ann")
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Http(_)));
    }
}
