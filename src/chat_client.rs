use async_trait::async_trait;
use eyre::{Result, bail, eyre};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://ai-chat-backend-1-ld9s.onrender.com/chat";

/// Shown when a rejected request carries no usable `error` field.
pub const GENERIC_API_ERROR: &str = "API error";

/// Shown when a transport failure produced no message text of its own.
pub const GENERIC_REQUEST_ERROR: &str = "Request failed";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    reply: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// Failure of a single chat request.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The endpoint answered with a non-success status.
    #[error("{message} (status {status})")]
    Rejected { status: u16, message: String },

    /// The request never produced a usable response: connection failure,
    /// or a success body that could not be decoded.
    #[error("{0}")]
    Transport(String),
}

impl ChatError {
    /// Text surfaced to the user as the conversation's last error.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Rejected { message, .. } => message.clone(),
            ChatError::Transport(message) if message.trim().is_empty() => {
                GENERIC_REQUEST_ERROR.to_string()
            }
            ChatError::Transport(message) => message.clone(),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Transport(err.to_string())
    }
}

/// The outbound side of a conversation: one message in, one reply out.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `message` and return the raw reply text. An absent `reply`
    /// field comes back as an empty string.
    async fn send_message(&self, message: &str) -> Result<String, ChatError>;
}

pub struct ChatClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        let client = reqwest::Client::new();

        Ok(Self { endpoint, client })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for ChatClient {
    async fn send_message(&self, message: &str) -> Result<String, ChatError> {
        debug!(endpoint = %self.endpoint, "Sending chat request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ChatRequest { message })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Chat request failed with status {}: {}", status, body);

            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|body| body.error)
                .filter(|error| !error.is_empty())
                .unwrap_or_else(|| GENERIC_API_ERROR.to_string());

            return Err(ChatError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatReply = response.json().await?;
        debug!("Received chat reply: {:?}", body.reply);

        Ok(body.reply.unwrap_or_default())
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| eyre!("Invalid chat endpoint '{}': {}", raw, e))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => bail!("Unsupported chat endpoint scheme '{}': expected http or https", scheme),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Accepts one connection, answers it with a canned response and hands
    /// back the raw request it read.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;

            request
        });

        (format!("http://{}/chat", addr), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);

                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }

        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn posts_json_message_and_returns_reply() {
        let (endpoint, server) = serve_once("200 OK", r#"{"reply":"Hello"}"#).await;
        let client = ChatClient::new(&endpoint).unwrap();

        let reply = client.send_message("hi there").await.unwrap();
        assert_eq!(reply, "Hello");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /chat HTTP/1.1"));
        assert!(request.to_lowercase().contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"message":"hi there"}"#));
    }

    #[tokio::test]
    async fn missing_reply_field_yields_empty_text() {
        let (endpoint, server) = serve_once("200 OK", "{}").await;
        let client = ChatClient::new(&endpoint).unwrap();

        assert_eq!(client.send_message("hi").await.unwrap(), "");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn rejection_uses_error_field() {
        let (endpoint, server) = serve_once("400 Bad Request", r#"{"error":"bad input"}"#).await;
        let client = ChatClient::new(&endpoint).unwrap();

        let err = client.send_message("hi").await.unwrap_err();
        match &err {
            ChatError::Rejected { status, message } => {
                assert_eq!(*status, 400);
                assert_eq!(message, "bad input");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(err.user_message(), "bad input");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn rejection_without_error_body_falls_back() {
        let (endpoint, server) = serve_once("500 Internal Server Error", "<html>oops</html>").await;
        let client = ChatClient::new(&endpoint).unwrap();

        let err = client.send_message("hi").await.unwrap_err();
        assert_eq!(err.user_message(), GENERIC_API_ERROR);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn rejection_with_empty_error_field_falls_back() {
        let (endpoint, server) = serve_once("502 Bad Gateway", r#"{"error":""}"#).await;
        let client = ChatClient::new(&endpoint).unwrap();

        let err = client.send_message("hi").await.unwrap_err();
        assert_eq!(err.user_message(), GENERIC_API_ERROR);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_success_body_is_a_transport_failure() {
        let (endpoint, server) = serve_once("200 OK", "not json").await;
        let client = ChatClient::new(&endpoint).unwrap();

        let err = client.send_message("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::Transport(_)));
        assert!(!err.user_message().is_empty());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ChatClient::new(&format!("http://{}/chat", addr)).unwrap();
        let err = client.send_message("hi").await.unwrap_err();

        assert!(matches!(err, ChatError::Transport(_)));
        assert!(!err.user_message().trim().is_empty());
    }

    #[test]
    fn blank_transport_message_uses_generic_text() {
        let err = ChatError::Transport("  ".to_string());
        assert_eq!(err.user_message(), GENERIC_REQUEST_ERROR);
    }

    #[test]
    fn endpoint_must_be_http_url() {
        assert!(ChatClient::new("not a url").is_err());
        assert!(ChatClient::new("ftp://example.com/chat").is_err());

        let client = ChatClient::new(DEFAULT_ENDPOINT).unwrap();
        assert_eq!(client.endpoint().as_str(), DEFAULT_ENDPOINT);
    }
}
