//! HTTP client for the Patron backend
//!
//! Thin reqwest wrapper that owns the bearer token. The token lives in
//! a `SecretString` and is only ever exposed to build the Authorization
//! header; it never appears in logs or error messages.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::protocol::{self, AuthSession, BillingStatus, RemoteProfile};

/// Client handle for backend operations
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<SecretString>>,
}

impl ApiClient {
    /// Create a client for the given base URL
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = base_url.trim().trim_end_matches('/').to_string();
        if base.is_empty() {
            return Err(Error::BaseUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: base,
                token: RwLock::new(None),
            }),
        })
    }

    /// Attach a bearer token to all subsequent requests
    pub fn set_token(&self, token: &str) {
        *self.inner.token.write().unwrap() = Some(SecretString::from(token.to_string()));
    }

    /// Detach the bearer token
    pub fn clear_token(&self) {
        *self.inner.token.write().unwrap() = None;
    }

    /// True when a bearer token is attached
    pub fn has_token(&self) -> bool {
        self.inner.token.read().unwrap().is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self.inner.token.read().unwrap();
        match token.as_ref() {
            Some(secret) => request.bearer_auth(secret.expose_secret()),
            None => request,
        }
    }

    async fn get_value(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let request = self.authorize(self.inner.http.get(self.url(path)).query(query));
        Self::handle_response(request.send().await?).await
    }

    async fn post_value(&self, path: &str, body: &Value) -> Result<Value> {
        let request = self.authorize(self.inner.http.post(self.url(path)).json(body));
        Self::handle_response(request.send().await?).await
    }

    async fn handle_response(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: protocol::error_message(&body, status.as_u16()),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Authenticate with email + password
    #[instrument(skip_all, fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let body = json!({ "email": email, "password": password });
        let value = self.post_value("/auth/login", &body).await?;
        protocol::decode_auth(&value)
    }

    /// Register a new account
    #[instrument(skip_all, fields(email = %email))]
    pub async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession> {
        let body = json!({ "fullName": full_name, "email": email, "password": password });
        let value = self.post_value("/auth/register", &body).await?;
        protocol::decode_auth(&value)
    }

    /// Fetch the backend's authoritative profile record
    pub async fn fetch_me(&self, email: &str) -> Result<RemoteProfile> {
        let value = self.get_value("/users/me", &[("email", email)]).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Request an account email change
    #[instrument(skip_all)]
    pub async fn change_email(
        &self,
        current_email: &str,
        new_email: &str,
        password: &str,
    ) -> Result<()> {
        let body = json!({
            "currentEmail": current_email,
            "newEmail": new_email,
            "password": password,
        });
        self.post_value("/auth/change-email", &body).await?;
        Ok(())
    }

    /// Fetch the billing status of the signed-in account
    pub async fn billing_status(&self) -> Result<BillingStatus> {
        let value = self.get_value("/billing/status", &[]).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Start a checkout session, returning the payment redirect URL
    pub async fn checkout(&self, email: &str, return_to: &str) -> Result<String> {
        let body = json!({ "email": email, "returnTo": return_to });
        let value = self.post_value("/billing/checkout", &body).await?;
        protocol::decode_checkout_url(&value)
    }

    /// Unread message count for an account
    pub async fn unread_count(&self, email: &str) -> Result<u64> {
        let value = self
            .get_value("/messages/unread-count", &[("userEmail", email)])
            .await?;
        let count = protocol::decode_count(&value);
        debug!(count, "Unread count");
        Ok(count)
    }

    /// Pending connection request count for an account
    pub async fn pending_connections(&self, email: &str) -> Result<u64> {
        let value = self
            .get_value("/connections/pending/count", &[("email", email)])
            .await?;
        Ok(protocol::decode_count(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response, returning the base URL
    /// and a handle resolving to the raw request that was received.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let mut request = String::new();
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.push_str(&String::from_utf8_lossy(&buf[..n]));

                // read headers plus however much body they promise
                if let Some(pos) = request.find("\r\n\r\n") {
                    let content_length = request[..pos]
                        .to_lowercase()
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= pos + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len(),
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            request
        });

        (format!("http://{addr}"), handle)
    }

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_bearer_token_attached_to_requests() {
        let (base, handle) = serve_once("200 OK", "7").await;

        let api = client(&base);
        api.set_token("abc123");

        let count = api.unread_count("jane@acme.com").await.unwrap();
        assert_eq!(count, 7);

        let request = handle.await.unwrap().to_lowercase();
        assert!(request.contains("authorization: bearer abc123"));
        assert!(request.contains("useremail=jane%40acme.com"));
    }

    #[tokio::test]
    async fn test_no_header_without_token() {
        let (base, handle) = serve_once("200 OK", r#"{"count":2}"#).await;

        let api = client(&base);
        let count = api.pending_connections("jane@acme.com").await.unwrap();
        assert_eq!(count, 2);

        let request = handle.await.unwrap().to_lowercase();
        assert!(!request.contains("authorization:"));
    }

    #[tokio::test]
    async fn test_api_error_carries_backend_message() {
        let (base, _handle) =
            serve_once("402 Payment Required", r#"{"message":"Subscription required"}"#).await;

        let err = client(&base).billing_status().await.unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 402);
                assert_eq!(message, "Subscription required");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_decodes_auth_session() {
        let (base, handle) = serve_once(
            "200 OK",
            r#"{"accessToken":"abc123","user":{"id":7,"email":"jane@acme.com"}}"#,
        )
        .await;

        let auth = client(&base).login("jane@acme.com", "pw").await.unwrap();
        assert_eq!(auth.token, "abc123");
        assert_eq!(auth.user.unwrap().id, Some(7));

        let request = handle.await.unwrap();
        assert!(request.starts_with("POST /auth/login"));
    }

    #[tokio::test]
    async fn test_login_without_token_fails() {
        let (base, _handle) = serve_once("200 OK", r#"{"user":{"id":7}}"#).await;

        let err = client(&base).login("jane@acme.com", "pw").await.unwrap_err();
        assert!(matches!(err, Error::MissingToken));
    }

    #[tokio::test]
    async fn test_transport_failure_is_an_http_error() {
        // nothing listens on port 1
        let api = ApiClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let err = api.billing_status().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
