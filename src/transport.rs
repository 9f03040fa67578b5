//! Request function the list views fetch through
//!
//! Controllers receive a [`Transport`] instead of reaching for a global HTTP
//! client, so tests can hand them an in-memory fake.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::auth::TokenStore;
use crate::config::Config;
use crate::errors::FetchError;

#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` with the given query parameters and return the decoded JSON body.
    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value, FetchError>;
}

/// Called after a 401 response has cleared the stored credentials.
pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

/// Shared reqwest client that authenticates every request with the stored token.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    tokens: TokenStore,
    on_unauthorized: Option<UnauthorizedHook>,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(&config.http.user_agent)
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self::with_client(client, TokenStore::new(&config.token_path)))
    }

    pub fn with_client(client: Client, tokens: TokenStore) -> Self {
        Self {
            client,
            tokens,
            on_unauthorized: None,
        }
    }

    /// Where to send the user once the session is rejected
    pub fn on_unauthorized(mut self, hook: UnauthorizedHook) -> Self {
        self.on_unauthorized = Some(hook);
        self
    }

    fn handle_unauthorized(&self) {
        warn!("Session rejected by server, clearing stored token");
        if let Err(e) = self.tokens.clear() {
            error!("Failed to clear stored token: {}", e);
        }
        if let Some(hook) = &self.on_unauthorized {
            hook();
        }
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("tokens", &self.tokens)
            .field("on_unauthorized", &self.on_unauthorized.is_some())
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value, FetchError> {
        debug!("GET {} {:?}", url, params);

        let mut request = self.client.get(url).query(params);
        if let Some(token) = self.tokens.load() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized();
            return Err(FetchError::Unauthorized);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        match serde_json::from_slice(&body) {
            Ok(value) => Ok(value),
            Err(e) => {
                // Unreadable bodies decode to an empty page downstream
                warn!("Response from {} is not JSON: {}", url, e);
                Ok(Value::Null)
            }
        }
    }
}
