use anyhow::{Result, anyhow};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use shopchat::ChatMessage;
use shopchat::ChatRequest;
use shopchat::gate::{API_KEY_HEADER, Envelope, TokenData};
use tracing::{debug, warn};

/// A message as received. Types this client does not know are kept raw so
/// they can be shown as a placeholder instead of failing the whole reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
    Known(ChatMessage),
    Unknown(serde_json::Value),
}

#[derive(Deserialize)]
struct Reply {
    messages: Vec<Incoming>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    details: Option<String>,
}

pub struct Wire {
    client: Client,
    base: String,
    api_key: Option<String>,
    token: Option<String>,
}

impl Wire {
    pub fn new(base: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base: base.trim_end_matches('/').to_string(),
            api_key,
            token: None,
        }
    }

    /// Trade the API key for a bearer token. A no-op without a key.
    pub async fn authenticate(&mut self) -> Result<()> {
        let Some(api_key) = &self.api_key else {
            return Ok(());
        };
        let response = self
            .client
            .post(format!("{}/api/token", self.base))
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;

        let status = response.status();
        let envelope: Envelope<TokenData> = response.json().await?;
        match envelope.data {
            Some(data) if status.is_success() => {
                debug!("Obtained chat token");
                self.token = Some(data.token);
                Ok(())
            }
            _ => Err(anyhow!(
                "token request failed ({}): {}",
                status,
                envelope.error.unwrap_or_else(|| "unknown error".to_string())
            )),
        }
    }

    pub async fn init(&mut self) -> Result<Vec<Incoming>> {
        self.exchange(None).await
    }

    pub async fn send(&mut self, request: &ChatRequest) -> Result<Vec<Incoming>> {
        self.exchange(Some(request)).await
    }

    /// One round trip. A 401 while holding an API key re-authenticates and
    /// retries once, since tokens are short-lived.
    async fn exchange(&mut self, body: Option<&ChatRequest>) -> Result<Vec<Incoming>> {
        let first = self.build(body).send().await?;
        let response = if first.status() == StatusCode::UNAUTHORIZED && self.api_key.is_some() {
            warn!("Token rejected, re-authenticating");
            self.authenticate().await?;
            self.build(body).send().await?
        } else {
            first
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorBody>(&text) {
                Ok(ErrorBody {
                    error: Some(error),
                    details,
                }) => match details {
                    Some(details) => format!("{} ({})", error, details),
                    None => error,
                },
                _ => text,
            };
            return Err(anyhow!("server error ({}): {}", status, message));
        }

        let reply: Reply = response.json().await?;
        Ok(reply.messages)
    }

    fn build(&self, body: Option<&ChatRequest>) -> RequestBuilder {
        let builder = match body {
            Some(request) => self
                .client
                .post(format!("{}/api/chat/message", self.base))
                .json(request),
            None => self.client.get(format!("{}/api/chat/init", self.base)),
        };
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}
