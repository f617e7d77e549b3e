use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

use crate::error::{AssistantError, Result};

#[cfg(test)]
use mockall::automock;

/// Opaque bearer credential for the Judilibre API
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<Token>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// OAuth client-credentials exchange against the PISTE gateway
pub struct PisteTokenProvider {
    client: Client,
    auth_url: String,
    client_id: String,
    client_secret: String,
}

impl PisteTokenProvider {
    pub fn new(
        auth_url: String,
        client_id: String,
        client_secret: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssistantError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            auth_url,
            client_id,
            client_secret,
        })
    }
}

#[async_trait]
impl TokenProvider for PisteTokenProvider {
    async fn fetch_token(&self) -> Result<Token> {
        tracing::info!("Requesting PISTE access token from {}", self.auth_url);

        let form = [
            ("grant_type", "client_credentials"),
            ("scope", "openid"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let response = self
            .client
            .post(&self.auth_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AssistantError::Auth(format!("Failed to reach token endpoint: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AssistantError::Auth(format!("Failed to read token response: {e}")))?;
        parse_token_response(status, &body)
    }
}

fn parse_token_response(status: StatusCode, body: &str) -> Result<Token> {
    if !status.is_success() {
        tracing::error!("Token endpoint returned {}", status);
        return Err(AssistantError::Auth(format!(
            "Token endpoint returned {status}: {body}"
        )));
    }
    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|e| AssistantError::Auth(format!("Invalid token response: {e}")))?;
    match parsed.access_token {
        Some(token) if !token.is_empty() => Ok(Token(token)),
        _ => Err(AssistantError::Auth(
            "Token response has no access_token".to_string(),
        )),
    }
}
