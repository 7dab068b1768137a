//! Short-lived bearer tokens guarding the chat routes.
//!
//! Tokens are `base64url(header).base64url(claims).base64url(hmac)` signed
//! with HMAC-SHA256. They are handed out by `POST /api/token` in exchange for
//! the public API key and checked by [`require_token`].

use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Missing bearer token")]
    Missing,

    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub api_key: String,
    pub iat: i64,
    pub exp: i64,
}

/// `{success, data?, error?, meta}` wrapper used by the token endpoint and
/// by auth failures.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub meta: Meta,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    /// Unix milliseconds.
    pub timestamp: i64,
}

impl Meta {
    fn now() -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Meta::now(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            meta: Meta::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenData {
    pub token: String,
}

pub struct Gate {
    mac: HmacSha256,
    ttl_secs: i64,
    api_key: Option<String>,
    dev_mode: bool,
}

impl Gate {
    pub fn new(
        secret: &str,
        ttl_secs: i64,
        api_key: Option<String>,
        dev_mode: bool,
    ) -> anyhow::Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow!("unusable token secret: {}", e))?;
        Ok(Self {
            mac,
            ttl_secs,
            api_key,
            dev_mode,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            &config.token_secret,
            config.token_ttl_secs,
            config.api_key.clone(),
            config.dev_mode,
        )
    }

    /// Check the key presented to `POST /api/token`. Dev mode accepts
    /// anything; otherwise the key must match the configured one, and with
    /// no key configured nobody gets in.
    pub fn check_api_key(&self, presented: Option<&str>) -> Result<String, AppError> {
        if self.dev_mode {
            return Ok(presented.unwrap_or("dev").to_string());
        }
        match (presented, self.api_key.as_deref()) {
            (Some(presented), Some(expected)) if presented == expected => {
                Ok(presented.to_string())
            }
            _ => Err(AppError::InvalidApiKey),
        }
    }

    pub fn issue(&self, api_key: &str, now_secs: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string());
        let claims = URL_SAFE_NO_PAD.encode(
            json!({
                "apiKey": api_key,
                "iat": now_secs,
                "exp": now_secs + self.ttl_secs,
            })
            .to_string(),
        );
        let signing_input = format!("{}.{}", header, claims);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&signing_input).finalize().into_bytes());
        format!("{}.{}", signing_input, signature)
    }

    pub fn verify(&self, token: &str, now_secs: i64) -> Result<Claims, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        let [header, claims, signature] = segments[..] else {
            return Err(TokenError::Malformed);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::BadSignature)?;
        self.sign(&format!("{}.{}", header, claims))
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims = URL_SAFE_NO_PAD
            .decode(claims)
            .map_err(|_| TokenError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&claims).map_err(|_| TokenError::Malformed)?;

        if claims.exp < now_secs {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Pull `Bearer <token>` out of the headers and verify it.
    pub fn authorize(&self, headers: &HeaderMap, now_secs: i64) -> Result<Claims, TokenError> {
        let value = headers
            .get(AUTHORIZATION)
            .ok_or(TokenError::Missing)?
            .to_str()
            .map_err(|_| TokenError::Malformed)?;
        let parts: Vec<&str> = value.split(' ').collect();
        match parts[..] {
            ["Bearer", token] => self.verify(token, now_secs),
            _ => Err(TokenError::Malformed),
        }
    }

    fn sign(&self, input: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(input.as_bytes());
        mac
    }
}

/// Middleware rejecting requests without a valid bearer token.
pub async fn require_token(
    State(gate): State<Arc<Gate>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = gate.authorize(request.headers(), chrono::Utc::now().timestamp())?;
    debug!(path = %request.uri().path(), exp = claims.exp, "Token accepted");
    Ok(next.run(request).await)
}
