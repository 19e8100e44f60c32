//! Backend endpoints issuing the publishable key and the payment session.
//!
//! Both endpoints answer with the same envelope: `{ "data": "..." }` on
//! success or `{ "error": ... }` on failure.

use async_trait::async_trait;
use gloo_net::http::Request;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::config::CardPaymentConfig;

/// Backend error
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Network or (de)serialization failure
    #[error("Network error: {0}")]
    Http(#[from] gloo_net::Error),
    /// Non-2xx response
    #[error("Server error: {0}")]
    Status(u16),
    /// `{ "error": ... }` envelope
    #[error("{0}")]
    Rejected(String),
    /// Envelope with neither `data` nor `error`
    #[error("Empty response")]
    Empty,
}

/// Response envelope shared by both endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl Envelope {
    pub fn into_result(self) -> Result<String, BackendError> {
        match (self.data, self.error) {
            (_, Some(error)) if !error.is_null() => Err(BackendError::Rejected(describe(&error))),
            (Some(data), _) => Ok(data),
            _ => Err(BackendError::Empty),
        }
    }
}

/// Best readable text for an `error` payload: the string itself, its
/// `message`/`body.message`, or the raw JSON.
fn describe(error: &serde_json::Value) -> String {
    error
        .as_str()
        .or_else(|| error.get("message").and_then(|m| m.as_str()))
        .or_else(|| {
            error
                .get("body")
                .and_then(|b| b.get("message"))
                .and_then(|m| m.as_str())
        })
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

/// Source of the two prerequisites of the card payment.
#[async_trait(?Send)]
pub trait CredentialBackend {
    /// Fetch the Stripe publishable key.
    async fn publishable_key(&self) -> Result<String, BackendError>;

    /// Create a payment session for `amount` and return its client secret.
    async fn create_session_secret(&self, amount: Amount) -> Result<String, BackendError>;
}

#[derive(Serialize)]
struct SessionRequest {
    amount: Amount,
}

/// [`CredentialBackend`] over HTTP, via `gloo-net`.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpBackend {
    public_key_url: String,
    session_secret_url: String,
}

impl HttpBackend {
    pub fn new(public_key_url: impl Into<String>, session_secret_url: impl Into<String>) -> Self {
        Self {
            public_key_url: public_key_url.into(),
            session_secret_url: session_secret_url.into(),
        }
    }

    pub fn from_config(config: &CardPaymentConfig) -> Self {
        Self::new(&config.public_key_url, &config.session_secret_url)
    }
}

#[async_trait(?Send)]
impl CredentialBackend for HttpBackend {
    async fn publishable_key(&self) -> Result<String, BackendError> {
        let resp = Request::get(&self.public_key_url).send().await?;
        if !resp.ok() {
            return Err(BackendError::Status(resp.status()));
        }
        resp.json::<Envelope>().await?.into_result()
    }

    async fn create_session_secret(&self, amount: Amount) -> Result<String, BackendError> {
        let resp = Request::post(&self.session_secret_url)
            .json(&SessionRequest { amount })?
            .send()
            .await?;
        if !resp.ok() {
            return Err(BackendError::Status(resp.status()));
        }
        resp.json::<Envelope>().await?.into_result()
    }
}
