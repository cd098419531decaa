//! Authenticated request builder and response checks

use crate::error::{Error, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// The `{"response": ...}` wrapper around every portal API payload.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub response: T,
}

/// Bearer-authenticated access to one portal's `/api/2.0` tree.
#[derive(Debug, Clone)]
pub struct PortalApi {
    client: Client,
    base_url: String,
    token: String,
}

impl PortalApi {
    /// `portal_url` is scheme plus host, e.g. `https://t1.example.io`.
    #[must_use]
    pub fn new(client: Client, portal_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: portal_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/2.0/{}", self.base_url, path.trim_start_matches('/'))
    }

    #[must_use]
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(&self.token)
    }

    #[must_use]
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(&self.token)
    }

    #[must_use]
    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(&self.token)
    }

    #[must_use]
    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(&self.token)
    }
}

/// Turn a non-2xx response into [`Error::Http`].
pub async fn ensure_success(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Http {
        context: context.to_string(),
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Check the status, then decode the body as `T`.
pub async fn read_json<T: DeserializeOwned>(response: Response, context: &str) -> Result<T> {
    let body = ensure_success(response, context).await?.text().await?;
    serde_json::from_str(&body).map_err(|e| Error::Api(format!("{context}: {e}")))
}

/// Server-provided message of an error body.
///
/// Tries `error` (string), `error.message`, then `message`; anything
/// else yields the raw body.
pub fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    let error = value.get("error");
    error
        .and_then(Value::as_str)
        .or_else(|| error.and_then(|e| e.get("message")).and_then(Value::as_str))
        .or_else(|| value.get("message").and_then(Value::as_str))
        .map_or_else(|| body.trim().to_string(), str::to_string)
}
