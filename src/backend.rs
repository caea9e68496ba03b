use reqwest::Client;
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Serialize)]
struct AskBody<'a> {
    prompt: &'a str,
}

/// Failure to send the request or receive the body. The backend reporting an
/// application-level error is not a `BackendError`; that arrives as a
/// successful body and is classified by the controller.
#[derive(Debug)]
pub enum BackendError {
    Transport(reqwest::Error),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Transport(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Transport(err) => Some(err),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(value: reqwest::Error) -> Self {
        BackendError::Transport(value)
    }
}

/// Thin client for the assistant backend: one POST, body read as raw text.
pub struct BackendClient {
    client: Client,
    endpoint: String,
}

impl BackendClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends `{"prompt": …}` and returns the full response body as text.
    ///
    /// Non-2xx statuses are not treated as transport failures: error payloads
    /// arrive in the body and the caller decides what they mean.
    pub async fn ask(&self, prompt: &str) -> Result<String, BackendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&AskBody { prompt })
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(%status, bytes = body.len(), "backend settled");
        Ok(body)
    }
}
