use std::env;
use std::fmt;
use std::net::SocketAddr;

/// Environment variable naming the backend endpoint. The name is kept from
/// the original front end so existing deployments configure this service
/// without changes.
pub const ENDPOINT_ENV: &str = "NEXT_PUBLIC_AZURE_FUNCTION_URL";

/// Path used when no endpoint is configured, resolved against `base_url`.
pub const DEFAULT_ENDPOINT: &str = "/api/openai-assistant";

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort(value) => write!(f, "invalid PORT value {value:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Process-wide configuration, resolved once at startup and passed into the
/// controller explicitly rather than read ad hoc.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub addr: SocketAddr,
    pub base_url: String,
    pub endpoint: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            base_url: "http://127.0.0.1:8080".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl RelayConfig {
    /// Reads `HOST`, `PORT`, `BASE_URL`, and the endpoint variable, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port_raw = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        let port: u16 = port_raw
            .parse()
            .map_err(|_| ConfigError::InvalidPort(port_raw))?;
        let addr = format!("{host}:{port}")
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], port)));
        let base_url = env::var("BASE_URL").unwrap_or_else(|_| format!("http://{addr}"));
        let endpoint = env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        Ok(Self {
            addr,
            base_url,
            endpoint,
        })
    }

    /// Absolute endpoint URL. The configured endpoint may be a bare path
    /// (the default is), in which case it resolves against `base_url`.
    pub fn resolved_endpoint(&self) -> String {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            self.endpoint.clone()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                self.endpoint.trim_start_matches('/')
            )
        }
    }
}
