//! Configuration for the Gradelo tracking client

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{TrackerError, TrackerResult};

/// Default collector endpoint
pub const DEFAULT_COLLECTOR_URL: &str = "https://collect.gradelo.com/v1/";

/// Default storage key for the persisted client id
pub const DEFAULT_CLIENT_ID_KEY: &str = "gradelo.client_id";

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL hits are sent to; each hit type appends its own path
    #[serde(default = "default_collector_url")]
    pub collector_url: String,

    /// HTTP method used to deliver hits
    #[serde(default)]
    pub method: HttpMethod,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// User-Agent header sent by the HTTP transport
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Key under which the client id is persisted
    #[serde(default = "default_client_id_key")]
    pub client_id_key: String,

    /// Tracker/site id used by hosts that initialize from config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    /// Start an implicit session during initialize
    #[serde(default)]
    pub auto_start_session: bool,

    /// Default parameters attached to every hit
    #[serde(default)]
    pub default_params: HashMap<String, String>,
}

fn default_collector_url() -> String { DEFAULT_COLLECTOR_URL.to_string() }
fn default_timeout() -> u64 { 10_000 }
fn default_user_agent() -> String { format!("gradelo-analytics/{}", env!("CARGO_PKG_VERSION")) }
fn default_client_id_key() -> String { DEFAULT_CLIENT_ID_KEY.to_string() }

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            collector_url: default_collector_url(),
            method: HttpMethod::default(),
            timeout_ms: default_timeout(),
            user_agent: default_user_agent(),
            client_id_key: default_client_id_key(),
            app_id: None,
            auto_start_session: false,
            default_params: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Parse configuration from a JSON string
    pub fn from_json_str(json: &str) -> TrackerResult<Self> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> TrackerResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Check that the configuration can be used to build a tracker
    pub fn validate(&self) -> TrackerResult<()> {
        let url = self.collector_base()?;
        if url.cannot_be_a_base() {
            return Err(TrackerError::Config(format!(
                "collector_url '{}' cannot be used as a base URL",
                self.collector_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(TrackerError::Config("timeout_ms must be greater than zero".to_string()));
        }
        if self.client_id_key.is_empty() {
            return Err(TrackerError::Config("client_id_key must not be empty".to_string()));
        }
        Ok(())
    }

    /// Collector base URL, normalised to end with a slash so hit paths
    /// are appended rather than replacing the last segment
    pub fn collector_base(&self) -> TrackerResult<Url> {
        let mut raw = self.collector_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|e| {
            TrackerError::Config(format!("collector_url '{}': {}", self.collector_url, e))
        })
    }
}

/// HTTP method used for delivery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    /// Parameters in the query string
    #[default]
    Get,
    /// Parameters as an `application/x-www-form-urlencoded` body
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    collector_url: Option<String>,
    method: Option<HttpMethod>,
    timeout_ms: Option<u64>,
    user_agent: Option<String>,
    client_id_key: Option<String>,
    app_id: Option<String>,
    auto_start_session: Option<bool>,
    default_params: HashMap<String, String>,
}

impl ClientConfigBuilder {
    /// Set the collector base URL
    pub fn collector_url(mut self, url: impl Into<String>) -> Self {
        self.collector_url = Some(url.into());
        self
    }

    /// Set the delivery method
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the per-request timeout
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the storage key for the client id
    pub fn client_id_key(mut self, key: impl Into<String>) -> Self {
        self.client_id_key = Some(key.into());
        self
    }

    /// Set the tracker/site id
    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Enable or disable the implicit session
    pub fn auto_start_session(mut self, enabled: bool) -> Self {
        self.auto_start_session = Some(enabled);
        self
    }

    /// Add a default parameter
    pub fn default_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_params.insert(key.into(), value.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            collector_url: self.collector_url.unwrap_or(defaults.collector_url),
            method: self.method.unwrap_or(defaults.method),
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
            client_id_key: self.client_id_key.unwrap_or(defaults.client_id_key),
            app_id: self.app_id,
            auto_start_session: self.auto_start_session.unwrap_or(false),
            default_params: self.default_params,
        }
    }
}
