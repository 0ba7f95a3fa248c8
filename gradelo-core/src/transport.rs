//! Transport backends for hit delivery

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::{ClientConfig, HttpMethod};
use crate::error::{TrackerError, TrackerResult};
use crate::request::{HitType, TrackingRequest};

/// Header carrying the hit creation time (RFC 3339)
pub const TIMESTAMP_HEADER: &str = "X-Gradelo-Timestamp";

/// Transport backend interface
#[async_trait]
pub trait Transport: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Deliver one request
    async fn send(&self, request: &TrackingRequest) -> TrackerResult<()>;
}

/// HTTP transport backed by reqwest
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport using the timeout and User-Agent from `config`
    pub fn new(config: &ClientConfig) -> TrackerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TrackerError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: &TrackingRequest) -> TrackerResult<()> {
        let builder = match request.method() {
            HttpMethod::Get => self.client.get(request.url_with_query()),
            HttpMethod::Post => self
                .client
                .post(request.endpoint().clone())
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(request.form_body()),
        };

        let response = builder
            .header(TIMESTAMP_HEADER, request.created_at().to_rfc3339())
            .send()
            .await
            .map_err(|e| TrackerError::Transport(format!("{} hit: {}", request.hit_type(), e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Transport(format!(
                "{} hit rejected by collector with status {}",
                request.hit_type(),
                status
            )));
        }
        Ok(())
    }
}

/// Transport that keeps every request in memory
///
/// Used in tests to inspect what the tracker produced. Hit types listed in
/// `failing` are recorded and then reported as failed.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<TrackingRequest>>,
    failing: Mutex<Vec<HitType>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent hit of type `hit` fail
    pub fn fail_on(&self, hit: HitType) {
        self.failing.lock().push(hit);
    }

    /// All requests received so far
    pub fn requests(&self) -> Vec<TrackingRequest> {
        self.sent.lock().clone()
    }

    /// Requests of one hit type
    pub fn requests_of(&self, hit: HitType) -> Vec<TrackingRequest> {
        self.sent
            .lock()
            .iter()
            .filter(|r| r.hit_type() == hit)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, request: &TrackingRequest) -> TrackerResult<()> {
        self.sent.lock().push(request.clone());
        if self.failing.lock().contains(&request.hit_type()) {
            return Err(TrackerError::Transport(format!(
                "{} hit failed (simulated)",
                request.hit_type()
            )));
        }
        Ok(())
    }
}

/// Transport that drops everything
#[derive(Debug, Default, Clone)]
pub struct NullTransport;

#[async_trait]
impl Transport for NullTransport {
    fn name(&self) -> &str {
        "null"
    }

    async fn send(&self, _request: &TrackingRequest) -> TrackerResult<()> {
        Ok(())
    }
}
