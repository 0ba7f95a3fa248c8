//! Request building
//!
//! Turns a hit (type, merged parameters) plus the tracker identity into a
//! [`TrackingRequest`] the transport can send unmodified. Building is pure:
//! the timestamp is passed in, nothing is read from the environment.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

use crate::config::HttpMethod;
use crate::error::{TrackerError, TrackerResult};
use crate::Params;

/// Parameter carrying the tracker/site id
pub const TRACKER_ID_PARAM: &str = "tracker_id";
/// Parameter carrying the client id
pub const CLIENT_ID_PARAM: &str = "client_id";

/// Kind of hit reported to the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitType {
    Event,
    Login,
    Logout,
    SessionStart,
    SessionStop,
    Pageview,
}

impl HitType {
    pub const ALL: [HitType; 6] = [
        HitType::Event,
        HitType::Login,
        HitType::Logout,
        HitType::SessionStart,
        HitType::SessionStop,
        HitType::Pageview,
    ];

    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            HitType::Event => "event",
            HitType::Login => "login",
            HitType::Logout => "logout",
            HitType::SessionStart => "session_start",
            HitType::SessionStop => "session_stop",
            HitType::Pageview => "pageview",
        }
    }

    /// Path below the collector base URL
    pub fn path(&self) -> &'static str {
        match self {
            HitType::Event => "event",
            HitType::Login => "login",
            HitType::Logout => "logout",
            HitType::SessionStart => "session/start",
            HitType::SessionStop => "session/stop",
            HitType::Pageview => "pageview",
        }
    }
}

impl std::fmt::Display for HitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport-ready hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingRequest {
    hit_type: HitType,
    method: HttpMethod,
    endpoint: Url,
    params: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
}

impl TrackingRequest {
    pub fn hit_type(&self) -> HitType {
        self.hit_type
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Endpoint without query string
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Final parameter set, identity fields included
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Parameters in `application/x-www-form-urlencoded` form, keys sorted
    pub fn query_string(&self) -> String {
        encode_params(&self.params)
    }

    /// Endpoint with the query string attached (GET delivery)
    pub fn url_with_query(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.set_query(Some(&self.query_string()));
        url
    }

    /// Request body (POST delivery)
    pub fn form_body(&self) -> String {
        self.query_string()
    }
}

/// Builds [`TrackingRequest`]s against a collector base URL
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base: Url,
    method: HttpMethod,
}

impl RequestBuilder {
    pub fn new(base: Url, method: HttpMethod) -> Self {
        Self { base, method }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Build a request for `hit`.
    ///
    /// `tracker_id` and `client_id` always replace any same-named entry in
    /// `params`. Fails with [`TrackerError::Encoding`] only if the endpoint
    /// cannot be formed; every key and value is percent-encoded as is.
    pub fn build(
        &self,
        hit: HitType,
        tracker_id: &str,
        client_id: &str,
        params: &Params,
        created_at: DateTime<Utc>,
    ) -> TrackerResult<TrackingRequest> {
        let endpoint = self.base.join(hit.path()).map_err(|e| {
            TrackerError::Encoding(format!("cannot form endpoint for '{}': {}", hit, e))
        })?;

        let mut merged: BTreeMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        merged.insert(TRACKER_ID_PARAM.to_string(), tracker_id.to_string());
        merged.insert(CLIENT_ID_PARAM.to_string(), client_id.to_string());

        Ok(TrackingRequest {
            hit_type: hit,
            method: self.method,
            endpoint,
            params: merged,
            created_at,
        })
    }
}

/// Encode parameters as `application/x-www-form-urlencoded`
pub fn encode_params(params: &BTreeMap<String, String>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}

/// Decode an `application/x-www-form-urlencoded` string. Later duplicates win.
pub fn decode_params(encoded: &str) -> BTreeMap<String, String> {
    form_urlencoded::parse(encoded.as_bytes())
        .into_owned()
        .collect()
}
