//! Gradelo Analytics - session, pageview and event tracking client
//!
//! The tracker turns host application calls (events, logins, sessions,
//! pageviews) into collector requests and delivers them in the background:
//! - Generates and persists a stable client id
//! - Merges default parameters into every hit
//! - Builds percent-encoded requests against the collector
//! - Hands requests to a transport without blocking the caller
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        TRACKER                               │
//! │                                                              │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐          │
//! │  │  Identity   │  │  Default    │  │   Clock     │          │
//! │  │  Store      │  │  Params     │  │             │          │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘          │
//! │         └────────────────┼────────────────┘                 │
//! │                    ┌─────▼─────┐                            │
//! │                    │  Request  │                            │
//! │                    │  Builder  │                            │
//! │                    └─────┬─────┘                            │
//! │                    ┌─────▼─────┐                            │
//! │                    │ Dispatcher│  (tokio task)              │
//! │                    └─────┬─────┘                            │
//! │  ┌───────────────────────┼───────────────────────┐          │
//! │  │              TRANSPORT LAYER                  │          │
//! │  │     ┌──────┐    ┌───────────┐    ┌──────┐     │          │
//! │  │     │ HTTP │    │ Recording │    │ Null │     │          │
//! │  │     └──────┘    └───────────┘    └──────┘     │          │
//! │  └───────────────────────────────────────────────┘          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gradelo_core::{ClientConfig, FileStore, Params, Tracker};
//!
//! let tracker = Arc::new(
//!     Tracker::builder()
//!         .config(ClientConfig::default())
//!         .store(Arc::new(FileStore::new("gradelo/identity.json")?))
//!         .build()?,
//! );
//!
//! tracker.initialize("site-42", true)?;
//! tracker.trigger_event("signup", &Params::new())?;
//!
//! let session = tracker.start_session(&Params::new())?;
//! // ...
//! tracker.stop_session(&session, &Params::new())?;
//!
//! tracker.flush().await;
//! ```

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod request;
pub mod store;
pub mod tracker;
pub mod transport;

use std::collections::HashMap;

/// String-to-string parameters attached to a hit
pub type Params = HashMap<String, String>;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ClientConfig, ClientConfigBuilder, HttpMethod};
pub use dispatch::{DeliveryFailure, DispatchStats};
pub use error::{ErrorCategory, TrackerError, TrackerResult};
pub use identity::{IdentityStore, ParameterStore};
pub use request::{decode_params, HitType, RequestBuilder, TrackingRequest};
pub use store::{FileStore, InMemoryStore, KeyValueStore, NullStore};
pub use tracker::{Tracker, TrackerBuilder};
pub use transport::{HttpTransport, NullTransport, RecordingTransport, Transport};
