//! The tracking engine
//!
//! A [`Tracker`] starts uninitialized. `initialize` fixes the tracker/site
//! id for the lifetime of the instance; every other operation fails with
//! [`TrackerError::NotInitialized`] until then and has no side effect. A
//! second `initialize` is rejected with [`TrackerError::AlreadyInitialized`].

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::dispatch::{DeliveryFailure, DispatchStats, Dispatcher};
use crate::error::{TrackerError, TrackerResult};
use crate::identity::{generate_token, IdentityStore, ParameterStore};
use crate::request::{HitType, RequestBuilder, TrackingRequest};
use crate::store::{InMemoryStore, KeyValueStore};
use crate::transport::{HttpTransport, Transport};
use crate::Params;

pub const EVENT_ID_PARAM: &str = "event_id";
pub const LOGIN_TYPE_PARAM: &str = "login_type";
pub const USER_ID_PARAM: &str = "user_id";
pub const SESSION_ID_PARAM: &str = "session_id";
pub const PAGEVIEW_ID_PARAM: &str = "pageview_id";
pub const PAGEVIEW_TOKEN_PARAM: &str = "pageview_token";

/// State that exists only after `initialize`
#[derive(Debug, Clone)]
struct Initialized {
    tracker_id: String,
    implicit_session: Option<String>,
}

/// Session, pageview and event tracker
///
/// Share it between threads with `Arc<Tracker>`; every method takes `&self`.
pub struct Tracker {
    config: ClientConfig,
    state: RwLock<Option<Initialized>>,
    identity: IdentityStore,
    params: ParameterStore,
    builder: RequestBuilder,
    clock: Arc<dyn Clock>,
    dispatcher: Dispatcher,
}

impl Tracker {
    /// Start building a tracker
    pub fn builder() -> TrackerBuilder {
        TrackerBuilder::default()
    }

    /// Tracker with default config, in-memory identity and HTTP delivery
    pub fn new(config: ClientConfig) -> TrackerResult<Self> {
        Self::builder().config(config).build()
    }

    /// Fix the tracker/site id and optionally start the implicit session.
    pub fn initialize(&self, app_id: &str, auto_start_session: bool) -> TrackerResult<()> {
        let mut state = self.state.write();
        if state.is_some() {
            return Err(TrackerError::AlreadyInitialized);
        }
        require("app_id", app_id)?;

        // Build the implicit session hit before committing so a failure
        // leaves the tracker uninitialized
        let implicit = if auto_start_session {
            let token = generate_token();
            let request = self.build_request(
                app_id,
                HitType::SessionStart,
                &Params::new(),
                &[(SESSION_ID_PARAM, token.as_str())],
            )?;
            Some((token, request))
        } else {
            None
        };

        *state = Some(Initialized {
            tracker_id: app_id.to_string(),
            implicit_session: implicit.as_ref().map(|(token, _)| token.clone()),
        });
        drop(state);

        info!(
            tracker_id = app_id,
            auto_start_session,
            transport = self.dispatcher.transport_name(),
            "tracker initialized"
        );

        if let Some((_, request)) = implicit {
            self.dispatch(request);
        }
        Ok(())
    }

    /// Initialize from `app_id` and `auto_start_session` in the config
    pub fn initialize_from_config(&self) -> TrackerResult<()> {
        let app_id = self
            .config
            .app_id
            .clone()
            .ok_or_else(|| TrackerError::Config("app_id is not set".to_string()))?;
        self.initialize(&app_id, self.config.auto_start_session)
    }

    /// Replace the default parameters sent with every hit
    pub fn set_additional_params(&self, params: Params) -> TrackerResult<()> {
        self.tracker_id()?;
        self.params.set_defaults(params)
    }

    /// Report a custom event
    pub fn trigger_event(&self, event_id: &str, params: &Params) -> TrackerResult<()> {
        let tracker_id = self.tracker_id()?;
        require("event_id", event_id)?;
        self.track(&tracker_id, HitType::Event, params, &[(EVENT_ID_PARAM, event_id)])
    }

    /// Report a login of `identifier` via `login_type`
    pub fn login(&self, login_type: &str, identifier: &str, params: &Params) -> TrackerResult<()> {
        let tracker_id = self.tracker_id()?;
        require("login_type", login_type)?;
        require("identifier", identifier)?;
        self.track(
            &tracker_id,
            HitType::Login,
            params,
            &[(LOGIN_TYPE_PARAM, login_type), (USER_ID_PARAM, identifier)],
        )
    }

    /// Report a logout
    pub fn logout(&self, params: &Params) -> TrackerResult<()> {
        let tracker_id = self.tracker_id()?;
        self.track(&tracker_id, HitType::Logout, params, &[])
    }

    /// Start a session and return its token. The token is available
    /// immediately; the hit is delivered in the background.
    pub fn start_session(&self, params: &Params) -> TrackerResult<String> {
        let tracker_id = self.tracker_id()?;
        let token = generate_token();
        self.track(
            &tracker_id,
            HitType::SessionStart,
            params,
            &[(SESSION_ID_PARAM, token.as_str())],
        )?;
        Ok(token)
    }

    /// Start a pageview and return its token
    pub fn start_pageview(&self, page_view_id: &str, params: &Params) -> TrackerResult<String> {
        let tracker_id = self.tracker_id()?;
        require("page_view_id", page_view_id)?;
        let token = generate_token();
        self.track(
            &tracker_id,
            HitType::Pageview,
            params,
            &[(PAGEVIEW_ID_PARAM, page_view_id), (PAGEVIEW_TOKEN_PARAM, token.as_str())],
        )?;
        Ok(token)
    }

    /// Stop a session. Tokens are not checked against issued sessions;
    /// reconciling unknown or repeated stops is left to the collector.
    pub fn stop_session(&self, session_id: &str, params: &Params) -> TrackerResult<()> {
        let tracker_id = self.tracker_id()?;
        require("session_id", session_id)?;
        self.track(
            &tracker_id,
            HitType::SessionStop,
            params,
            &[(SESSION_ID_PARAM, session_id)],
        )
    }

    /// Tracker/site id set by `initialize`
    pub fn tracker_id(&self) -> TrackerResult<String> {
        self.state
            .read()
            .as_ref()
            .map(|s| s.tracker_id.clone())
            .ok_or(TrackerError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().is_some()
    }

    /// Token of the session started by `initialize(_, true)`
    pub fn implicit_session(&self) -> Option<String> {
        self.state
            .read()
            .as_ref()
            .and_then(|s| s.implicit_session.clone())
    }

    /// Stable per-installation identifier, created on first use
    pub fn client_id(&self) -> String {
        self.identity.client_id()
    }

    /// Current default parameters
    pub fn additional_params(&self) -> Params {
        self.params.defaults()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Receive hits the transport failed to deliver
    pub fn set_failure_handler<F>(&self, handler: F)
    where
        F: Fn(&DeliveryFailure) + Send + Sync + 'static,
    {
        self.dispatcher.set_failure_handler(Arc::new(handler));
    }

    pub fn clear_failure_handler(&self) {
        self.dispatcher.clear_failure_handler();
    }

    /// Wait until every hit reported so far has reached the transport
    pub async fn flush(&self) {
        self.dispatcher.flush().await;
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    fn track(
        &self,
        tracker_id: &str,
        hit: HitType,
        params: &Params,
        fields: &[(&str, &str)],
    ) -> TrackerResult<()> {
        let request = self.build_request(tracker_id, hit, params, fields)?;
        self.dispatch(request);
        Ok(())
    }

    /// defaults ⊕ call-site params ⊕ operation fields; the builder then
    /// adds the identity fields on top
    fn build_request(
        &self,
        tracker_id: &str,
        hit: HitType,
        params: &Params,
        fields: &[(&str, &str)],
    ) -> TrackerResult<TrackingRequest> {
        let mut merged = self.params.merge(params);
        for (key, value) in fields {
            merged.insert((*key).to_string(), (*value).to_string());
        }
        self.builder.build(
            hit,
            tracker_id,
            &self.identity.client_id(),
            &merged,
            self.clock.now(),
        )
    }

    fn dispatch(&self, request: TrackingRequest) {
        debug!(
            hit = %request.hit_type(),
            tracker_id = request.param(crate::request::TRACKER_ID_PARAM).unwrap_or_default(),
            params = request.params().len(),
            "hit queued"
        );
        self.dispatcher.dispatch(request);
    }
}

fn require(name: &'static str, value: &str) -> TrackerResult<()> {
    if value.is_empty() {
        return Err(TrackerError::InvalidArgument { name });
    }
    Ok(())
}

/// Builder for [`Tracker`]
#[derive(Default)]
pub struct TrackerBuilder {
    config: Option<ClientConfig>,
    store: Option<Arc<dyn KeyValueStore>>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
}

impl TrackerBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Storage for the client id (default: in-memory)
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Delivery backend (default: [`HttpTransport`])
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Timestamp source (default: [`SystemClock`])
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the tracker. Must run inside a tokio runtime.
    pub fn build(self) -> TrackerResult<Tracker> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let builder = RequestBuilder::new(config.collector_base()?, config.method);

        let params = ParameterStore::new();
        params.set_defaults(config.default_params.clone())?;

        let store: Arc<dyn KeyValueStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryStore::new()),
        };
        let identity = IdentityStore::new(store, config.client_id_key.clone());

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&config)?),
        };
        let dispatcher = Dispatcher::spawn(transport)?;

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        Ok(Tracker {
            config,
            state: RwLock::new(None),
            identity,
            params,
            builder,
            clock,
            dispatcher,
        })
    }
}
