use crate::media::MediaTransportFactory;
use crate::protocol::models::{
    DEFAULT_BASE_URL, ModelDefinition, ModelState, Models, PeerConnectionConfig, Prompt, RealtimeModel, VideoCodec,
};
use crate::transport::ws;
use crate::{Error, Result};

use super::client::RealtimeClient;
use super::events::DEFAULT_EVENT_BUFFER;
use super::retry::RetryPolicy;
use super::transport::{SignalingConnector, WsConnector};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials and endpoint for the realtime service.
#[derive(Clone)]
pub struct ClientConfig {
    base_url: Url,
    api_key: String,
}

impl ClientConfig {
    /// # Errors
    /// Returns [`Error::InvalidApiKey`] for an empty key and [`Error::InvalidBaseUrl`] if
    /// the URL does not parse or is not an http(s)/ws(s) URL with a host.
    #[allow(clippy::result_large_err)]
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidApiKey);
        }

        let parsed = Url::parse(base_url).map_err(|_| Error::InvalidBaseUrl(base_url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https" | "ws" | "wss") || parsed.host_str().is_none() {
            return Err(Error::InvalidBaseUrl(base_url.to_string()));
        }

        Ok(Self {
            base_url: parsed,
            api_key,
        })
    }

    /// Config against [`DEFAULT_BASE_URL`].
    ///
    /// # Errors
    /// Returns [`Error::InvalidApiKey`] for an empty key.
    #[allow(clippy::result_large_err)]
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::new(DEFAULT_BASE_URL, api_key)
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// # Errors
    /// Returns an error if the base URL cannot carry the model path.
    #[allow(clippy::result_large_err)]
    pub fn signaling_url(&self, model: &ModelDefinition) -> Result<Url> {
        ws::signaling_url(&self.base_url, &self.api_key, model)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Per-client connection options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConnectOptions {
    pub model: ModelDefinition,
    /// Prompt and mirror state sent once the first session connects.
    pub initial_state: Option<ModelState>,
    pub peer_connection: PeerConnectionConfig,
    pub preferred_codec: VideoCodec,
    /// Deadline for one attempt, from dialing signaling to the peer reporting connected.
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
    pub event_buffer: usize,
}

impl RealtimeConnectOptions {
    #[must_use]
    pub fn new(model: ModelDefinition) -> Self {
        Self {
            model,
            initial_state: None,
            peer_connection: PeerConnectionConfig::default(),
            preferred_codec: VideoCodec::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry: RetryPolicy::default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// # Errors
    /// Returns [`Error::InvalidOptions`] describing the first inconsistent field.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        if self.model.name.is_empty() {
            return Err(Error::InvalidOptions("model name must not be empty".to_string()));
        }
        let peer = &self.peer_connection;
        if peer.min_bitrate > peer.max_bitrate {
            return Err(Error::InvalidOptions(format!(
                "min_bitrate ({}) exceeds max_bitrate ({})",
                peer.min_bitrate, peer.max_bitrate
            )));
        }
        if peer.max_framerate == 0 {
            return Err(Error::InvalidOptions("max_framerate must be positive".to_string()));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::InvalidOptions("connect_timeout must be positive".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidOptions("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl Default for RealtimeConnectOptions {
    fn default() -> Self {
        Self::new(Models::realtime(RealtimeModel::Mirage))
    }
}

pub struct Realtime;

impl Realtime {
    #[must_use]
    pub fn builder() -> RealtimeBuilder {
        RealtimeBuilder::new()
    }
}

pub struct RealtimeBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    options: RealtimeConnectOptions,
    transports: Option<Arc<dyn MediaTransportFactory>>,
    connector: Option<Arc<dyn SignalingConnector>>,
}

impl RealtimeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: None,
            options: RealtimeConnectOptions::default(),
            transports: None,
            connector: None,
        }
    }

    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: RealtimeModel) -> Self {
        self.options.model = Models::realtime(model);
        self
    }

    /// Use a model that is not in the built-in catalogue.
    #[must_use]
    pub fn model_definition(mut self, model: ModelDefinition) -> Self {
        self.options.model = model;
        self
    }

    #[must_use]
    pub fn options(mut self, options: RealtimeConnectOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn initial_state(mut self, state: ModelState) -> Self {
        self.options.initial_state = Some(state);
        self
    }

    #[must_use]
    pub fn initial_prompt(mut self, prompt: Prompt) -> Self {
        self.options.initial_state.get_or_insert_with(ModelState::default).prompt = Some(prompt);
        self
    }

    #[must_use]
    pub fn mirror(mut self, enabled: bool) -> Self {
        self.options.initial_state.get_or_insert_with(ModelState::default).mirror = enabled;
        self
    }

    #[must_use]
    pub fn peer_connection(mut self, config: PeerConnectionConfig) -> Self {
        self.options.peer_connection = config;
        self
    }

    #[must_use]
    pub const fn bitrate(mut self, min: u32, max: u32) -> Self {
        self.options.peer_connection.min_bitrate = min;
        self.options.peer_connection.max_bitrate = max;
        self
    }

    #[must_use]
    pub const fn max_framerate(mut self, fps: u32) -> Self {
        self.options.peer_connection.max_framerate = fps;
        self
    }

    #[must_use]
    pub fn ice_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.peer_connection.ice_servers = servers.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn preferred_codec(mut self, codec: VideoCodec) -> Self {
        self.options.preferred_codec = codec;
        self
    }

    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.options.retry = policy;
        self
    }

    /// Event buffer size. Values below the minimum are raised to it.
    #[must_use]
    pub const fn event_buffer(mut self, capacity: usize) -> Self {
        self.options.event_buffer = capacity;
        self
    }

    /// The WebRTC engine binding used to create peer connections. Required.
    #[must_use]
    pub fn media_transport(mut self, factory: Arc<dyn MediaTransportFactory>) -> Self {
        self.transports = Some(factory);
        self
    }

    /// Replace the WebSocket dialer, e.g. to tunnel signaling through a proxy.
    #[must_use]
    pub fn signaling_connector(mut self, connector: Arc<dyn SignalingConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Validate everything and create the client. Performs no I/O.
    ///
    /// # Errors
    /// Returns a configuration error if the key, URL or options are invalid, or if no
    /// media transport was supplied.
    #[allow(clippy::result_large_err)]
    pub fn build(self) -> Result<RealtimeClient> {
        let api_key = self.api_key.ok_or(Error::InvalidApiKey)?;
        let base_url = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let config = ClientConfig::new(base_url, api_key)?;
        let transports = self
            .transports
            .ok_or_else(|| Error::InvalidOptions("media transport factory required".to_string()))?;
        let connector = self.connector.unwrap_or_else(|| Arc::new(WsConnector));

        RealtimeClient::from_parts(config, self.options, transports, connector)
    }
}

impl Default for RealtimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
