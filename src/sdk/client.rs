use crate::media::{MediaStream, MediaTransportFactory};
use crate::protocol::messages::SignalingMessage;
use crate::protocol::models::ConnectionState;
use crate::{Error, Result};

use super::builder::{ClientConfig, RealtimeBuilder, RealtimeConnectOptions};
use super::events::{EventFeed, EventStream, SdkEvent, StateReporter};
use super::session::{Session, SessionSpec};
use super::transport::{SignalingConnector, WsConnector};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

/// Client for a realtime video transformation service.
///
/// `connect` establishes a session with retries, `set_prompt` and `set_mirror` steer the
/// model while connected, and [`RealtimeClient::events`] reports state changes, remote
/// streams and errors. All methods take `&self`; share the client behind an `Arc` to
/// drive it from several tasks.
pub struct RealtimeClient {
    config: ClientConfig,
    options: Arc<RealtimeConnectOptions>,
    url: Url,
    connector: Arc<dyn SignalingConnector>,
    transports: Arc<dyn MediaTransportFactory>,
    reporter: StateReporter,
    session: Mutex<Option<Session>>,
    /// Bumped by `disconnect` so in-flight connects stop retrying.
    epoch: AtomicU64,
}

impl RealtimeClient {
    #[must_use]
    pub fn builder() -> RealtimeBuilder {
        RealtimeBuilder::new()
    }

    /// Create a client that dials signaling over WebSocket.
    ///
    /// # Errors
    /// Returns [`Error::InvalidOptions`] if the options are inconsistent.
    #[allow(clippy::result_large_err)]
    pub fn new(
        config: ClientConfig,
        options: RealtimeConnectOptions,
        transports: Arc<dyn MediaTransportFactory>,
    ) -> Result<Self> {
        Self::from_parts(config, options, transports, Arc::new(WsConnector))
    }

    #[allow(clippy::result_large_err)]
    pub(crate) fn from_parts(
        config: ClientConfig,
        options: RealtimeConnectOptions,
        transports: Arc<dyn MediaTransportFactory>,
        connector: Arc<dyn SignalingConnector>,
    ) -> Result<Self> {
        options.validate()?;
        let url = config.signaling_url(&options.model)?;
        let feed = EventFeed::new(options.event_buffer);

        Ok(Self {
            config,
            options: Arc::new(options),
            url,
            connector,
            transports,
            reporter: StateReporter::new(feed),
            session: Mutex::new(None),
            epoch: AtomicU64::new(0),
        })
    }

    /// Establish a session streaming `local_media`, retrying transient failures.
    ///
    /// Any session already running is closed first. Every failed attempt releases its
    /// socket and peer connection before the next one starts.
    ///
    /// # Errors
    /// Returns the first permanent error, [`Error::Cancelled`] if `disconnect` was called
    /// meanwhile, or [`Error::MaxRetriesExceeded`] once attempts run out.
    pub async fn connect(&self, local_media: MediaStream) -> Result<()> {
        self.close_session().await;
        let epoch = self.epoch.load(Ordering::SeqCst);

        tracing::info!(model = self.options.model.name.as_str(), "Connecting");
        let result = self
            .options
            .retry
            .run(|attempt| {
                let local_media = local_media.clone();
                async move { self.attempt(attempt, epoch, local_media).await }
            })
            .await;

        if let Err(err) = &result {
            if !matches!(err, Error::Cancelled) {
                tracing::error!(error = %err, code = err.code(), "Connect failed");
                self.reporter.feed().publish(SdkEvent::error(err));
            }
        }
        result
    }

    async fn attempt(&self, attempt: u32, epoch: u64, local_media: MediaStream) -> Result<()> {
        let (id, ready) = {
            let mut slot = self.session.lock().await;
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return Err(Error::Cancelled);
            }
            if let Some(mut previous) = slot.take() {
                previous.disconnect().await;
            }

            let spec = SessionSpec {
                url: self.url.clone(),
                local_media,
                options: Arc::clone(&self.options),
            };
            let (session, ready) = Session::start(
                spec,
                Arc::clone(&self.connector),
                Arc::clone(&self.transports),
                self.reporter.clone(),
            );
            tracing::debug!(attempt, session = %session.id(), "Session started");
            let id = session.id();
            *slot = Some(session);
            (id, ready)
        };

        let outcome = ready.await.unwrap_or(Err(Error::ConnectionClosed));
        if outcome.is_err() {
            let mut slot = self.session.lock().await;
            if slot.as_ref().is_some_and(|session| session.id() == id) {
                if let Some(mut session) = slot.take() {
                    session.disconnect().await;
                }
            }
        }
        outcome
    }

    /// Close the session, if any. Safe to call in any state and more than once.
    pub async fn disconnect(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.close_session().await;
        self.reporter.set(ConnectionState::Disconnected);
    }

    async fn close_session(&self) {
        let session = self.session.lock().await.take();
        if let Some(mut session) = session {
            tracing::info!(session = %session.id(), "Disconnecting");
            session.disconnect().await;
        }
    }

    /// Replace the transformation prompt.
    ///
    /// `enrich` asks the service to expand the prompt; the signaling message itself only
    /// carries the text.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] for empty text without touching the network, and
    /// [`Error::NotConnected`] when no session is running.
    pub async fn set_prompt(&self, text: &str, enrich: bool) -> Result<()> {
        if text.is_empty() {
            return Err(Error::InvalidInput("prompt must not be empty".to_string()));
        }

        let mut slot = self.session.lock().await;
        reap_closed(&mut slot).await;
        let Some(session) = slot.as_ref() else {
            return Err(Error::NotConnected);
        };
        tracing::debug!(enrich, len = text.len(), "Sending prompt");
        if session.send(SignalingMessage::prompt(text)).await {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Toggle horizontal mirroring. Ignored when no session is running.
    pub async fn set_mirror(&self, enabled: bool) {
        let mut slot = self.session.lock().await;
        reap_closed(&mut slot).await;
        if let Some(session) = slot.as_ref() {
            tracing::debug!(enabled, "Sending mirror");
            session.send(SignalingMessage::mirror(enabled)).await;
        }
    }

    /// Subscribe to client events. Late subscribers only see events published after
    /// they attach; use [`RealtimeClient::state`] for the current state.
    #[must_use]
    pub fn events(&self) -> EventStream {
        self.reporter.feed().subscribe()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.reporter.current()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Id of the running session. `None` once it has been closed or lost.
    pub async fn session_id(&self) -> Option<Uuid> {
        let mut slot = self.session.lock().await;
        reap_closed(&mut slot).await;
        slot.as_ref().map(Session::id)
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn options(&self) -> &RealtimeConnectOptions {
        &self.options
    }

    /// Disconnect and end every event stream. Further events are discarded.
    pub async fn shutdown(&self) {
        self.disconnect().await;
        self.reporter.feed().finish();
    }
}

/// Drop a session whose actor already tore itself down.
async fn reap_closed(slot: &mut Option<Session>) {
    if slot.as_ref().is_some_and(Session::is_closed) {
        if let Some(mut session) = slot.take() {
            tracing::debug!(session = %session.id(), "Releasing closed session");
            session.disconnect().await;
        }
    }
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("config", &self.config)
            .field("model", &self.options.model.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        // A running session notices its command channel closing and tears itself down.
        self.reporter.feed().finish();
    }
}
