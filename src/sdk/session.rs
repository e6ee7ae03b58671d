//! Per-session orchestration of signaling and the peer connection.
//!
//! Every session runs as one actor task that owns its [`SignalingChannel`] and
//! [`MediaTransport`]. Commands from the client, inbound signaling messages and engine
//! callbacks are all consumed by that task, so state transitions are serialized without
//! any lock around the handles. A session is single-use: once it tears down, the task
//! exits and a reconnect starts a new session.

use crate::media::{
    MediaKind, MediaStream, MediaTransport, MediaTransportFactory, PeerState, SenderParameters, SessionDescription,
    TransportConfig, TransportEvent, TransportEvents, order_codecs,
};
use crate::protocol::messages::SignalingMessage;
use crate::protocol::models::ConnectionState;
use crate::transport::SignalingChannel;
use crate::{Error, Result};

use super::builder::RealtimeConnectOptions;
use super::events::{SdkEvent, StateReporter};
use super::transport::SignalingConnector;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

const COMMAND_BUFFER: usize = 64;

/// Inputs for one connection attempt.
pub(crate) struct SessionSpec {
    pub url: Url,
    pub local_media: MediaStream,
    pub options: Arc<RealtimeConnectOptions>,
}

/// Handle to a running session actor.
pub struct Session {
    id: Uuid,
    commands: mpsc::Sender<Command>,
    task: Option<JoinHandle<()>>,
}

enum Command {
    Send(SignalingMessage),
    Disconnect { respond: oneshot::Sender<()> },
}

impl Session {
    /// Spawn the actor. The returned receiver resolves once the session is connected or
    /// has failed and released everything it opened.
    pub(crate) fn start(
        spec: SessionSpec,
        connector: Arc<dyn SignalingConnector>,
        transports: Arc<dyn MediaTransportFactory>,
        reporter: StateReporter,
    ) -> (Self, oneshot::Receiver<Result<()>>) {
        let id = Uuid::new_v4();
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (ready_tx, ready_rx) = oneshot::channel();

        let actor = SessionActor {
            spec,
            connector,
            transports,
            reporter,
            signaling: None,
            inbound: None,
            transport: None,
            transport_events: None,
            pending: Some(ready_tx),
            initial_state_sent: false,
        };
        let span = tracing::info_span!("session", id = %id);
        let task = tokio::spawn(actor.run(cmd_rx).instrument(span));

        (
            Self {
                id,
                commands: cmd_tx,
                task: Some(task),
            },
            ready_rx,
        )
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the actor has exited, after a teardown of any cause.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Queue a message for the signaling socket. Returns `false` if the session is gone.
    pub async fn send(&self, message: SignalingMessage) -> bool {
        let delivered = self.commands.send(Command::Send(message)).await.is_ok();
        if !delivered {
            tracing::debug!(session = %self.id, "Session already closed, message dropped");
        }
        delivered
    }

    /// Tear the session down and wait for its task to exit. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Disconnect { respond: tx }).await.is_ok() {
            let _ = rx.await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

enum Setup {
    Done(Result<()>),
    Cancelled(Option<oneshot::Sender<()>>),
}

struct SessionActor {
    spec: SessionSpec,
    connector: Arc<dyn SignalingConnector>,
    transports: Arc<dyn MediaTransportFactory>,
    reporter: StateReporter,
    signaling: Option<SignalingChannel>,
    inbound: Option<mpsc::Receiver<SignalingMessage>>,
    transport: Option<Box<dyn MediaTransport>>,
    transport_events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    pending: Option<oneshot::Sender<Result<()>>>,
    initial_state_sent: bool,
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        self.reporter.set(ConnectionState::Connecting);
        let deadline = Instant::now() + self.spec.options.connect_timeout;
        let mut queued = Vec::new();

        let setup = {
            let setup = tokio::time::timeout_at(deadline, self.setup());
            tokio::pin!(setup);
            loop {
                tokio::select! {
                    result = &mut setup => {
                        break Setup::Done(result.unwrap_or(Err(Error::ConnectionTimeout)));
                    }
                    cmd = commands.recv() => match cmd {
                        Some(Command::Send(message)) => queued.push(message),
                        Some(Command::Disconnect { respond }) => break Setup::Cancelled(Some(respond)),
                        None => break Setup::Cancelled(None),
                    },
                }
            }
        };

        match setup {
            Setup::Done(Ok(())) => {}
            Setup::Done(Err(err)) => {
                self.teardown(Some(err)).await;
                return;
            }
            Setup::Cancelled(respond) => {
                self.teardown(Some(Error::Cancelled)).await;
                if let Some(respond) = respond {
                    let _ = respond.send(());
                }
                return;
            }
        }

        for message in queued {
            self.send(&message).await;
        }

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Send(message)) => self.send(&message).await,
                    Some(Command::Disconnect { respond }) => {
                        self.teardown(Some(Error::Cancelled)).await;
                        let _ = respond.send(());
                        return;
                    }
                    None => {
                        self.teardown(Some(Error::Cancelled)).await;
                        return;
                    }
                },
                message = recv_inbound(&mut self.inbound) => {
                    let Some(message) = message else {
                        self.teardown(Some(Error::Signaling("signaling channel closed".to_string()))).await;
                        return;
                    };
                    if let Err(err) = self.handle_signaling(message).await {
                        // Before connecting this fails the attempt; afterwards the peer
                        // connection is still usable.
                        if self.pending.is_some() {
                            self.teardown(Some(err)).await;
                            return;
                        }
                        tracing::warn!(error = %err, "Remote description rejected, keeping session");
                        self.reporter.feed().publish(SdkEvent::error(&err));
                    }
                }
                event = recv_transport(&mut self.transport_events) => {
                    let Some(event) = event else {
                        tracing::debug!("Media transport stopped reporting events");
                        self.transport_events = None;
                        continue;
                    };
                    if let Err(err) = self.handle_transport_event(event).await {
                        self.teardown(Some(err)).await;
                        return;
                    }
                }
                () = tokio::time::sleep_until(deadline), if self.pending.is_some() => {
                    tracing::warn!("Connection timed out before the peer connected");
                    self.teardown(Some(Error::ConnectionTimeout)).await;
                    return;
                }
            }
        }
    }

    /// Open signaling, build the peer connection and publish the local offer.
    async fn setup(&mut self) -> Result<()> {
        let (signaling, inbound) = self.connector.open(&self.spec.url).await?;
        self.signaling = Some(signaling);
        self.inbound = Some(inbound);

        let options = Arc::clone(&self.spec.options);
        let (events, events_rx) = TransportEvents::channel();
        let config = TransportConfig {
            ice_servers: options.peer_connection.ice_servers.clone(),
        };
        let transport = self.transport.insert(self.transports.create(&config, events)?);
        self.transport_events = Some(events_rx);

        let local = &self.spec.local_media;
        for track in local.tracks_of(MediaKind::Audio).chain(local.tracks_of(MediaKind::Video)) {
            transport.add_local_track(track, &local.stream_id)?;
        }

        let video_senders = local.tracks_of(MediaKind::Video).count();
        if video_senders > 0 {
            let supported = transport.sender_codecs(MediaKind::Video);
            let ordered = order_codecs(&supported, options.preferred_codec.codec_name());
            tracing::debug!(
                codecs = ?ordered.iter().map(|codec| codec.name.as_str()).collect::<Vec<_>>(),
                "Applying video codec preferences"
            );
            transport.set_codec_preferences(MediaKind::Video, ordered)?;
        }
        if video_senders == 1 {
            let peer = &options.peer_connection;
            transport.set_sender_parameters(SenderParameters {
                min_bitrate: peer.min_bitrate,
                max_bitrate: peer.max_bitrate,
                max_framerate: peer.max_framerate,
            })?;
        } else {
            tracing::debug!(video_senders, "Skipping sender parameters, expected exactly one video sender");
        }

        let offer = transport.create_offer().await?;
        let sdp = offer.sdp.clone();
        transport.set_local_description(offer).await?;
        if let Some(signaling) = &self.signaling {
            signaling.send(&SignalingMessage::Offer { sdp }).await;
        }
        tracing::debug!("Local offer sent");
        Ok(())
    }

    async fn handle_signaling(&mut self, message: SignalingMessage) -> Result<()> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(());
        };

        match message {
            SignalingMessage::Offer { sdp } => {
                tracing::debug!("Remote offer received, answering");
                transport.set_remote_description(SessionDescription::offer(sdp)).await?;
                let answer = transport.create_answer().await?;
                let sdp = answer.sdp.clone();
                transport.set_local_description(answer).await?;
                if let Some(signaling) = &self.signaling {
                    signaling.send(&SignalingMessage::Answer { sdp }).await;
                }
            }
            SignalingMessage::Answer { sdp } => {
                tracing::debug!("Remote answer received");
                transport.set_remote_description(SessionDescription::answer(sdp)).await?;
            }
            SignalingMessage::IceCandidate { candidate } => {
                if let Err(err) = transport.add_remote_ice_candidate(candidate).await {
                    tracing::warn!("Failed to add remote ICE candidate: {err}");
                }
            }
            other @ (SignalingMessage::Prompt { .. } | SignalingMessage::SwitchCamera { .. }) => {
                tracing::debug!(kind = other.type_name(), "Ignoring client-only message from server");
            }
        }
        Ok(())
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::LocalIceCandidate(candidate) => {
                self.send(&SignalingMessage::IceCandidate { candidate }).await;
            }
            TransportEvent::RemoteStream(stream) => {
                tracing::info!(stream_id = stream.stream_id.as_str(), "Remote stream received");
                self.reporter.feed().publish(SdkEvent::RemoteStreamReceived(stream));
            }
            TransportEvent::PeerStateChanged(peer) => match peer_to_connection_state(peer) {
                ConnectionState::Connected => {
                    self.reporter.set(ConnectionState::Connected);
                    if let Some(pending) = self.pending.take() {
                        tracing::info!("Session connected");
                        let _ = pending.send(Ok(()));
                    }
                    self.push_initial_state().await;
                }
                ConnectionState::Connecting | ConnectionState::Idle => {
                    self.reporter.set(ConnectionState::Connecting);
                }
                ConnectionState::Disconnected => {
                    return Err(Error::Transport(format!("peer connection {}", peer_name(peer))));
                }
            },
        }
        Ok(())
    }

    async fn push_initial_state(&mut self) {
        if self.initial_state_sent {
            return;
        }
        self.initial_state_sent = true;

        let Some(state) = self.spec.options.initial_state.clone() else {
            return;
        };
        if let Some(prompt) = state.prompt.filter(|prompt| !prompt.text.is_empty()) {
            tracing::debug!(enrich = prompt.enrich, "Sending initial prompt");
            self.send(&SignalingMessage::prompt(prompt.text)).await;
        }
        if state.mirror {
            self.send(&SignalingMessage::mirror(true)).await;
        }
    }

    async fn send(&mut self, message: &SignalingMessage) {
        if let Some(signaling) = &self.signaling {
            signaling.send(message).await;
        }
    }

    /// Release the transport and the socket, then report the outcome.
    async fn teardown(&mut self, reason: Option<Error>) {
        if let Some(mut transport) = self.transport.take() {
            transport.close().await;
        }
        self.transport_events = None;
        if let Some(mut signaling) = self.signaling.take() {
            signaling.disconnect().await;
        }
        self.inbound = None;

        self.reporter.set(ConnectionState::Disconnected);

        match (self.pending.take(), reason) {
            (Some(pending), reason) => {
                let err = reason.unwrap_or(Error::Cancelled);
                tracing::info!(error = %err, "Session failed before connecting");
                let _ = pending.send(Err(err));
            }
            (None, Some(Error::Cancelled) | None) => {
                tracing::info!("Session closed");
            }
            (None, Some(err)) => {
                tracing::warn!(error = %err, "Session lost");
                self.reporter.feed().publish(SdkEvent::error(&err));
            }
        }
    }
}

const fn peer_to_connection_state(peer: PeerState) -> ConnectionState {
    match peer {
        PeerState::New | PeerState::Connecting => ConnectionState::Connecting,
        PeerState::Connected => ConnectionState::Connected,
        PeerState::Disconnected | PeerState::Failed | PeerState::Closed => ConnectionState::Disconnected,
    }
}

const fn peer_name(peer: PeerState) -> &'static str {
    match peer {
        PeerState::New => "new",
        PeerState::Connecting => "connecting",
        PeerState::Connected => "connected",
        PeerState::Disconnected => "disconnected",
        PeerState::Failed => "failed",
        PeerState::Closed => "closed",
    }
}

async fn recv_inbound(inbound: &mut Option<mpsc::Receiver<SignalingMessage>>) -> Option<SignalingMessage> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_transport(events: &mut Option<mpsc::UnboundedReceiver<TransportEvent>>) -> Option<TransportEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
