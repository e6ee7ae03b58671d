//! The narrow surface the session drives the platform media engine through.
//!
//! A shim over the native peer-connection library implements [`MediaTransport`] and
//! [`MediaTransportFactory`]. Native delegate callbacks are translated into
//! [`TransportEvent`]s at the shim boundary through [`TransportEvents`], so nothing
//! above this module sees platform callback types.

mod codecs;
mod completion;

pub use codecs::{UTILITY_CODECS, order_codecs};
pub use completion::{Completer, Completion, completion};

use crate::Result;
use crate::protocol::messages::IceCandidate;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

/// Opaque handle to a single track owned by the media engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: String,
    pub kind: MediaKind,
}

impl MediaTrack {
    #[must_use]
    pub fn video(id: impl Into<String>) -> Self {
        Self { id: id.into(), kind: MediaKind::Video }
    }

    #[must_use]
    pub fn audio(id: impl Into<String>) -> Self {
        Self { id: id.into(), kind: MediaKind::Audio }
    }
}

/// A group of tracks sharing one stream id, local or remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaStream {
    pub stream_id: String,
    pub tracks: Vec<MediaTrack>,
}

impl MediaStream {
    #[must_use]
    pub fn new(stream_id: impl Into<String>, tracks: Vec<MediaTrack>) -> Self {
        Self { stream_id: stream_id.into(), tracks }
    }

    pub fn tracks_of(&self, kind: MediaKind) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(move |track| track.kind == kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdpType {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    #[must_use]
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self { sdp_type: SdpType::Offer, sdp: sdp.into() }
    }

    #[must_use]
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self { sdp_type: SdpType::Answer, sdp: sdp.into() }
    }
}

/// One entry of the engine's sender capability list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecCapability {
    /// Mime subtype, e.g. `VP8` or `rtx`.
    pub name: String,
    pub clock_rate: u32,
    pub fmtp: Option<String>,
}

impl CodecCapability {
    #[must_use]
    pub fn new(name: impl Into<String>, clock_rate: u32) -> Self {
        Self { name: name.into(), clock_rate, fmtp: None }
    }
}

/// Encoding limits for the single local video sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderParameters {
    pub min_bitrate: u32,
    pub max_bitrate: u32,
    pub max_framerate: u32,
}

/// Native peer-connection states as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Callback traffic from the engine, in the order it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    LocalIceCandidate(IceCandidate),
    RemoteStream(MediaStream),
    PeerStateChanged(PeerState),
}

/// Sink handed to the shim for forwarding native callbacks.
///
/// Every method is non-blocking so it can be called directly from engine threads.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportEvents {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn local_ice_candidate(&self, candidate: IceCandidate) {
        self.emit(TransportEvent::LocalIceCandidate(candidate));
    }

    pub fn remote_stream(&self, stream: MediaStream) {
        self.emit(TransportEvent::RemoteStream(stream));
    }

    pub fn peer_state_changed(&self, state: PeerState) {
        self.emit(TransportEvent::PeerStateChanged(state));
    }

    fn emit(&self, event: TransportEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Transport event dropped, session already gone");
        }
    }
}

/// Everything a factory needs to build one peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub ice_servers: Vec<String>,
}

/// Driver for one peer connection.
///
/// Description and candidate operations are single-shot: each call resolves exactly
/// once, with success or failure. Shims wrapping callback APIs can use [`completion`].
#[async_trait]
pub trait MediaTransport: Send {
    #[allow(clippy::result_large_err)]
    fn add_local_track(&mut self, track: &MediaTrack, stream_id: &str) -> Result<()>;

    async fn create_offer(&mut self) -> Result<SessionDescription>;

    async fn create_answer(&mut self) -> Result<SessionDescription>;

    async fn set_local_description(&mut self, description: SessionDescription) -> Result<()>;

    async fn set_remote_description(&mut self, description: SessionDescription) -> Result<()>;

    async fn add_remote_ice_candidate(&mut self, candidate: IceCandidate) -> Result<()>;

    /// Codecs the engine can send for `kind`, in engine order.
    fn sender_codecs(&self, kind: MediaKind) -> Vec<CodecCapability>;

    #[allow(clippy::result_large_err)]
    fn set_codec_preferences(&mut self, kind: MediaKind, codecs: Vec<CodecCapability>) -> Result<()>;

    #[allow(clippy::result_large_err)]
    fn set_sender_parameters(&mut self, parameters: SenderParameters) -> Result<()>;

    /// Close the peer connection and release its tracks. Must tolerate repeat calls.
    async fn close(&mut self);
}

pub trait MediaTransportFactory: Send + Sync {
    /// Create a fresh peer connection whose callbacks are forwarded to `events`.
    ///
    /// # Errors
    /// Returns an error if the engine cannot create a peer connection.
    #[allow(clippy::result_large_err)]
    fn create(&self, config: &TransportConfig, events: TransportEvents) -> Result<Box<dyn MediaTransport>>;
}
