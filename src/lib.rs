#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

pub mod error;
pub mod media;
pub mod protocol;
pub mod sdk;
pub mod transport;

pub use error::{Error, ErrorKind, Result};
pub use media::{
    CodecCapability, MediaKind, MediaStream, MediaTrack, MediaTransport, MediaTransportFactory, PeerState,
    SenderParameters, SessionDescription, TransportConfig, TransportEvent, TransportEvents,
};
pub use protocol::{IceCandidate, SignalingMessage};
pub use protocol::models::{
    ConnectionState, ModelDefinition, ModelState, Models, PeerConnectionConfig, Prompt, RealtimeModel, VideoCodec,
};
pub use sdk::{
    ClientConfig, EventStream, Realtime, RealtimeBuilder, RealtimeClient, RealtimeConnectOptions, RetryPolicy,
    SdkEvent, SignalingConnector,
};
pub use transport::SignalingChannel;
