//! Wire vocabulary of the signaling socket and the model types it negotiates.

pub mod codec;
pub mod messages;
pub mod models;

pub use codec::DecodeError;
pub use messages::{IceCandidate, SignalingMessage};
