pub mod signaling;
pub mod ws;

pub use signaling::SignalingChannel;
