use crate::Result;
use crate::protocol::messages::SignalingMessage;
use crate::transport::SignalingChannel;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use url::Url;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An open signaling channel together with its inbound message feed.
pub type SignalingLink = (SignalingChannel, mpsc::Receiver<SignalingMessage>);

/// Opens signaling channels for sessions. Each call must produce a brand new socket.
pub trait SignalingConnector: Send + Sync {
    fn open<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<SignalingLink>>;
}

/// Connector that dials the signaling URL over WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl SignalingConnector for WsConnector {
    fn open<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<SignalingLink>> {
        Box::pin(SignalingChannel::connect(url))
    }
}
