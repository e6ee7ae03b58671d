//! One WebSocket connection carrying [`SignalingMessage`]s.
//!
//! The channel knows nothing about sessions. It decodes inbound frames on a background
//! task and hands them out through an mpsc receiver; the receiver closing is how the
//! owner learns that the socket is gone.

use crate::error::Result;
use crate::protocol::codec::{self, DecodeError};
use crate::protocol::messages::SignalingMessage;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::borrow::Cow;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message};
use url::Url;

const TRACE_LOG_MAX_BYTES: usize = 1024;
const TRACE_TRUNCATE_SUFFIX: &str = "... (truncated)";
const INBOUND_BUFFER: usize = 64;

type WsError = tokio_tungstenite::tungstenite::Error;
type FrameSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;

pub struct SignalingChannel {
    writer: Arc<Mutex<Option<FrameSink>>>,
    reader: Option<JoinHandle<()>>,
}

impl SignalingChannel {
    /// Open a socket to `url` and start the receive loop.
    ///
    /// # Errors
    /// Returns an error if the scheme is unsupported or the WebSocket handshake fails.
    pub async fn connect(url: &Url) -> Result<(Self, mpsc::Receiver<SignalingMessage>)> {
        let stream = super::ws::connect(url).await?;
        Ok(Self::from_socket(stream))
    }

    /// Wrap an already-open WebSocket and start the receive loop immediately.
    #[must_use]
    pub fn from_socket<S>(socket: S) -> (Self, mpsc::Receiver<SignalingMessage>)
    where
        S: Stream<Item = std::result::Result<Message, WsError>> + Sink<Message, Error = WsError> + Send + 'static,
    {
        let (write, read) = socket.split();
        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        let reader = tokio::spawn(receive_loop(read, tx));
        let sink: FrameSink = Box::pin(write);
        let channel = Self {
            writer: Arc::new(Mutex::new(Some(sink))),
            reader: Some(reader),
        };
        (channel, rx)
    }

    /// Send a message, best-effort. Failures are logged and swallowed.
    pub async fn send(&self, message: &SignalingMessage) {
        let json = match codec::encode(message) {
            Ok(json) => json,
            Err(err) => {
                tracing::warn!(kind = message.type_name(), "Failed to encode signaling message: {err}");
                return;
            }
        };

        let mut writer = self.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            tracing::debug!(kind = message.type_name(), "Dropping signaling message, channel is closed");
            return;
        };

        tracing::trace!("Sending signaling message: {}", safe_truncate(&json, TRACE_LOG_MAX_BYTES));
        if let Err(err) = sink.send(Message::Text(json.into())).await {
            tracing::warn!(kind = message.type_name(), "Failed to send signaling message: {err}");
        }
    }

    /// Stop the receive loop, then close the socket with a normal-closure frame.
    ///
    /// Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
            let _ = reader.await;
        }

        let sink = self.writer.lock().await.take();
        if let Some(mut sink) = sink {
            let frame = CloseFrame {
                code: CloseCode::Normal,
                reason: "session closed".into(),
            };
            if let Err(err) = sink.send(Message::Close(Some(frame))).await {
                tracing::debug!("Close frame not delivered: {err}");
            }
            let _ = sink.close().await;
            tracing::info!("Signaling channel closed");
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.reader.as_ref().is_some_and(|reader| !reader.is_finished())
    }
}

impl Drop for SignalingChannel {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn receive_loop<S>(mut read: S, tx: mpsc::Sender<SignalingMessage>)
where
    S: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = read.next().await {
        let decoded = match frame {
            Ok(Message::Text(text)) => {
                tracing::trace!("Received signaling frame: {}", safe_truncate(&text, TRACE_LOG_MAX_BYTES));
                codec::decode(text.as_bytes())
            }
            Ok(Message::Binary(bytes)) => codec::decode(&bytes),
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "Signaling socket closed by server");
                break;
            }
            Ok(_) => continue,
            Err(err) => {
                tracing::warn!("Signaling socket failed: {err}");
                break;
            }
        };

        match decoded {
            Ok(message) => {
                if tx.send(message).await.is_err() {
                    break;
                }
            }
            Err(DecodeError::UnknownType(kind)) => {
                tracing::debug!(kind = kind.as_str(), "Ignoring signaling frame of unknown type");
            }
            Err(err @ DecodeError::Malformed(_)) => {
                tracing::debug!("Ignoring signaling frame: {err}");
            }
        }
    }
}

fn safe_truncate(s: &str, max_bytes: usize) -> Cow<'_, str> {
    if s.len() <= max_bytes {
        return Cow::Borrowed(s);
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!(
        "{} {} {} bytes",
        &s[..end],
        TRACE_TRUNCATE_SUFFIX,
        s.len() - end
    ))
}
