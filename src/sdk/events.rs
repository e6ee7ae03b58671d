use crate::error::{Error, ErrorKind};
use crate::media::MediaStream;
use crate::protocol::models::ConnectionState;
use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// Smallest buffer the feed accepts.
pub const MIN_EVENT_BUFFER: usize = 4;
pub const DEFAULT_EVENT_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SdkEvent {
    StateChanged(ConnectionState),
    RemoteStreamReceived(MediaStream),
    Error { kind: ErrorKind, message: String },
}

impl SdkEvent {
    #[must_use]
    pub fn error(err: &Error) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Bounded multi-consumer event feed.
///
/// Publishing never waits. A consumer that falls more than the buffer size behind
/// loses the oldest events it has not read yet.
#[derive(Debug, Clone)]
pub struct EventFeed {
    sender: Arc<Mutex<Option<broadcast::Sender<SdkEvent>>>>,
}

impl EventFeed {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(MIN_EVENT_BUFFER));
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
        }
    }

    pub fn publish(&self, event: SdkEvent) {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = guard.as_ref() {
            // No subscribers is fine; the event is simply not observed.
            let _ = sender.send(event);
        }
    }

    /// Attach a new consumer. It sees events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> EventStream {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let rx = match guard.as_ref() {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        };
        EventStream::new(rx)
    }

    /// End every stream once it has drained. Returns `false` if already finished.
    pub fn finish(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

/// Connection state shared by every session a client creates.
///
/// Transitions to the current value are swallowed, so noisy engine callbacks never
/// produce two identical `StateChanged` events in a row.
#[derive(Debug, Clone)]
pub(crate) struct StateReporter {
    state: Arc<watch::Sender<ConnectionState>>,
    feed: EventFeed,
}

impl StateReporter {
    pub(crate) fn new(feed: EventFeed) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            state: Arc::new(state),
            feed,
        }
    }

    pub(crate) fn set(&self, next: ConnectionState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            tracing::debug!(state = %next, "Connection state changed");
            self.feed.publish(SdkEvent::StateChanged(next));
        }
        changed
    }

    pub(crate) fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub(crate) const fn feed(&self) -> &EventFeed {
        &self.feed
    }
}

/// A consumer's view of the [`EventFeed`]. Ends when the feed is finished.
pub struct EventStream {
    inner: BroadcastStream<SdkEvent>,
}

impl EventStream {
    fn new(rx: broadcast::Receiver<SdkEvent>) -> Self {
        Self {
            inner: BroadcastStream::new(rx),
        }
    }

    /// Await the next event, skipping over any that were overwritten.
    pub async fn recv(&mut self) -> Option<SdkEvent> {
        futures::StreamExt::next(self).await
    }
}

impl Stream for EventStream {
    type Item = SdkEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    tracing::debug!(skipped, "Event consumer lagged, oldest events dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn overflow_keeps_newest_events() {
        let feed = EventFeed::new(4);
        let mut stream = feed.subscribe();
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
        ] {
            feed.publish(SdkEvent::StateChanged(state));
        }
        feed.finish();

        let received: Vec<_> = stream.by_ref().collect().await;
        assert_eq!(
            received,
            vec![
                SdkEvent::StateChanged(ConnectionState::Disconnected),
                SdkEvent::StateChanged(ConnectionState::Connecting),
                SdkEvent::StateChanged(ConnectionState::Connected),
                SdkEvent::StateChanged(ConnectionState::Disconnected),
            ]
        );
    }

    #[tokio::test]
    async fn finish_is_idempotent_and_ends_streams() {
        let feed = EventFeed::default();
        let mut early = feed.subscribe();
        assert!(feed.finish());
        assert!(!feed.finish());
        assert!(feed.is_finished());

        feed.publish(SdkEvent::StateChanged(ConnectionState::Connected));
        assert_eq!(early.recv().await, None);
        assert_eq!(feed.subscribe().recv().await, None);
    }

    #[tokio::test]
    async fn publishing_without_consumers_never_blocks() {
        let feed = EventFeed::new(4);
        for _ in 0..1_000 {
            feed.publish(SdkEvent::StateChanged(ConnectionState::Connecting));
        }
        let mut late = feed.subscribe();
        feed.publish(SdkEvent::StateChanged(ConnectionState::Connected));
        assert_eq!(late.recv().await, Some(SdkEvent::StateChanged(ConnectionState::Connected)));
    }

    #[tokio::test]
    async fn reporter_drops_repeated_states() {
        let feed = EventFeed::default();
        let mut stream = feed.subscribe();
        let reporter = StateReporter::new(feed.clone());

        assert!(reporter.set(ConnectionState::Connecting));
        assert!(!reporter.set(ConnectionState::Connecting));
        assert!(reporter.set(ConnectionState::Connected));
        assert!(!reporter.set(ConnectionState::Connected));
        feed.finish();

        let received: Vec<_> = stream.by_ref().collect().await;
        assert_eq!(
            received,
            vec![
                SdkEvent::StateChanged(ConnectionState::Connecting),
                SdkEvent::StateChanged(ConnectionState::Connected),
            ]
        );
        assert_eq!(reporter.current(), ConnectionState::Connected);
    }
}
