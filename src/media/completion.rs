use crate::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Create a linked completer/completion pair for wrapping one native callback.
///
/// The shim moves the [`Completer`] into the engine callback and awaits the
/// [`Completion`]. Dropping the completer unfired resolves the completion with a
/// transport error instead of hanging.
#[must_use]
pub fn completion<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, Completion { rx })
}

#[derive(Debug)]
pub struct Completer<T> {
    tx: oneshot::Sender<Result<T>>,
}

impl<T> Completer<T> {
    /// Resolve the paired completion. Consumes the completer so it fires once.
    pub fn complete(self, result: Result<T>) {
        let _ = self.tx.send(result);
    }

    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn fail(self, message: impl Into<String>) {
        self.complete(Err(Error::Transport(message.into())));
    }
}

#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| Err(Error::Transport("media engine dropped the callback".to_string())))
        })
    }
}
