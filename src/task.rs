//! Task utilities
//!
//! Runs a stream on the tokio runtime and hands its items back to the owner
//! through a channel, so controllers can apply results on their own task
//! without blocking.

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A stream running in the background.
///
/// Items are buffered until the owner drains them with [`Subscription::drain`]
/// or awaits them with [`Subscription::next`]. Dropping the subscription aborts
/// the task; anything it would have produced afterwards is lost.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    handle: JoinHandle<()>,
}

impl<T: Send + 'static> Subscription<T> {
    /// Spawn `source` onto the runtime and start collecting its items
    pub fn spawn<S>(source: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let mut source = Box::pin(source);
            while let Some(item) = source.next().await {
                if tx.send(item).is_err() {
                    // Receiver gone, nobody is listening any more
                    break;
                }
            }
        });

        Self { rx, handle }
    }
}

impl<T> Subscription<T> {
    /// Take every item that has arrived so far, in arrival order
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Ok(item) = self.rx.try_recv() {
            items.push(item);
        }
        items
    }

    /// Wait for the next item. Returns `None` once the stream has ended and
    /// every item has been taken.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Stop the background task. Items already buffered can still be drained.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
