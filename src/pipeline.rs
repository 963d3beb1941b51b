//! Lifecycle of a single asynchronous operation.
//!
//! Every store read and network call is turned into a stream of
//! [`AsyncResult`] snapshots:
//!
//! - one-shot producers (a network call, a single write) yield `Loading`
//!   followed by exactly one `Success` or `Error`
//! - continuous sources (store observation) yield `Loading` once, then a
//!   `Success` for every value; the first failure yields `Error` and ends the
//!   stream
//!
//! The streams are lazy. Nothing runs until a consumer polls them, and dropping
//! the stream drops the in-flight work. Spawning onto the runtime and
//! cancellation live in [`crate::task::Subscription`].

use std::fmt;
use std::future::{self, Future};

use futures::stream::{self, BoxStream, Stream, StreamExt};

/// Fallback message when an error carries no text
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Where an error originated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Remote API answered with a non-success status
    Http { status: u16 },
    /// Request never produced a usable response
    Transport,
    /// Article store failed
    Store,
    Unknown,
}

/// Opaque error payload handed to the notification channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    pub kind: ErrorKind,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            UNKNOWN_ERROR.to_string()
        } else {
            message
        };
        Self { message, kind }
    }

    pub fn unknown() -> Self {
        Self::new(ErrorKind::Unknown, UNKNOWN_ERROR)
    }

    /// HTTP status code, if the error came from a non-success response
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            ErrorKind::Http { status } => Some(status),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<anyhow::Error> for ErrorInfo {
    fn from(e: anyhow::Error) -> Self {
        Self::new(ErrorKind::Unknown, e.to_string())
    }
}

/// Snapshot of an asynchronous operation
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncResult<T> {
    Loading,
    Success { data: T },
    Error { cause: ErrorInfo },
}

impl<T> AsyncResult<T> {
    pub fn from_result<E: Into<ErrorInfo>>(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::Success { data },
            Err(e) => Self::Error { cause: e.into() },
        }
    }

    /// Whether this snapshot ends a one-shot operation
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            Self::Error { cause } => Some(cause),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AsyncResult<U> {
        match self {
            Self::Loading => AsyncResult::Loading,
            Self::Success { data } => AsyncResult::Success { data: f(data) },
            Self::Error { cause } => AsyncResult::Error { cause },
        }
    }
}

/// Wrap a one-shot producer: `Loading`, then one terminal snapshot.
pub fn one_shot<T, E, F>(producer: F) -> BoxStream<'static, AsyncResult<T>>
where
    T: Send + 'static,
    E: Into<ErrorInfo> + 'static,
    F: Future<Output = Result<T, E>> + Send + 'static,
{
    stream::once(future::ready(AsyncResult::Loading))
        .chain(stream::once(async move {
            AsyncResult::from_result(producer.await)
        }))
        .boxed()
}

/// Wrap a continuous source: `Loading`, then `Success` per value.
///
/// The first `Err` from the source is delivered as `Error` and terminates the
/// stream; the source is not polled again.
pub fn continuous<T, E, S>(source: S) -> BoxStream<'static, AsyncResult<T>>
where
    T: Send + 'static,
    E: Into<ErrorInfo> + 'static,
    S: Stream<Item = Result<T, E>> + Send + 'static,
{
    let values = source.scan(false, |failed, item| {
        if *failed {
            return future::ready(None);
        }
        let snapshot = match item {
            Ok(data) => AsyncResult::Success { data },
            Err(e) => {
                *failed = true;
                AsyncResult::Error { cause: e.into() }
            }
        };
        future::ready(Some(snapshot))
    });

    stream::once(future::ready(AsyncResult::Loading))
        .chain(values)
        .boxed()
}

/// Suppress a `Success` whose payload equals the previous `Success`.
///
/// `Loading` and `Error` always pass and reset the comparison, so a value that
/// reappears after a failure is delivered again.
pub fn distinct_successes<T>(
    source: BoxStream<'static, AsyncResult<T>>,
) -> BoxStream<'static, AsyncResult<T>>
where
    T: Clone + PartialEq + Send + 'static,
{
    let mut last: Option<T> = None;
    source
        .filter_map(move |snapshot| {
            let keep = match &snapshot {
                AsyncResult::Success { data } => {
                    if last.as_ref() == Some(data) {
                        false
                    } else {
                        last = Some(data.clone());
                        true
                    }
                }
                _ => {
                    last = None;
                    true
                }
            };
            future::ready(keep.then_some(snapshot))
        })
        .boxed()
}

/// Drive a one-shot stream to completion and return its terminal snapshot.
///
/// A stream that ends without a terminal snapshot is reported as an unknown
/// error.
pub async fn terminal<T>(mut source: BoxStream<'static, AsyncResult<T>>) -> AsyncResult<T> {
    while let Some(snapshot) = source.next().await {
        if snapshot.is_terminal() {
            return snapshot;
        }
    }
    AsyncResult::Error {
        cause: ErrorInfo::unknown(),
    }
}
