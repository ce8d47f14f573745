//! Issues signed requests and reports each outcome exactly once.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use tokio::sync::{oneshot, Mutex, Notify};
use url::Url;

use crate::error::{HttpStatusError, RemoteError};
use crate::request::WireRequest;
use crate::transport::{RawResponse, Transport};
use crate::{Error, Result};

/// A successful (status < 400) response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: Url,
    pub body: Bytes,
}

impl Response {
    /// The body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Turns what the transport saw into a [`Response`] or an error.
pub fn classify(raw: Option<RawResponse>) -> Result<Response> {
    let raw = match raw {
        Some(raw) => raw,
        None => {
            return Err(Error::MalformedResponse {
                status: StatusCode::BAD_REQUEST,
            })
        }
    };
    let body = match raw.body {
        Some(body) => body,
        None => return Err(Error::MalformedResponse { status: raw.status }),
    };

    if raw.status.as_u16() >= 400 {
        if let Some(remote) = RemoteError::from_body(raw.status, &body) {
            return Err(remote.into());
        }
        return Err(HttpStatusError {
            status: raw.status,
            headers: raw.headers,
            body,
            url: raw.url,
        }
        .into());
    }

    Ok(Response {
        status: raw.status,
        headers: raw.headers,
        url: raw.url,
        body,
    })
}

/// Lifecycle of a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestState {
    NotStarted = 0,
    Running = 1,
    Succeeded = 2,
    Failed = 3,
    Cancelled = 4,
}

impl RequestState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RequestState::NotStarted,
            1 => RequestState::Running,
            2 => RequestState::Succeeded,
            3 => RequestState::Failed,
            _ => RequestState::Cancelled,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Succeeded | RequestState::Failed | RequestState::Cancelled
        )
    }
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    started: AtomicBool,
    abort: Notify,
}

impl Shared {
    fn transition(&self, from: RequestState, to: RequestState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Cancellation handle for a request. Clones observe the same request.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    shared: Arc<Shared>,
}

impl RequestHandle {
    fn new() -> Self {
        RequestHandle {
            shared: Arc::new(Shared {
                state: AtomicU8::new(RequestState::NotStarted as u8),
                started: AtomicBool::new(false),
                abort: Notify::new(),
            }),
        }
    }

    pub fn state(&self) -> RequestState {
        RequestState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Stop the request. Its outcome is then never delivered.
    ///
    /// Does nothing once the request has finished.
    pub fn cancel(&self) {
        loop {
            let current = self.state();
            if current.is_terminal() {
                return;
            }
            if self.shared.transition(current, RequestState::Cancelled) {
                tracing::debug!(from = ?current, "request cancelled");
                self.shared.abort.notify_one();
                return;
            }
        }
    }
}

/// Serializes outcome delivery for one client, so that callbacks never run
/// concurrently with each other.
#[derive(Debug, Clone, Default)]
pub struct CallbackQueue {
    lock: Arc<Mutex<()>>,
}

impl CallbackQueue {
    pub fn new() -> Self {
        Default::default()
    }

    /// Runs `f` once every earlier delivery on this queue has returned.
    pub async fn deliver<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = self.lock.lock().await;
        f()
    }
}

/// A prepared request that has not necessarily been issued yet.
pub struct InFlightRequest<T: Transport> {
    request: WireRequest,
    transport: Arc<T>,
    queue: CallbackQueue,
    handle: RequestHandle,
}

impl<T: Transport> fmt::Debug for InFlightRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightRequest")
            .field("request", &self.request)
            .field("state", &self.handle.state())
            .finish()
    }
}

impl<T: Transport> InFlightRequest<T> {
    pub fn handle(&self) -> RequestHandle {
        self.handle.clone()
    }

    pub fn request(&self) -> &WireRequest {
        &self.request
    }

    /// Issues the request on the Tokio runtime. Only the first call has any
    /// effect; later calls return the same handle.
    ///
    /// `on_outcome` runs on the client's [`CallbackQueue`] unless the
    /// request is cancelled before it finishes.
    pub fn start<F>(&self, on_outcome: F) -> RequestHandle
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        let handle = self.handle.clone();
        if handle.shared.started.swap(true, Ordering::AcqRel) {
            tracing::debug!(url = %self.request.url, "request already started");
            return handle;
        }

        let request = self.request.clone();
        let transport = Arc::clone(&self.transport);
        let queue = self.queue.clone();
        let shared = Arc::clone(&handle.shared);
        tokio::spawn(async move {
            if !shared.transition(RequestState::NotStarted, RequestState::Running) {
                tracing::debug!(url = %request.url, "request cancelled before it was issued");
                return;
            }
            tracing::debug!(method = %request.method, url = %request.url, "issuing request");

            let outcome = tokio::select! {
                biased;
                _ = shared.abort.notified() => return,
                sent = transport.send(request) => match sent {
                    Ok(raw) => classify(raw),
                    Err(e) => Err(Error::Transport(e)),
                },
            };

            let terminal = if outcome.is_ok() {
                RequestState::Succeeded
            } else {
                RequestState::Failed
            };
            if !shared.transition(RequestState::Running, terminal) {
                return;
            }
            match outcome {
                Ok(ref response) => tracing::debug!(status = %response.status, "request succeeded"),
                Err(ref e) => tracing::debug!(error = %e, "request failed"),
            }
            queue.deliver(move || on_outcome(outcome)).await;
        });
        handle
    }
}

struct CancelOnDrop(RequestHandle);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Sends [`WireRequest`]s through a [`Transport`].
pub struct Dispatcher<T: Transport> {
    transport: Arc<T>,
    queue: CallbackQueue,
}

impl<T: Transport> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Dispatcher {
            transport: Arc::clone(&self.transport),
            queue: self.queue.clone(),
        }
    }
}

impl<T: Transport> fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish()
    }
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T) -> Self {
        Dispatcher {
            transport: Arc::new(transport),
            queue: CallbackQueue::new(),
        }
    }

    /// Wraps `request` without issuing it.
    pub fn prepare(&self, request: WireRequest) -> InFlightRequest<T> {
        InFlightRequest {
            request,
            transport: Arc::clone(&self.transport),
            queue: self.queue.clone(),
            handle: RequestHandle::new(),
        }
    }

    /// Issues `request` and reports the outcome to `on_outcome`.
    pub fn execute<F>(&self, request: WireRequest, on_outcome: F) -> RequestHandle
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        self.prepare(request).start(on_outcome)
    }

    /// Issues `request` and waits for the outcome.
    ///
    /// Dropping the returned future cancels the request.
    pub async fn send(&self, request: WireRequest) -> Result<Response> {
        let (tx, rx) = oneshot::channel();
        let handle = self.execute(request, move |outcome| {
            let _ = tx.send(outcome);
        });
        let _guard = CancelOnDrop(handle);
        rx.await.unwrap_or_else(|_| Err(Error::Cancelled))
    }

    pub fn queue(&self) -> &CallbackQueue {
        &self.queue
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
