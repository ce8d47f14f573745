//! The seam between the dispatcher and the network.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use url::Url;

use crate::error::BoxError;
use crate::request::WireRequest;

/// What a transport observed on the wire, before any classification.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Final URL after redirects.
    pub url: Url,
    /// `None` when the transport got a status line but no body.
    pub body: Option<Bytes>,
}

/// Performs one HTTP exchange.
///
/// `Ok(None)` means the transport finished without error yet has no
/// response to report.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, request: WireRequest) -> Result<Option<RawResponse>, BoxError>;
}

/// Default transport backed by `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    /// This method calls reqwest::Client::new() internally.
    pub fn new() -> Self {
        Default::default()
    }

    /// Constructs a transport with specifying inner `reqwest::Client`.
    pub fn new_with_client(client: reqwest::Client) -> Self {
        ReqwestTransport { inner: client }
    }
}

impl From<reqwest::Client> for ReqwestTransport {
    fn from(client: reqwest::Client) -> Self {
        ReqwestTransport::new_with_client(client)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: WireRequest) -> Result<Option<RawResponse>, BoxError> {
        let WireRequest {
            method,
            url,
            headers,
            body,
            timeout,
        } = request;

        let mut builder = self.inner.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        Ok(Some(RawResponse {
            status,
            headers,
            url,
            body: Some(body),
        }))
    }
}

#[cfg(any(test, feature = "mocks"))]
pub use mock::{MockReply, MockTransport};

#[cfg(any(test, feature = "mocks"))]
mod mock {
    use std::collections::VecDeque;
    use std::sync::{Mutex, PoisonError};

    use async_trait::async_trait;
    use bytes::Bytes;
    use http::{HeaderMap, StatusCode};

    use super::{RawResponse, Transport};
    use crate::error::BoxError;
    use crate::request::WireRequest;

    /// Canned reply for [`MockTransport`].
    #[derive(Debug, Clone)]
    pub enum MockReply {
        Response { status: StatusCode, headers: HeaderMap, body: Option<Bytes> },
        /// Finish without a response and without an error.
        Nothing,
        /// Fail with a transport error carrying this message.
        Error(String),
        /// Never complete.
        Pending,
    }

    /// Transport that replays queued replies and records every request.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        replies: Mutex<VecDeque<MockReply>>,
        requests: Mutex<Vec<WireRequest>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Default::default()
        }

        pub fn queue_reply(&self, reply: MockReply) -> &Self {
            self.replies
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(reply);
            self
        }

        /// Queue a response with the given status and body.
        pub fn queue_response<B: Into<Bytes>>(&self, status: u16, body: B) -> &Self {
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            self.queue_reply(MockReply::Response {
                status,
                headers: HeaderMap::new(),
                body: Some(body.into()),
            })
        }

        /// Requests received so far, oldest first.
        pub fn requests(&self) -> Vec<WireRequest> {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap_or_else(PoisonError::into_inner).len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: WireRequest) -> Result<Option<RawResponse>, BoxError> {
            let url = request.url.clone();
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request);
            let reply = self
                .replies
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();

            match reply {
                Some(MockReply::Response { status, headers, body }) => Ok(Some(RawResponse {
                    status,
                    headers,
                    url,
                    body,
                })),
                Some(MockReply::Nothing) => Ok(None),
                Some(MockReply::Error(message)) => Err(message.into()),
                Some(MockReply::Pending) => std::future::pending().await,
                None => Err("no mock reply queued".into()),
            }
        }
    }
}
